//! Declarative descriptions of the certificates a bootstrap run issues.

use std::net::IpAddr;

use pkg_constants::network::{API_SERVER_DNS_ALIASES, KUBERNETES_SERVICE_IP, LOCALHOST};
use pkg_constants::pki::{
    ADMIN, APISERVER_ETCD_CLIENT, APISERVER_KUBELET_CLIENT, CONTROLLER_MANAGER, ETCD_SERVER,
    KUBE_APISERVER, MASTERS_GROUP, SCHEDULER,
};

use crate::error::{PkiError, Result};

/// Extended key usage granted to a leaf certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    ServerAuth,
    ClientAuth,
}

impl KeyPurpose {
    pub(crate) fn to_rcgen(self) -> rcgen::ExtendedKeyUsagePurpose {
        match self {
            KeyPurpose::ServerAuth => rcgen::ExtendedKeyUsagePurpose::ServerAuth,
            KeyPurpose::ClientAuth => rcgen::ExtendedKeyUsagePurpose::ClientAuth,
        }
    }
}

/// Which certificate template a profile is signed with. Only server
/// certificates carry subject alternative names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Server,
    Client,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateProfile {
    pub common_name: String,
    /// Subject organizations; the authorization layer reads these as groups.
    pub organizations: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub dns_names: Vec<String>,
    pub key_purposes: Vec<KeyPurpose>,
    pub template: Template,
}

impl CertificateProfile {
    /// A server profile granting `ServerAuth`. SANs must be added before signing.
    pub fn server(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            organizations: vec![],
            ip_addresses: vec![],
            dns_names: vec![],
            key_purposes: vec![KeyPurpose::ServerAuth],
            template: Template::Server,
        }
    }

    /// A client profile granting `ClientAuth`, with no SANs.
    pub fn client(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            organizations: vec![],
            ip_addresses: vec![],
            dns_names: vec![],
            key_purposes: vec![KeyPurpose::ClientAuth],
            template: Template::Client,
        }
    }

    pub fn organization(mut self, org: impl Into<String>) -> Self {
        self.organizations.push(org.into());
        self
    }

    pub fn ip_addresses(mut self, ips: impl IntoIterator<Item = IpAddr>) -> Self {
        self.ip_addresses.extend(ips);
        self
    }

    pub fn dns_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.dns_names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn key_purposes(mut self, purposes: impl IntoIterator<Item = KeyPurpose>) -> Self {
        self.key_purposes = purposes.into_iter().collect();
        self
    }

    pub fn is_server(&self) -> bool {
        self.template == Template::Server
    }

    pub fn has_sans(&self) -> bool {
        !self.ip_addresses.is_empty() || !self.dns_names.is_empty()
    }

    /// Check the profile is complete for its template before it is signed.
    pub fn validate(&self) -> Result<()> {
        let cn = self.common_name.as_str();
        let fail = |reason: &str| Err(PkiError::invalid_profile(cn, reason));

        if cn.trim().is_empty() {
            return fail("common name must not be empty");
        }

        if self.organizations.iter().any(|o| o.trim().is_empty()) {
            return fail("organization must not be empty");
        }
        for (i, org) in self.organizations.iter().enumerate() {
            if self.organizations[..i].contains(org) {
                return Err(PkiError::invalid_profile(
                    cn,
                    format!("duplicate organization '{}'", org),
                ));
            }
        }

        if self.key_purposes.is_empty() {
            return fail("at least one extended key usage is required");
        }
        for (i, p) in self.key_purposes.iter().enumerate() {
            if self.key_purposes[..i].contains(p) {
                return Err(PkiError::invalid_profile(
                    cn,
                    format!("duplicate extended key usage {:?}", p),
                ));
            }
        }

        for name in &self.dns_names {
            if name.is_empty() || !name.is_ascii() || name.contains(char::is_whitespace) {
                return Err(PkiError::invalid_profile(
                    cn,
                    format!("invalid DNS name '{}'", name),
                ));
            }
        }

        match self.template {
            Template::Server => {
                if !self.has_sans() {
                    return fail("server certificate needs at least one IP or DNS SAN");
                }
                if !self.key_purposes.contains(&KeyPurpose::ServerAuth) {
                    return fail("server certificate must allow server authentication");
                }
            }
            Template::Client => {
                if self.has_sans() {
                    return fail("client certificate must not carry SANs");
                }
                if !self.key_purposes.contains(&KeyPurpose::ClientAuth) {
                    return fail("client certificate must allow client authentication");
                }
            }
        }

        Ok(())
    }
}

/// A component name and the profile its certificate is issued from.
/// The component name is also the file stem in the PKI store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub component: String,
    pub profile: CertificateProfile,
}

impl Identity {
    pub fn new(component: impl Into<String>, profile: CertificateProfile) -> Self {
        Self {
            component: component.into(),
            profile,
        }
    }
}

/// Validate a component name used as a file stem.
/// Rules: lowercase `[a-z0-9-]`, max 63 chars, no leading/trailing hyphens.
pub fn validate_component_name(name: &str) -> Result<()> {
    let fail = |reason: String| Err(PkiError::invalid_component_name(name, reason));

    if name.is_empty() {
        return fail("component name must not be empty".to_string());
    }
    if name.len() > 63 {
        return fail(format!("component name exceeds 63 characters (got {})", name.len()));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return fail("component name must not start or end with a hyphen".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return fail("component name must contain only [a-z0-9-]".to_string());
    }
    Ok(())
}

/// The control-plane identities in issuance order.
pub fn control_plane_identities(advertise_address: IpAddr, hostname: &str) -> Vec<Identity> {
    let loopback = IpAddr::from([127, 0, 0, 1]);

    vec![
        Identity::new(
            KUBE_APISERVER,
            CertificateProfile::server("kube-apiserver")
                .ip_addresses([
                    loopback,
                    IpAddr::V4(KUBERNETES_SERVICE_IP),
                    advertise_address,
                ])
                .dns_names(API_SERVER_DNS_ALIASES.iter().copied())
                .dns_names([hostname]),
        ),
        Identity::new(
            APISERVER_KUBELET_CLIENT,
            CertificateProfile::client("apiserver-kubelet-client").organization(MASTERS_GROUP),
        ),
        Identity::new(
            APISERVER_ETCD_CLIENT,
            CertificateProfile::client("kube-apiserver-etcd-client").organization(MASTERS_GROUP),
        ),
        Identity::new(
            CONTROLLER_MANAGER,
            CertificateProfile::client("system:kube-controller-manager"),
        ),
        Identity::new(SCHEDULER, CertificateProfile::client("system:kube-scheduler")),
        Identity::new(
            ADMIN,
            CertificateProfile::client("kubernetes-admin").organization(MASTERS_GROUP),
        ),
        // etcd serves peers and clients with the same certificate (mutual TLS).
        Identity::new(
            ETCD_SERVER,
            CertificateProfile::server("etcd-server")
                .ip_addresses([loopback, advertise_address])
                .dns_names([LOCALHOST, hostname])
                .key_purposes([KeyPurpose::ServerAuth, KeyPurpose::ClientAuth]),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_constants::pki::CONTROL_PLANE_COMPONENTS;

    fn advertise() -> IpAddr {
        "192.0.2.10".parse().unwrap()
    }

    #[test]
    fn test_identity_order() {
        let ids = control_plane_identities(advertise(), "node-1");
        let names: Vec<&str> = ids.iter().map(|i| i.component.as_str()).collect();
        assert_eq!(names, CONTROL_PLANE_COMPONENTS);
    }

    #[test]
    fn test_all_identities_valid() {
        for id in control_plane_identities(advertise(), "node-1") {
            validate_component_name(&id.component).unwrap();
            id.profile.validate().unwrap();
        }
    }

    #[test]
    fn test_apiserver_sans() {
        let ids = control_plane_identities(advertise(), "node-1");
        let api = &ids[0].profile;

        assert!(api.is_server());
        assert_eq!(
            api.ip_addresses,
            vec![
                "127.0.0.1".parse::<IpAddr>().unwrap(),
                "10.96.0.1".parse().unwrap(),
                advertise(),
            ]
        );
        assert_eq!(
            api.dns_names,
            vec![
                "kubernetes",
                "kubernetes.default",
                "kubernetes.default.svc",
                "kubernetes.default.svc.cluster.local",
                "node-1",
            ]
        );
        assert_eq!(api.key_purposes, vec![KeyPurpose::ServerAuth]);
    }

    #[test]
    fn test_etcd_is_dual_purpose() {
        let ids = control_plane_identities(advertise(), "node-1");
        let etcd = &ids[6].profile;

        assert!(etcd.is_server());
        assert_eq!(
            etcd.key_purposes,
            vec![KeyPurpose::ServerAuth, KeyPurpose::ClientAuth]
        );
        assert_eq!(etcd.dns_names, vec!["localhost", "node-1"]);
        assert_eq!(etcd.ip_addresses.len(), 2);
    }

    #[test]
    fn test_masters_group_members() {
        let ids = control_plane_identities(advertise(), "node-1");
        let masters: Vec<&str> = ids
            .iter()
            .filter(|i| i.profile.organizations == vec![MASTERS_GROUP.to_string()])
            .map(|i| i.component.as_str())
            .collect();
        assert_eq!(
            masters,
            vec!["apiserver-kubelet-client", "apiserver-etcd-client", "admin"]
        );
    }

    #[test]
    fn test_client_profiles_have_no_sans() {
        for id in control_plane_identities(advertise(), "node-1") {
            if !id.profile.is_server() {
                assert!(!id.profile.has_sans(), "{} has SANs", id.component);
                assert_eq!(id.profile.key_purposes, vec![KeyPurpose::ClientAuth]);
            }
        }
    }

    #[test]
    fn test_server_without_sans_rejected() {
        let err = CertificateProfile::server("lonely").validate().unwrap_err();
        assert!(matches!(err, PkiError::InvalidProfile { .. }));
    }

    #[test]
    fn test_server_without_server_auth_rejected() {
        let profile = CertificateProfile::server("api")
            .dns_names(["api.local"])
            .key_purposes([KeyPurpose::ClientAuth]);
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_client_with_sans_rejected() {
        let profile = CertificateProfile::client("admin").dns_names(["admin.local"]);
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_invalid_profiles() {
        assert!(CertificateProfile::client("").validate().is_err());
        assert!(CertificateProfile::client("x").organization("").validate().is_err());
        assert!(
            CertificateProfile::client("x")
                .organization("a")
                .organization("a")
                .validate()
                .is_err()
        );
        assert!(
            CertificateProfile::client("x")
                .key_purposes([])
                .validate()
                .is_err()
        );
        assert!(
            CertificateProfile::client("x")
                .key_purposes([KeyPurpose::ClientAuth, KeyPurpose::ClientAuth])
                .validate()
                .is_err()
        );
        assert!(
            CertificateProfile::server("x")
                .dns_names(["bad name"])
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_several_organizations_allowed() {
        let profile = CertificateProfile::client("system:node:node-1")
            .organization("system:masters")
            .organization("system:nodes");
        profile.validate().unwrap();
        assert_eq!(profile.organizations, vec!["system:masters", "system:nodes"]);
    }

    #[test]
    fn test_component_names() {
        assert!(validate_component_name("kube-apiserver").is_ok());
        assert!(validate_component_name("etcd-server").is_ok());
        assert!(validate_component_name("").is_err());
        assert!(validate_component_name("../ca").is_err());
        assert!(validate_component_name("Admin").is_err());
        assert!(validate_component_name("-admin").is_err());
        assert!(validate_component_name(&"a".repeat(64)).is_err());

        let err = validate_component_name("kube_apiserver").unwrap_err();
        assert!(matches!(
            err,
            PkiError::InvalidComponentName { ref component, .. } if component == "kube_apiserver"
        ));
    }
}
