//! Leaf certificate issuance for control-plane components.

use pkg_constants::paths::CERTIFICATE_MODE;
use pkg_constants::pki::{LEAF_SERIAL_BYTES, LEAF_VALIDITY_YEARS};
use rand::RngCore;
use rand::rngs::OsRng;
use rcgen::{
    CertificateParams, DistinguishedName, DnType, IsCa, KeyUsagePurpose, SanType, SerialNumber,
};
use tracing::{debug, info};

use crate::ca::{CertificateAuthority, validity_window};
use crate::error::{PkiError, Result};
use crate::keys::{KeyPair, generate_key};
use crate::profile::{CertificateProfile, Template, validate_component_name};
use crate::store::{CERTIFICATE_TAG, PkiStore};
use crate::subject;

/// A freshly issued and persisted leaf certificate.
#[derive(Debug, Clone)]
pub struct LeafCertificate {
    pub component: String,
    pub key: KeyPair,
    pub cert_der: Vec<u8>,
}

/// Sign a certificate for `key` described by `profile` with the CA key.
/// Returns the certificate DER.
pub fn sign_leaf(
    key: &KeyPair,
    profile: &CertificateProfile,
    ca: &CertificateAuthority,
) -> Result<Vec<u8>> {
    profile.validate()?;
    let (not_before, not_after) = validity_window(LEAF_VALIDITY_YEARS)?;

    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, profile.common_name.as_str());
    if let [org] = profile.organizations.as_slice() {
        params
            .distinguished_name
            .push(DnType::OrganizationName, org.as_str());
    }
    params.serial_number = Some(random_serial());
    params.not_before = not_before;
    params.not_after = not_after;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = profile
        .key_purposes
        .iter()
        .map(|p| p.to_rcgen())
        .collect();

    match profile.template {
        Template::Server => {
            params.is_ca = IsCa::ExplicitNoCa;
            for ip in &profile.ip_addresses {
                params.subject_alt_names.push(SanType::IpAddress(*ip));
            }
            for name in &profile.dns_names {
                params
                    .subject_alt_names
                    .push(SanType::DnsName(name.as_str().try_into()?));
            }
        }
        Template::Client => {
            params.is_ca = IsCa::NoCa;
        }
    }

    let (issuer_cert, issuer_key) = ca.issuer()?;
    let cert = params.signed_by(&key.signing_key()?, &issuer_cert, &issuer_key)?;

    if profile.organizations.len() > 1 {
        let name = subject::encode_name(&profile.common_name, &profile.organizations);
        return subject::replace_subject(cert.der(), &name, ca.key());
    }
    Ok(cert.der().to_vec())
}

/// Issue `<component>.key` / `<component>.crt`, signing with the CA loaded
/// from `store`.
pub fn issue(
    store: &PkiStore,
    component: &str,
    profile: &CertificateProfile,
) -> Result<LeafCertificate> {
    issue_inner(store, component, profile, None).map_err(|e| wrap(component, e))
}

/// Like [`issue`], but signs with an already loaded CA instead of reading it
/// from the store.
pub fn issue_with_ca(
    store: &PkiStore,
    component: &str,
    profile: &CertificateProfile,
    ca: &CertificateAuthority,
) -> Result<LeafCertificate> {
    issue_inner(store, component, profile, Some(ca)).map_err(|e| wrap(component, e))
}

fn issue_inner(
    store: &PkiStore,
    component: &str,
    profile: &CertificateProfile,
    ca: Option<&CertificateAuthority>,
) -> Result<LeafCertificate> {
    validate_component_name(component)?;
    debug!("Issuing {} certificate (CN={})", component, profile.common_name);

    let key = generate_key()?;
    let loaded;
    let ca = match ca {
        Some(ca) => ca,
        None => {
            loaded = CertificateAuthority::load(store)?;
            &loaded
        }
    };
    let cert_der = sign_leaf(&key, profile, ca)?;

    store.ensure_dir()?;
    key.write(store, &store.key_path(component))?;
    store.write_pem(
        &store.cert_path(component),
        CERTIFICATE_TAG,
        &cert_der,
        CERTIFICATE_MODE,
    )?;

    info!("[certificate] {} certificate successfully generated", component);

    Ok(LeafCertificate {
        component: component.to_string(),
        key,
        cert_der,
    })
}

fn wrap(component: &str, e: PkiError) -> PkiError {
    PkiError::LeafIssuance {
        component: component.to_string(),
        source: Box::new(e),
    }
}

/// Serial drawn uniformly from [0, 2^128).
fn random_serial() -> SerialNumber {
    let mut bytes = [0u8; LEAF_SERIAL_BYTES];
    OsRng.fill_bytes(&mut bytes);
    SerialNumber::from_slice(&bytes)
}
