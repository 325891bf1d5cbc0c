use std::io;
use std::path::Path;

use pkg_constants::paths::{CA_CERT_FILE, CA_KEY_FILE, CERTIFICATE_MODE};
use pkg_constants::pki::{CA_COMMON_NAME, CA_SERIAL_NUMBER, CA_VALIDITY_YEARS};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyUsagePurpose,
    SerialNumber,
};
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::{PkiError, Result};
use crate::keys::{KeyPair, generate_key};
use crate::store::{CERTIFICATE_TAG, PkiStore, RSA_PRIVATE_KEY_TAG};

/// Cluster root Certificate Authority.
/// Self-signed, created once per bootstrap run and reloaded from the store
/// to sign every leaf certificate.
#[derive(Debug, Clone)]
pub struct CertificateAuthority {
    key: KeyPair,
    cert_der: Vec<u8>,
}

impl CertificateAuthority {
    /// Generate a fresh key and a self-signed CA certificate.
    pub fn create() -> Result<Self> {
        info!("Generating cluster CA");
        Self::build().map_err(|e| PkiError::CaGeneration(Box::new(e)))
    }

    fn build() -> Result<Self> {
        let key = generate_key()?;
        let (not_before, not_after) = validity_window(CA_VALIDITY_YEARS)?;

        let mut params = CertificateParams::default();
        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, CA_COMMON_NAME);
        params.serial_number = Some(SerialNumber::from(CA_SERIAL_NUMBER));
        params.not_before = not_before;
        params.not_after = not_after;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];

        let cert = params.self_signed(&key.signing_key()?)?;

        Ok(Self {
            key,
            cert_der: cert.der().to_vec(),
        })
    }

    /// Write `ca.key` and `ca.crt` into the store, creating it if needed.
    /// The key is written first; a failed certificate write leaves it in place.
    pub fn persist(&self, store: &PkiStore) -> Result<()> {
        store.ensure_dir()?;

        let cert_path = store.path(CA_CERT_FILE);
        if cert_path.exists() {
            warn!(
                "Replacing existing CA at {}; certificates signed by it will no longer verify",
                cert_path.display()
            );
        }

        self.key.write(store, &store.path(CA_KEY_FILE))?;
        store.write_pem(&cert_path, CERTIFICATE_TAG, &self.cert_der, CERTIFICATE_MODE)?;

        info!("[certificate] CA certificate successfully generated");
        Ok(())
    }

    /// Read `ca.key` and `ca.crt` back from the store.
    pub fn load(store: &PkiStore) -> Result<Self> {
        let cert_path = store.path(CA_CERT_FILE);
        let key_path = store.path(CA_KEY_FILE);

        let cert_der = read_ca_file(store, &cert_path, CERTIFICATE_TAG)?;
        let key_der = read_ca_file(store, &key_path, RSA_PRIVATE_KEY_TAG)?;
        let key = KeyPair::from_pkcs1_der(&key_der)
            .map_err(|e| PkiError::CaParse(format!("{}: {}", key_path.display(), e)))?;

        check_ca_cert(&cert_der, &key).map_err(|reason| {
            PkiError::CaParse(format!("{}: {}", cert_path.display(), reason))
        })?;

        Ok(Self { key, cert_der })
    }

    pub fn key(&self) -> &KeyPair {
        &self.key
    }

    pub fn cert_der(&self) -> &[u8] {
        &self.cert_der
    }

    pub fn cert_pem(&self) -> String {
        pem::encode(&pem::Pem::new(CERTIFICATE_TAG, self.cert_der.clone()))
    }

    /// Rebuild the rcgen signing context for this CA from its stored DER.
    pub(crate) fn issuer(&self) -> Result<(rcgen::Certificate, rcgen::KeyPair)> {
        let params = CertificateParams::from_ca_cert_pem(&self.cert_pem())
            .map_err(|e| PkiError::CaParse(e.to_string()))?;
        let key = self.key.signing_key()?;
        let cert = params.self_signed(&key)?;
        Ok((cert, key))
    }
}

/// Absent files are `CaMissing`, other I/O failures stay `Storage`, and
/// malformed PEM is `CaParse`.
fn read_ca_file(store: &PkiStore, path: &Path, tag: &str) -> Result<Vec<u8>> {
    store.read_pem(path, tag).map_err(|e| match e {
        PkiError::Storage { ref source, .. } if source.kind() == io::ErrorKind::NotFound => {
            PkiError::CaMissing(path.to_path_buf())
        }
        e @ PkiError::Storage { .. } => e,
        other => PkiError::CaParse(other.to_string()),
    })
}

/// Confirm `der` is a CA certificate whose public key belongs to `key`.
fn check_ca_cert(der: &[u8], key: &KeyPair) -> std::result::Result<(), String> {
    let (_, cert) = X509Certificate::from_der(der).map_err(|e| e.to_string())?;
    if !cert.is_ca() {
        return Err("not a CA certificate".to_string());
    }
    let key_der = key.public_key_der().map_err(|e| e.to_string())?;
    if cert.public_key().raw != key_der.as_slice() {
        return Err("certificate does not match ca.key".to_string());
    }
    Ok(())
}

/// `now .. now + years`, counted in calendar years.
pub(crate) fn validity_window(years: i32) -> Result<(OffsetDateTime, OffsetDateTime)> {
    validity_window_from(OffsetDateTime::now_utc(), years)
}

fn validity_window_from(
    now: OffsetDateTime,
    years: i32,
) -> Result<(OffsetDateTime, OffsetDateTime)> {
    let target = now.year() + years;
    let not_after = match now.replace_year(target) {
        Ok(t) => t,
        // Feb 29 in a non-leap target year rolls over to Mar 1.
        Err(_) => now.replace_day(28)?.replace_year(target)? + Duration::days(1),
    };
    Ok((now, not_after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;
    use time::{Date, Month};

    fn parse(der: &[u8]) -> X509Certificate<'_> {
        X509Certificate::from_der(der).unwrap().1
    }

    #[test]
    fn test_create_ca_profile() {
        let ca = CertificateAuthority::create().unwrap();
        let cert = parse(ca.cert_der());

        assert!(cert.is_ca());
        let serial: Vec<u8> = cert
            .raw_serial()
            .iter()
            .copied()
            .skip_while(|b| *b == 0)
            .collect();
        assert_eq!(serial, vec![1]);
        assert_eq!(cert.subject().as_raw(), cert.issuer().as_raw());
        let cn = cert.subject().iter_common_name().next().unwrap();
        assert_eq!(cn.as_str().unwrap(), "kubernetes-ca");

        let ku = cert.key_usage().unwrap().unwrap().value;
        assert!(ku.key_cert_sign());
        assert!(ku.crl_sign());
        assert!(!ku.digital_signature());
        assert!(cert.extended_key_usage().unwrap().is_none());

        cert.verify_signature(None).unwrap();
    }

    #[test]
    fn test_ca_validity_is_ten_years() {
        let ca = CertificateAuthority::create().unwrap();
        let cert = parse(ca.cert_der());

        let days = (cert.validity().not_after.timestamp()
            - cert.validity().not_before.timestamp())
            / 86_400;
        assert!((3652..=3653).contains(&days), "got {} days", days);
    }

    #[test]
    fn test_two_cas_differ_only_in_key() {
        let a = CertificateAuthority::create().unwrap();
        let b = CertificateAuthority::create().unwrap();
        assert_ne!(a.key(), b.key());

        let (ca, cb) = (parse(a.cert_der()), parse(b.cert_der()));
        assert_eq!(ca.raw_serial(), cb.raw_serial());
        assert_ne!(ca.public_key().raw, cb.public_key().raw);
        let span = |c: &X509Certificate<'_>| {
            c.validity().not_after.timestamp() - c.validity().not_before.timestamp()
        };
        assert!((span(&ca) - span(&cb)).abs() <= 86_400);
    }

    #[test]
    fn test_persist_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = PkiStore::new(tmp.path().join("etc/kubernetes/pki"));

        let ca = CertificateAuthority::create().unwrap();
        ca.persist(&store).unwrap();

        for file in [CA_KEY_FILE, CA_CERT_FILE] {
            let mode = std::fs::metadata(store.path(file))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600, "{}", file);
        }

        let loaded = CertificateAuthority::load(&store).unwrap();
        assert_eq!(loaded.cert_der(), ca.cert_der());
        assert_eq!(
            loaded.key().to_pkcs1_der().unwrap(),
            ca.key().to_pkcs1_der().unwrap()
        );
        assert_eq!(loaded.cert_pem(), ca.cert_pem());
    }

    #[test]
    fn test_load_missing_ca() {
        let tmp = TempDir::new().unwrap();
        let store = PkiStore::new(tmp.path());

        let err = CertificateAuthority::load(&store).unwrap_err();
        assert!(matches!(err, PkiError::CaMissing(_)));
    }

    #[test]
    fn test_load_missing_key_only() {
        let tmp = TempDir::new().unwrap();
        let store = PkiStore::new(tmp.path());
        let ca = CertificateAuthority::create().unwrap();
        ca.persist(&store).unwrap();
        std::fs::remove_file(store.path(CA_KEY_FILE)).unwrap();

        match CertificateAuthority::load(&store).unwrap_err() {
            PkiError::CaMissing(path) => assert!(path.ends_with(CA_KEY_FILE)),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_load_malformed_ca() {
        let tmp = TempDir::new().unwrap();
        let store = PkiStore::new(tmp.path());
        let ca = CertificateAuthority::create().unwrap();
        ca.persist(&store).unwrap();

        std::fs::write(store.path(CA_CERT_FILE), "garbage").unwrap();
        assert!(matches!(
            CertificateAuthority::load(&store),
            Err(PkiError::CaParse(_))
        ));

        store
            .write_pem(&store.path(CA_CERT_FILE), CERTIFICATE_TAG, b"\x30\x00", 0o600)
            .unwrap();
        assert!(matches!(
            CertificateAuthority::load(&store),
            Err(PkiError::CaParse(_))
        ));
    }

    #[test]
    fn test_load_unreadable_ca_is_storage_error() {
        let tmp = TempDir::new().unwrap();
        let store = PkiStore::new(tmp.path());
        CertificateAuthority::create().unwrap().persist(&store).unwrap();

        std::fs::remove_file(store.path(CA_CERT_FILE)).unwrap();
        std::fs::create_dir(store.path(CA_CERT_FILE)).unwrap();

        match CertificateAuthority::load(&store).unwrap_err() {
            PkiError::Storage { path, .. } => assert!(path.ends_with(CA_CERT_FILE)),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_load_rejects_mismatched_key() {
        let tmp = TempDir::new().unwrap();
        let store = PkiStore::new(tmp.path());
        CertificateAuthority::create().unwrap().persist(&store).unwrap();

        let other = generate_key().unwrap();
        other.write(&store, &store.path(CA_KEY_FILE)).unwrap();

        assert!(matches!(
            CertificateAuthority::load(&store),
            Err(PkiError::CaParse(_))
        ));
    }

    #[test]
    fn test_validity_window_from_leap_day() {
        let leap_day = Date::from_calendar_date(2024, Month::February, 29)
            .unwrap()
            .midnight()
            .assume_utc();

        let (start, end) = validity_window_from(leap_day, 1).unwrap();
        assert_eq!(start, leap_day);
        assert_eq!(
            end.date(),
            Date::from_calendar_date(2025, Month::March, 1).unwrap()
        );

        let (_, end) = validity_window_from(leap_day, 4).unwrap();
        assert_eq!(
            end.date(),
            Date::from_calendar_date(2028, Month::February, 29).unwrap()
        );
    }

    #[test]
    fn test_validity_window_one_year() {
        let (start, end) = validity_window(1).unwrap();
        assert_eq!(end.year(), start.year() + 1);
        assert!(end - start >= Duration::days(365));
        assert!(end - start <= Duration::days(366));
    }
}
