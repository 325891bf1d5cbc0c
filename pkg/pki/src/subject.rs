//! Subjects listing more than one organization.
//!
//! rcgen keeps a single value per attribute type in a distinguished name.
//! When a profile carries several groups, the subject is encoded here and
//! swapped into the certificate rcgen produced, and the result is signed
//! again with the CA key.

use ring::rand::SystemRandom;
use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
use x509_parser::certificate::X509Certificate;
use x509_parser::der_parser::asn1_rs::{self, Any};
use x509_parser::nom::Offset;
use x509_parser::prelude::FromDer;
use yasna::DERWriter;
use yasna::models::ObjectIdentifier;

use crate::error::{PkiError, Result};
use crate::keys::KeyPair;

const OID_COMMON_NAME: &[u64] = &[2, 5, 4, 3];
const OID_ORGANIZATION: &[u64] = &[2, 5, 4, 10];
const OID_SHA256_WITH_RSA: &[u64] = &[1, 2, 840, 113549, 1, 1, 11];

/// DER `Name`: the common name, then one RDN per organization in the order given.
pub(crate) fn encode_name(common_name: &str, organizations: &[String]) -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            write_rdn(writer.next(), OID_COMMON_NAME, common_name);
            for org in organizations {
                write_rdn(writer.next(), OID_ORGANIZATION, org);
            }
        })
    })
}

fn write_rdn(writer: DERWriter, oid: &[u64], value: &str) {
    writer.write_set(|writer| {
        writer.next().write_sequence(|writer| {
            writer.next().write_oid(&ObjectIdentifier::from_slice(oid));
            writer.next().write_utf8_string(value);
        })
    })
}

/// Replace the subject of `cert_der` with the DER `Name` in `subject` and
/// sign the rebuilt TBSCertificate with `issuer_key` (SHA-256 with RSA).
pub(crate) fn replace_subject(
    cert_der: &[u8],
    subject: &[u8],
    issuer_key: &KeyPair,
) -> Result<Vec<u8>> {
    let malformed = |reason: String| PkiError::Signing(format!("malformed certificate: {}", reason));

    let (_, cert) = X509Certificate::from_der(cert_der).map_err(|e| malformed(e.to_string()))?;
    let (_, tbs) = <Any as asn1_rs::FromDer>::from_der(cert.tbs_certificate.as_ref())
        .map_err(|e| malformed(e.to_string()))?;
    let fields = tbs.data;
    let old = cert.subject().as_raw();

    // Both slices borrow `cert_der`; the subject sits inside the TBS fields.
    let start = fields.offset(old);
    let end = start + old.len();
    if fields.get(start..end) != Some(old) {
        return Err(malformed("subject not found in TBSCertificate".to_string()));
    }

    let new_tbs = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_der(&fields[..start]);
            writer.next().write_der(subject);
            writer.next().write_der(&fields[end..]);
        })
    });
    let signature = sign(&new_tbs, issuer_key)?;

    Ok(yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_der(&new_tbs);
            writer.next().write_sequence(|writer| {
                writer
                    .next()
                    .write_oid(&ObjectIdentifier::from_slice(OID_SHA256_WITH_RSA));
                writer.next().write_null();
            });
            writer
                .next()
                .write_bitvec_bytes(&signature, signature.len() * 8);
        })
    }))
}

fn sign(message: &[u8], key: &KeyPair) -> Result<Vec<u8>> {
    let signer = RsaKeyPair::from_der(&key.to_pkcs1_der()?)
        .map_err(|e| PkiError::Signing(e.to_string()))?;
    let mut signature = vec![0u8; signer.public().modulus_len()];
    signer
        .sign(&RSA_PKCS1_SHA256, &SystemRandom::new(), message, &mut signature)
        .map_err(|e| PkiError::Signing(e.to_string()))?;
    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use x509_parser::x509::X509Name;

    #[test]
    fn test_encode_name_keeps_every_organization() {
        let orgs = vec!["system:masters".to_string(), "system:nodes".to_string()];
        let der = encode_name("system:node:node-1", &orgs);

        let (rest, name) = X509Name::from_der(&der).unwrap();
        assert!(rest.is_empty());
        let cn = name.iter_common_name().next().unwrap();
        assert_eq!(cn.as_str().unwrap(), "system:node:node-1");
        let found: Vec<&str> = name
            .iter_organization()
            .map(|o| o.as_str().unwrap())
            .collect();
        assert_eq!(found, vec!["system:masters", "system:nodes"]);
        // One attribute per RDN, so the order survives DER SET sorting.
        assert_eq!(name.iter().count(), 3);
    }
}
