//! RSA key material for the CA, every leaf identity and the service-account signer.

use std::fmt;

use pkg_constants::paths::{PRIVATE_KEY_MODE, PUBLIC_KEY_MODE, SA_KEY_FILE, SA_PUB_FILE};
use pkg_constants::pki::RSA_KEY_BITS;
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use tracing::info;

use crate::error::{PkiError, Result};
use crate::store::{PUBLIC_KEY_TAG, PkiStore, RSA_PRIVATE_KEY_TAG};

/// Generate a fresh 2048-bit RSA key from the OS random source.
pub fn generate_key() -> Result<KeyPair> {
    let inner = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS).map_err(PkiError::KeyGeneration)?;
    Ok(KeyPair { inner })
}

/// An RSA private key and its implied public key.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    inner: RsaPrivateKey,
}

impl KeyPair {
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self> {
        let inner =
            RsaPrivateKey::from_pkcs1_der(der).map_err(|e| PkiError::KeyEncoding(e.to_string()))?;
        Ok(Self { inner })
    }

    /// PKCS#1 DER, the encoding written to `*.key` files.
    pub fn to_pkcs1_der(&self) -> Result<Vec<u8>> {
        let doc = self
            .inner
            .to_pkcs1_der()
            .map_err(|e| PkiError::KeyEncoding(e.to_string()))?;
        Ok(doc.as_bytes().to_vec())
    }

    /// SubjectPublicKeyInfo DER of the public half.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        let doc = self
            .inner
            .to_public_key()
            .to_public_key_der()
            .map_err(|e| PkiError::KeyEncoding(e.to_string()))?;
        Ok(doc.as_bytes().to_vec())
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.inner.size() * 8
    }

    /// Convert into an rcgen key pair that signs with SHA-256/RSA.
    pub(crate) fn signing_key(&self) -> Result<rcgen::KeyPair> {
        let pkcs8 = self
            .inner
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| PkiError::KeyEncoding(e.to_string()))?;
        Ok(rcgen::KeyPair::from_pem_and_sign_algo(
            &pkcs8,
            &rcgen::PKCS_RSA_SHA256,
        )?)
    }

    pub(crate) fn write(&self, store: &PkiStore, path: &std::path::Path) -> Result<()> {
        store.write_pem(path, RSA_PRIVATE_KEY_TAG, &self.to_pkcs1_der()?, PRIVATE_KEY_MODE)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &"RSA")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

/// Bare keypair used to sign and verify service-account tokens. Not part of
/// the CA chain.
#[derive(Debug, Clone)]
pub struct ServiceAccountKeyPair {
    key: KeyPair,
}

impl ServiceAccountKeyPair {
    pub fn generate() -> Result<Self> {
        Ok(Self {
            key: generate_key()?,
        })
    }

    pub fn key(&self) -> &KeyPair {
        &self.key
    }

    /// Write `sa.key` (owner-only) and `sa.pub`.
    pub fn persist(&self, store: &PkiStore) -> Result<()> {
        store.ensure_dir()?;
        self.key.write(store, &store.path(SA_KEY_FILE))?;
        store.write_pem(
            &store.path(SA_PUB_FILE),
            PUBLIC_KEY_TAG,
            &self.key.public_key_der()?,
            PUBLIC_KEY_MODE,
        )?;

        info!("[certificate] Service account keys successfully generated");
        Ok(())
    }
}
