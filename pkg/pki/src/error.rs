use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while generating, signing, storing or loading PKI material.
#[derive(Debug, Error)]
pub enum PkiError {
    /// RSA key generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(#[source] rsa::Error),

    /// A key could not be converted between encodings.
    #[error("key encoding failed: {0}")]
    KeyEncoding(String),

    /// Building or self-signing the root CA failed.
    #[error("CA generation failed: {0}")]
    CaGeneration(#[source] Box<PkiError>),

    /// Creating, writing or chmod-ing a store path failed.
    #[error("storage error at {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `ca.key` or `ca.crt` does not exist.
    #[error("CA file not found: {}", .0.display())]
    CaMissing(PathBuf),

    /// The CA files exist but do not hold a usable certificate or key.
    #[error("failed to parse CA: {0}")]
    CaParse(String),

    /// A file does not hold exactly one PEM block of the expected type.
    #[error("PEM decode failed for {}: {reason}", .path.display())]
    PemDecode { path: PathBuf, reason: String },

    /// A certificate profile violates the rules for its template.
    #[error("invalid profile '{common_name}': {reason}")]
    InvalidProfile { common_name: String, reason: String },

    /// A component name cannot be used as a store file stem.
    #[error("invalid component name '{component}': {reason}")]
    InvalidComponentName { component: String, reason: String },

    /// A validity window could not be computed.
    #[error("invalid validity period: {0}")]
    Validity(#[from] time::error::ComponentRange),

    /// Certificate construction or signing failed.
    #[error("certificate error: {0}")]
    Certificate(#[from] rcgen::Error),

    /// Signing a re-encoded certificate with the CA key failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Issuing one component's certificate failed.
    #[error("{component} certificate issuance failed: {source}")]
    LeafIssuance {
        component: String,
        #[source]
        source: Box<PkiError>,
    },

    /// A bootstrap run can only be executed once.
    #[error("bootstrap already ran (phase: {0})")]
    AlreadyRun(String),
}

impl PkiError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PkiError::Storage {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn pem_decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PkiError::PemDecode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_profile(common_name: &str, reason: impl Into<String>) -> Self {
        PkiError::InvalidProfile {
            common_name: common_name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_component_name(component: &str, reason: impl Into<String>) -> Self {
        PkiError::InvalidComponentName {
            component: component.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PkiError>;
