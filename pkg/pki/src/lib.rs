//! Control-plane PKI bootstrap.
//!
//! Creates a self-signed cluster CA, issues the leaf certificates the
//! control-plane components authenticate with, and generates the
//! service-account signing keypair. Everything lands in one [`PkiStore`]
//! directory as PEM files.

pub mod bootstrap;
pub mod ca;
pub mod error;
pub mod keys;
pub mod leaf;
pub mod profile;
pub mod store;
mod subject;

pub use bootstrap::{Bootstrap, BootstrapConfig, BootstrapReport, Phase, Step};
pub use ca::CertificateAuthority;
pub use error::{PkiError, Result};
pub use keys::{KeyPair, ServiceAccountKeyPair, generate_key};
pub use leaf::{LeafCertificate, issue, issue_with_ca, sign_leaf};
pub use profile::{CertificateProfile, Identity, KeyPurpose, Template, control_plane_identities};
pub use store::PkiStore;
