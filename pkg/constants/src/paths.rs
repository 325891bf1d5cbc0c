//! Filesystem path constants.

// ─── Config ───────────────────────────────────────────────────────────────

/// Default config file path for `kubestrap init`.
pub const DEFAULT_CONFIG: &str = "/etc/kubestrap/config.yaml";

// ─── PKI store ────────────────────────────────────────────────────────────

/// Default directory holding every key and certificate produced by a bootstrap run.
pub const DEFAULT_PKI_DIR: &str = "/etc/kubernetes/pki";

/// Mode applied to the PKI directory when it is created.
pub const PKI_DIR_MODE: u32 = 0o755;

/// Mode for private key files.
pub const PRIVATE_KEY_MODE: u32 = 0o600;

/// Mode for certificate files. Certificates are not secret, but the store
/// keeps them owner-only like the keys next to them.
pub const CERTIFICATE_MODE: u32 = 0o600;

/// Mode for the service-account public key.
pub const PUBLIC_KEY_MODE: u32 = 0o644;

// ─── File names ───────────────────────────────────────────────────────────

/// CA private key file name inside the PKI directory.
pub const CA_KEY_FILE: &str = "ca.key";

/// CA certificate file name inside the PKI directory.
pub const CA_CERT_FILE: &str = "ca.crt";

/// Service-account signing key file name.
pub const SA_KEY_FILE: &str = "sa.key";

/// Service-account verification key file name.
pub const SA_PUB_FILE: &str = "sa.pub";

/// Extension for per-component private keys (`<component>.key`).
pub const KEY_EXTENSION: &str = "key";

/// Extension for per-component certificates (`<component>.crt`).
pub const CERT_EXTENSION: &str = "crt";
