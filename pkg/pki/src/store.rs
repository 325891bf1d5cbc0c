//! On-disk PKI store.
//!
//! One flat directory of PEM files: `ca.key`/`ca.crt`, one
//! `<component>.key`/`<component>.crt` pair per leaf identity, and
//! `sa.key`/`sa.pub`. The store has no locking; a bootstrap run writes each
//! file exactly once from a single thread.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use pkg_constants::paths::{CERT_EXTENSION, KEY_EXTENSION, PKI_DIR_MODE};
use tracing::debug;

use crate::error::{PkiError, Result};

/// PEM tag for PKCS#1 RSA private keys.
pub const RSA_PRIVATE_KEY_TAG: &str = "RSA PRIVATE KEY";
/// PEM tag for X.509 certificates.
pub const CERTIFICATE_TAG: &str = "CERTIFICATE";
/// PEM tag for SubjectPublicKeyInfo public keys.
pub const PUBLIC_KEY_TAG: &str = "PUBLIC KEY";

#[derive(Debug, Clone)]
pub struct PkiStore {
    root: PathBuf,
}

impl PkiStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the store directory and any missing parents.
    pub fn ensure_dir(&self) -> Result<()> {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(PKI_DIR_MODE)
            .create(&self.root)
            .map_err(|e| PkiError::storage(&self.root, e))
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub fn key_path(&self, component: &str) -> PathBuf {
        self.path(&format!("{}.{}", component, KEY_EXTENSION))
    }

    pub fn cert_path(&self, component: &str) -> PathBuf {
        self.path(&format!("{}.{}", component, CERT_EXTENSION))
    }

    /// Write `contents` as a single PEM block of type `tag`, replacing any
    /// existing file, and restrict the result to `mode`.
    ///
    /// The block goes to a sibling temp file first and is renamed into place,
    /// so `path` holds either the previous content or the complete new block.
    pub fn write_pem(&self, path: &Path, tag: &str, contents: &[u8], mode: u32) -> Result<()> {
        let encoded = pem::encode(&pem::Pem::new(tag, contents.to_vec()));
        let tmp = temp_path(path);

        let written = write_file(&tmp, encoded.as_bytes(), mode)
            .and_then(|()| fs::rename(&tmp, path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(PkiError::storage(path, e));
        }

        debug!("Wrote {} ({}, mode {:o})", path.display(), tag, mode);
        Ok(())
    }

    /// Read `path` and return the DER contents of its single PEM block,
    /// which must be of type `tag`. I/O failures are `Storage` errors; only
    /// content problems are `PemDecode`.
    pub fn read_pem(&self, path: &Path, tag: &str) -> Result<Vec<u8>> {
        let data = fs::read(path).map_err(|e| PkiError::storage(path, e))?;
        let mut blocks =
            pem::parse_many(&data).map_err(|e| PkiError::pem_decode(path, e.to_string()))?;

        match blocks.len() {
            0 => return Err(PkiError::pem_decode(path, "no PEM block found")),
            1 => {}
            n => {
                return Err(PkiError::pem_decode(
                    path,
                    format!("expected one PEM block, found {}", n),
                ));
            }
        }

        let block = blocks.remove(0);
        if block.tag() != tag {
            return Err(PkiError::pem_decode(
                path,
                format!("expected {} block, found {}", tag, block.tag()),
            ));
        }
        Ok(block.into_contents())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_file(path: &Path, contents: &[u8], mode: u32) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    // `mode` on open is filtered by the umask; set it explicitly.
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}
