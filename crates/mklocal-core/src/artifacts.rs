//! On-disk artifact layout and owner-only permission helpers.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PkiError, Result};
use crate::settings::CaSettings;

/// Mode for directories holding keys.
pub const PRIVATE_DIR_MODE: u32 = 0o700;
/// Mode for keys, passphrases and bundles.
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Files produced for one host, all inside a directory named after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostArtifacts {
    pub dir: PathBuf,
    pub config: PathBuf,
    pub key: PathBuf,
    pub csr: PathBuf,
    pub cert: PathBuf,
}

impl HostArtifacts {
    pub fn new(out_dir: &Path, host: &str) -> Self {
        let dir = out_dir.join(host);
        Self {
            config: dir.join(format!("{host}.config")),
            key: dir.join(format!("{host}.key")),
            csr: dir.join(format!("{host}.csr")),
            cert: dir.join(format!("{host}.cert")),
            dir,
        }
    }
}

/// Files making up the local certificate authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaArtifacts {
    pub dir: PathBuf,
    pub config: PathBuf,
    pub key: PathBuf,
    pub cert: PathBuf,
    /// Passphrase protecting `key`
    pub passphrase: PathBuf,
}

impl CaArtifacts {
    pub fn new(ca: &CaSettings) -> Self {
        let prefix = &ca.prefix;
        Self {
            config: ca.dir.join(format!("{prefix}.config")),
            key: ca.dir.join(format!("{prefix}.key")),
            cert: ca.dir.join(format!("{prefix}.cert")),
            passphrase: ca.dir.join(format!("{prefix}.codigo")),
            dir: ca.dir.clone(),
        }
    }

    /// The four files whose joint presence means the CA is usable.
    pub fn files(&self) -> [&Path; 4] {
        [&self.config, &self.key, &self.cert, &self.passphrase]
    }

    pub async fn is_complete(&self) -> bool {
        self.present().await.len() == self.files().len()
    }

    /// Files that exist right now, in [`files`](Self::files) order.
    pub async fn present(&self) -> Vec<&Path> {
        let mut found = Vec::new();
        for path in self.files() {
            if exists(path).await {
                found.push(path);
            }
        }
        found
    }

    /// Lock file guarding generation of this CA.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .key
            .file_stem()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".lock");
        self.dir.join(name)
    }
}

/// True if `path` exists; an unreadable parent counts as absent.
pub async fn exists(path: &Path) -> bool {
    matches!(tokio::fs::try_exists(path).await, Ok(true))
}

/// Create `dir` (and parents) if missing; a newly created leaf is owner-only.
pub async fn ensure_private_dir(dir: &Path) -> Result<()> {
    if tokio::fs::metadata(dir).await.is_ok_and(|m| m.is_dir()) {
        return Ok(());
    }

    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(PRIVATE_DIR_MODE);

    debug!(path = %dir.display(), "creating directory");
    builder.create(dir).await.map_err(|e| PkiError::io(dir, e))
}

/// Restrict `path` to owner read/write.
pub async fn restrict_to_owner(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let perms = std::fs::Permissions::from_mode(PRIVATE_FILE_MODE);
        tokio::fs::set_permissions(path, perms)
            .await
            .map_err(|e| PkiError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}
