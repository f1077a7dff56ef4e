//! Combined certificate + key PEM files.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::artifacts::{restrict_to_owner, PRIVATE_FILE_MODE};
use crate::error::{PkiError, Result};

/// Bundle path for `cert` and `key`: their longest common prefix, less one
/// trailing dot, plus `.pem`.
///
/// `api/api.cert` and `api/api.key` give `api/api.pem`.
pub fn bundle_path(cert: &Path, key: &Path) -> Result<PathBuf> {
    let cert_str = cert
        .to_str()
        .ok_or_else(|| PkiError::NonUtf8Path(cert.to_path_buf()))?;
    let key_str = key
        .to_str()
        .ok_or_else(|| PkiError::NonUtf8Path(key.to_path_buf()))?;

    let shared = common_prefix(cert_str, key_str);
    let stem = shared.strip_suffix('.').unwrap_or(shared);
    Ok(PathBuf::from(format!("{stem}.pem")))
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let end = a
        .char_indices()
        .zip(b.chars())
        .find(|((_, x), y)| x != y)
        .map_or_else(|| a.len().min(b.len()), |((i, _), _)| i);
    &a[..end]
}

/// Write certificate bytes followed by key bytes into the bundle file.
pub async fn write_bundle(cert: &Path, key: &Path) -> Result<PathBuf> {
    let path = bundle_path(cert, key)?;

    let mut contents = tokio::fs::read(cert)
        .await
        .map_err(|e| PkiError::io(cert, e))?;
    contents.extend(tokio::fs::read(key).await.map_err(|e| PkiError::io(key, e))?);

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(PRIVATE_FILE_MODE);

    let mut file = options.open(&path).await.map_err(|e| PkiError::io(&path, e))?;
    file.write_all(&contents)
        .await
        .map_err(|e| PkiError::io(&path, e))?;
    file.flush().await.map_err(|e| PkiError::io(&path, e))?;
    drop(file);

    // An older bundle keeps its mode across truncation
    restrict_to_owner(&path).await?;

    info!(path = %path.display(), "wrote combined PEM");
    Ok(path)
}
