//! Local certificate authority bootstrap.
//!
//! The CA is created lazily the first time a CA-signed certificate is
//! requested and reused verbatim afterwards. Completeness is judged only by
//! the presence of its four files; a partial set is regenerated from scratch.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::artifacts::{ensure_private_dir, restrict_to_owner, CaArtifacts};
use crate::error::{PkiError, Result};
use crate::request_config::RequestConfig;
use crate::settings::Settings;
use crate::tool::{DumpKind, PkiBackend};

/// Outcome of [`bootstrap`].
#[derive(Debug, Clone)]
pub struct CaBootstrap {
    pub artifacts: CaArtifacts,
    /// True if this call generated the CA
    pub created: bool,
    /// Text dump of the new CA certificate, in verbose mode
    pub dump: Option<String>,
}

/// Exclusive marker held while the CA is being generated. Removed on drop.
#[derive(Debug)]
struct CaLock {
    path: PathBuf,
}

impl CaLock {
    async fn acquire(path: PathBuf) -> Result<Self> {
        let created = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        match created {
            Ok(_) => {
                debug!(path = %path.display(), "acquired CA lock");
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(PkiError::CaLocked(path))
            }
            Err(e) => Err(PkiError::io(path, e)),
        }
    }
}

// Drop cannot await
impl Drop for CaLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove CA lock");
        }
    }
}

/// Make sure a usable CA exists and return its artifact paths.
///
/// With all four files present this performs no external calls. Otherwise
/// the directory is created (owner-only), and configuration, passphrase,
/// encrypted key and self-signed certificate are all written anew. There is
/// no rollback: a failure part way leaves an incomplete CA that the next run
/// regenerates.
pub async fn bootstrap(settings: &Settings, backend: &dyn PkiBackend) -> Result<CaBootstrap> {
    let artifacts = CaArtifacts::new(&settings.ca);

    if artifacts.is_complete().await {
        debug!(dir = %artifacts.dir.display(), "reusing existing CA");
        return Ok(CaBootstrap {
            artifacts,
            created: false,
            dump: None,
        });
    }

    ensure_private_dir(&artifacts.dir).await?;
    let _lock = CaLock::acquire(artifacts.lock_path()).await?;

    // another run may have completed it before we took the lock
    if artifacts.is_complete().await {
        return Ok(CaBootstrap {
            artifacts,
            created: false,
            dump: None,
        });
    }

    let present = artifacts.present().await;
    if !present.is_empty() {
        warn!(
            files = %display_list(&present),
            "CA is incomplete; regenerating, certificates signed by the old CA key will no longer chain to it"
        );
    }

    info!(dir = %artifacts.dir.display(), prefix = %settings.ca.prefix, "creating local CA");
    generate(settings, backend, &artifacts).await?;

    let dump = if settings.verbose {
        match backend.dump_text(DumpKind::Certificate, &artifacts.cert).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "could not dump CA certificate");
                None
            }
        }
    } else {
        None
    };

    Ok(CaBootstrap {
        artifacts,
        created: true,
        dump,
    })
}

async fn generate(settings: &Settings, backend: &dyn PkiBackend, ca: &CaArtifacts) -> Result<()> {
    RequestConfig::for_ca(settings).write(&ca.config).await?;

    backend
        .random_passphrase(&ca.passphrase, settings.ca.passphrase_len)
        .await?;
    restrict_to_owner(&ca.passphrase).await?;

    backend
        .generate_key(&ca.key, settings.ca.bits, Some(&ca.passphrase))
        .await?;
    restrict_to_owner(&ca.key).await?;

    backend
        .self_sign_ca(&ca.config, &ca.key, &ca.passphrase, settings.ca.days, &ca.cert)
        .await
}

fn display_list(paths: &[&Path]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
