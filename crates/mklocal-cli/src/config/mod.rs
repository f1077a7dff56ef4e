//! Defaults file management.
//!
//! Values here sit between the command line and the built-in defaults:
//! anything given on the command line wins.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use mklocal_core::{FailurePolicy, Subject};

/// Per-user defaults, read from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// openssl executable
    pub openssl: Option<PathBuf>,

    /// Host key size in bits
    pub bits: Option<u32>,

    /// Host certificate validity in days
    pub days: Option<u32>,

    /// Subject fields applied to every request
    #[serde(default)]
    pub subject: Subject,

    /// Domains used when none are given with `--domain`
    #[serde(default)]
    pub domains: Vec<String>,

    /// Directory in which host directories are created
    pub out_dir: Option<PathBuf>,

    /// Behaviour after a failed openssl step
    pub failure_policy: Option<FailurePolicy>,

    /// Hosts to process at once
    pub jobs: Option<u16>,

    /// Local CA defaults
    #[serde(default)]
    pub ca: CaConfig,
}

/// `[ca]` table of the defaults file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaConfig {
    pub dir: Option<PathBuf>,
    pub prefix: Option<String>,
    pub days: Option<u32>,
    pub bits: Option<u32>,
    /// Random bytes in the CA passphrase
    pub codigo_len: Option<u32>,
}

impl Config {
    /// Get the default config file path.
    pub fn path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "mousebrains", "mklocal")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load the defaults file.
    ///
    /// An explicitly named file must exist; the per-user file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let Ok(path) = Self::path() else {
                    return Ok(Self::default());
                };
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        Ok(config)
    }
}
