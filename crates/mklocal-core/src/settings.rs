//! Resolved, read-only settings for one run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{AltNames, Subject};

/// Default RSA key size for host keys
pub const DEFAULT_BITS: u32 = 4096;
/// Default host certificate validity, in days
pub const DEFAULT_DAYS: u32 = 3650;
/// Default external tool
pub const DEFAULT_TOOL: &str = "/usr/bin/openssl";
/// Default CA directory and file prefix
pub const DEFAULT_CA_NAME: &str = "CA";
/// Default CA certificate validity, in days
pub const DEFAULT_CA_DAYS: u32 = 7300;
/// Default RSA key size for the CA key
pub const DEFAULT_CA_BITS: u32 = 4096;
/// Default number of random bytes in the CA passphrase
pub const DEFAULT_PASSPHRASE_LEN: u32 = 96;

/// What to produce for each host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// New key and a self-signed certificate
    SelfSigned,
    /// New key and a CSR only
    Csr,
    /// CSR from the host's existing key
    Renew,
    /// New key and a certificate signed by the local CA
    Ca,
}

impl Mode {
    /// Whether a fresh key is generated before the CSR.
    pub const fn generates_key(self) -> bool {
        !matches!(self, Self::Renew)
    }

    /// Whether the pipeline continues past the CSR.
    pub const fn signs(self) -> bool {
        matches!(self, Self::SelfSigned | Self::Ca)
    }

    pub const fn uses_ca(self) -> bool {
        matches!(self, Self::Ca)
    }
}

/// What to do when the external tool fails partway through a host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abandon the host at the first failed step
    #[default]
    StopHost,
    /// Log the failure and attempt the host's remaining steps anyway
    KeepGoing,
}

/// Location and parameters of the local certificate authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaSettings {
    /// Directory holding the CA artifacts
    pub dir: PathBuf,
    /// File name prefix of the CA artifacts; also the CA common name
    pub prefix: String,
    /// CA certificate validity in days
    pub days: u32,
    /// CA key size in bits
    pub bits: u32,
    /// Random bytes in the passphrase (base64 encoded by the tool)
    pub passphrase_len: u32,
}

impl Default for CaSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_CA_NAME),
            prefix: DEFAULT_CA_NAME.to_string(),
            days: DEFAULT_CA_DAYS,
            bits: DEFAULT_CA_BITS,
            passphrase_len: DEFAULT_PASSPHRASE_LEN,
        }
    }
}

/// Everything an issuance run needs, fixed before the first host starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub mode: Mode,
    /// Path of the external PKI executable
    pub tool: PathBuf,
    /// Host key size in bits
    pub bits: u32,
    /// Host certificate validity in days
    pub days: u32,
    pub subject: Subject,
    pub alt_names: AltNames,
    /// Directory under which per-host directories are created
    pub out_dir: PathBuf,
    pub ca: CaSettings,
    pub failure_policy: FailurePolicy,
    /// Hosts processed concurrently; 1 is strictly sequential
    pub jobs: usize,
    /// Report text dumps of every request and certificate produced
    pub verbose: bool,
}

impl Settings {
    /// Settings for `mode` with every other value at its default.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            tool: PathBuf::from(DEFAULT_TOOL),
            bits: DEFAULT_BITS,
            days: DEFAULT_DAYS,
            subject: Subject::default(),
            alt_names: AltNames::default(),
            out_dir: PathBuf::from("."),
            ca: CaSettings::default(),
            failure_policy: FailurePolicy::default(),
            jobs: 1,
            verbose: false,
        }
    }
}
