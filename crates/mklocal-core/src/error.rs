use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Result type alias for certificate issuance operations
pub type Result<T> = std::result::Result<T, PkiError>;

/// Errors that can occur while producing keys, requests and certificates
#[derive(Error, Debug)]
pub enum PkiError {
    /// Reading or writing an artifact failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory being accessed
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The external PKI tool could not be started at all
    #[error("failed to run {program}: {source}")]
    ToolSpawn {
        /// Program that was invoked
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The external PKI tool exited unsuccessfully
    #[error("command failed ({status}): {command}")]
    ToolFailed {
        /// Full command line as echoed to the user
        command: String,
        /// Exit status of the process
        status: ExitStatus,
        /// Combined stdout and stderr
        output: String,
    },

    /// Renewal was requested but there is no key to renew from
    #[error("{} does not exist", .0.display())]
    MissingKey(PathBuf),

    /// Another process is bootstrapping the CA
    #[error("CA is locked by {}; remove it if no other mklocal is running", .0.display())]
    CaLocked(PathBuf),

    /// CA signing was requested from an issuer built without a CA
    #[error("CA mode requires a bootstrapped CA")]
    NoCa,

    /// Bundle names are derived textually and need UTF-8 paths
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
}

impl PkiError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the error should end the whole run rather than one host
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::CaLocked(_) | Self::NoCa | Self::NonUtf8Path(_)
        )
    }

    /// Returns true if the error came from the external tool
    #[must_use]
    pub const fn is_tool_error(&self) -> bool {
        matches!(self, Self::ToolSpawn { .. } | Self::ToolFailed { .. })
    }
}
