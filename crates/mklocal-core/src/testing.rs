//! In-process stand-in for the PKI tool used by unit tests.

use async_trait::async_trait;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::Mutex;

use crate::artifacts::CaArtifacts;
use crate::error::{PkiError, Result};
use crate::tool::{DumpKind, PkiBackend};

/// Records every operation and writes a placeholder to each output file.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<&'static str>>,
    fail_on: Option<&'static str>,
}

impl RecordingBackend {
    /// A backend whose `operation` always exits unsuccessfully.
    pub fn failing_on(operation: &'static str) -> Self {
        Self {
            calls: Mutex::default(),
            fail_on: Some(operation),
        }
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str, out: Option<&Path>) -> Result<()> {
        self.calls.lock().unwrap().push(operation);

        if self.fail_on == Some(operation) {
            return Err(PkiError::ToolFailed {
                command: operation.to_string(),
                status: failure_status(),
                output: format!("{operation}: simulated failure\n"),
            });
        }
        if let Some(out) = out {
            std::fs::write(out, format!("{operation} output\n")).map_err(|e| PkiError::io(out, e))?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn failure_status() -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(1 << 8)
}

#[cfg(windows)]
fn failure_status() -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(1)
}

#[async_trait]
impl PkiBackend for RecordingBackend {
    async fn random_passphrase(&self, out: &Path, _length: u32) -> Result<()> {
        self.record("random_passphrase", Some(out))
    }

    async fn generate_key(&self, out: &Path, _bits: u32, _passphrase: Option<&Path>) -> Result<()> {
        self.record("generate_key", Some(out))
    }

    async fn create_csr(&self, _config: &Path, _key: &Path, out: &Path) -> Result<()> {
        self.record("create_csr", Some(out))
    }

    async fn self_sign_ca(
        &self,
        _config: &Path,
        _key: &Path,
        _passphrase: &Path,
        _days: u32,
        out: &Path,
    ) -> Result<()> {
        self.record("self_sign_ca", Some(out))
    }

    async fn self_sign(
        &self,
        _csr: &Path,
        _config: &Path,
        _key: &Path,
        _days: u32,
        out: &Path,
    ) -> Result<()> {
        self.record("self_sign", Some(out))
    }

    async fn ca_sign(
        &self,
        _csr: &Path,
        _config: &Path,
        _ca: &CaArtifacts,
        _days: u32,
        out: &Path,
    ) -> Result<()> {
        self.record("ca_sign", Some(out))
    }

    async fn dump_text(&self, _kind: DumpKind, path: &Path) -> Result<String> {
        self.record("dump_text", None)?;
        Ok(format!("Text of {}\n", path.display()))
    }
}
