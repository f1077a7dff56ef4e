//! The external PKI tool.
//!
//! [`PkiBackend`] is the whole surface the issuance code needs from a
//! cryptography provider. [`OpensslCli`] implements it by running an
//! `openssl`-compatible executable once per operation.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{info, warn};

use crate::artifacts::CaArtifacts;
use crate::error::{PkiError, Result};
use crate::request_config::{CA_PROFILE, REQUEST_PROFILE};

/// Digest used for every request and signature.
pub const DIGEST: &str = "-sha256";

/// Which kind of PEM object to dump as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpKind {
    Request,
    Certificate,
}

/// Cryptographic operations delegated to an external provider.
#[async_trait]
pub trait PkiBackend: Send + Sync {
    /// Write `length` random bytes, base64 encoded, to `out`.
    async fn random_passphrase(&self, out: &Path, length: u32) -> Result<()>;

    /// Generate an RSA key; encrypted with AES-256 when `passphrase` is given.
    async fn generate_key(&self, out: &Path, bits: u32, passphrase: Option<&Path>) -> Result<()>;

    /// Create a CSR for `key` from the request configuration at `config`.
    async fn create_csr(&self, config: &Path, key: &Path, out: &Path) -> Result<()>;

    /// Self-sign the CA certificate with the CA profile of `config`.
    async fn self_sign_ca(
        &self,
        config: &Path,
        key: &Path,
        passphrase: &Path,
        days: u32,
        out: &Path,
    ) -> Result<()>;

    /// Sign `csr` with the request's own `key`.
    async fn self_sign(
        &self,
        csr: &Path,
        config: &Path,
        key: &Path,
        days: u32,
        out: &Path,
    ) -> Result<()>;

    /// Sign `csr` with the local CA.
    async fn ca_sign(
        &self,
        csr: &Path,
        config: &Path,
        ca: &CaArtifacts,
        days: u32,
        out: &Path,
    ) -> Result<()>;

    /// Human-readable dump of a request or certificate.
    async fn dump_text(&self, kind: DumpKind, path: &Path) -> Result<String>;
}

/// Whether a successful run's output goes to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Echo {
    Output,
    /// The caller hands the output on itself
    Quiet,
}

/// Runs an `openssl` executable for each operation.
#[derive(Debug, Clone)]
pub struct OpensslCli {
    program: PathBuf,
}

impl OpensslCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the tool with `args`, echoing the command line and its combined
    /// output. Non-zero exit is an error carrying that output.
    async fn run(&self, args: Vec<OsString>) -> Result<String> {
        self.execute(args, Echo::Output).await
    }

    async fn execute(&self, args: Vec<OsString>, echo: Echo) -> Result<String> {
        let command = self.command_line(&args);
        info!("{command}");

        // stderr is folded into the same text so the echo reads like a terminal
        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| PkiError::ToolSpawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            if echo == Echo::Output && !text.trim().is_empty() {
                info!("{}", text.trim_end());
            }
            Ok(text)
        } else {
            warn!(status = %output.status, "{}", text.trim_end());
            Err(PkiError::ToolFailed {
                command,
                status: output.status,
                output: text,
            })
        }
    }

    fn command_line(&self, args: &[OsString]) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Argument lists for each operation, kept separate from process handling.
pub mod args {
    use super::{DumpKind, CA_PROFILE, DIGEST, REQUEST_PROFILE};
    use crate::artifacts::CaArtifacts;
    use std::ffi::OsString;
    use std::path::Path;

    macro_rules! argv {
        ($($part:expr),* $(,)?) => {
            vec![$(OsString::from($part)),*]
        };
    }

    fn file_source(path: &Path) -> OsString {
        let mut arg = OsString::from("file:");
        arg.push(path);
        arg
    }

    pub fn random_passphrase(out: &Path, length: u32) -> Vec<OsString> {
        argv!["rand", "-out", out, "-base64", length.to_string()]
    }

    pub fn generate_key(out: &Path, bits: u32, passphrase: Option<&Path>) -> Vec<OsString> {
        let mut args = argv!["genrsa", "-out", out];
        if let Some(passphrase) = passphrase {
            args.extend(argv!["-aes256", "-passout", file_source(passphrase)]);
        }
        args.push(bits.to_string().into());
        args
    }

    pub fn create_csr(config: &Path, key: &Path, out: &Path) -> Vec<OsString> {
        argv![
            "req",
            "-new",
            "-extensions",
            REQUEST_PROFILE,
            "-config",
            config,
            DIGEST,
            "-key",
            key,
            "-out",
            out,
        ]
    }

    pub fn self_sign_ca(
        config: &Path,
        key: &Path,
        passphrase: &Path,
        days: u32,
        out: &Path,
    ) -> Vec<OsString> {
        argv![
            "req",
            "-new",
            "-x509",
            "-extensions",
            CA_PROFILE,
            "-config",
            config,
            "-days",
            days.to_string(),
            "-key",
            key,
            "-passin",
            file_source(passphrase),
            DIGEST,
            "-out",
            out,
        ]
    }

    fn sign_request(csr: &Path, config: &Path, days: u32, out: &Path) -> Vec<OsString> {
        argv![
            "x509",
            "-req",
            "-extensions",
            REQUEST_PROFILE,
            "-extfile",
            config,
            "-days",
            days.to_string(),
            DIGEST,
            "-in",
            csr,
            "-out",
            out,
        ]
    }

    pub fn self_sign(csr: &Path, config: &Path, key: &Path, days: u32, out: &Path) -> Vec<OsString> {
        let mut args = sign_request(csr, config, days, out);
        args.extend(argv!["-signkey", key]);
        args
    }

    pub fn ca_sign(
        csr: &Path,
        config: &Path,
        ca: &CaArtifacts,
        days: u32,
        out: &Path,
    ) -> Vec<OsString> {
        let mut args = sign_request(csr, config, days, out);
        args.extend(argv![
            "-CA",
            &ca.cert,
            "-CAkey",
            &ca.key,
            "-passin",
            file_source(&ca.passphrase),
            "-CAcreateserial",
        ]);
        args
    }

    pub fn dump_text(kind: DumpKind, path: &Path) -> Vec<OsString> {
        let command = match kind {
            DumpKind::Request => "req",
            DumpKind::Certificate => "x509",
        };
        argv![command, "-text", "-noout", "-in", path]
    }
}

#[async_trait]
impl PkiBackend for OpensslCli {
    async fn random_passphrase(&self, out: &Path, length: u32) -> Result<()> {
        self.run(args::random_passphrase(out, length)).await.map(drop)
    }

    async fn generate_key(&self, out: &Path, bits: u32, passphrase: Option<&Path>) -> Result<()> {
        self.run(args::generate_key(out, bits, passphrase))
            .await
            .map(drop)
    }

    async fn create_csr(&self, config: &Path, key: &Path, out: &Path) -> Result<()> {
        self.run(args::create_csr(config, key, out)).await.map(drop)
    }

    async fn self_sign_ca(
        &self,
        config: &Path,
        key: &Path,
        passphrase: &Path,
        days: u32,
        out: &Path,
    ) -> Result<()> {
        self.run(args::self_sign_ca(config, key, passphrase, days, out))
            .await
            .map(drop)
    }

    async fn self_sign(
        &self,
        csr: &Path,
        config: &Path,
        key: &Path,
        days: u32,
        out: &Path,
    ) -> Result<()> {
        self.run(args::self_sign(csr, config, key, days, out))
            .await
            .map(drop)
    }

    async fn ca_sign(
        &self,
        csr: &Path,
        config: &Path,
        ca: &CaArtifacts,
        days: u32,
        out: &Path,
    ) -> Result<()> {
        self.run(args::ca_sign(csr, config, ca, days, out))
            .await
            .map(drop)
    }

    async fn dump_text(&self, kind: DumpKind, path: &Path) -> Result<String> {
        self.execute(args::dump_text(kind, path), Echo::Quiet).await
    }
}
