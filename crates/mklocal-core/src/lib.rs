//! Keys, certificate signing requests and certificates for local hosts.
//!
//! Every cryptographic operation is delegated to an external PKI tool
//! (`openssl` by default). This crate decides what to ask it for:
//!
//! - **Request configuration**: subject fields, extension profiles and
//!   numbered subject alternative names ([`RequestConfig`])
//! - **Local CA**: created once on first use, reused afterwards ([`ca::bootstrap`])
//! - **Issuance**: key → CSR → signature → combined PEM, per host ([`Issuer`])
//!
//! # Example
//!
//! ```rust,ignore
//! use mklocal_core::{issue_all, Mode, OpensslCli, Settings};
//!
//! let mut settings = Settings::new(Mode::SelfSigned);
//! settings.alt_names.domains = vec!["example.com".into()];
//!
//! let backend = OpensslCli::new(&settings.tool);
//! let run = issue_all(&settings, &backend, &["api".to_string()]).await?;
//! assert!(run.hosts[0].bundle.is_some());
//! ```

pub mod artifacts;
pub mod bundle;
pub mod ca;
mod error;
pub mod issue;
pub mod request_config;
pub mod settings;
pub mod tool;
pub mod types;

#[cfg(test)]
mod testing;

pub use artifacts::{CaArtifacts, HostArtifacts};
pub use ca::CaBootstrap;
pub use error::{PkiError, Result};
pub use issue::{issue_all, HostReport, HostState, Issuer, RunReport};
pub use request_config::RequestConfig;
pub use settings::{CaSettings, FailurePolicy, Mode, Settings};
pub use tool::{OpensslCli, PkiBackend};
pub use types::*;
