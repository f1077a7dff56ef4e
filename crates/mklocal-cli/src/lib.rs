//! # mklocal-cli
//!
//! Command-line front end for `mklocal-core`.
//!
//! ## Features
//!
//! - **Self-signed certificates**: `mklocal --self web db`
//! - **CSRs**: new key (`--csr`) or from an existing key (`--renew`)
//! - **Local CA**: `--ca` creates a CA on first use and signs with it
//! - **Defaults file**: subject fields and tool settings in `config.toml`

pub mod cli;
pub mod config;
pub mod output;

pub use cli::run;
