//! Command-line argument definitions using clap.

use clap::{ArgGroup, Parser};
use std::net::IpAddr;
use std::path::PathBuf;

use mklocal_core::Mode;

/// Generate private keys, CSRs and certificates for local hosts
///
/// Every host gets its own directory holding NAME.key, NAME.config,
/// NAME.csr and, when signed, NAME.cert plus a combined NAME.pem.
/// All cryptography is done by openssl.
#[derive(Parser, Debug)]
#[command(name = "mklocal")]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["self_signed", "csr", "renew", "ca"]),
))]
pub struct Cli {
    /// Host names, without domain suffix, to generate keys/CSRs/certificates for
    #[arg(required = true, value_name = "HOST")]
    pub hosts: Vec<String>,

    /// Key size in bits [default: 4096]
    #[arg(long)]
    pub bits: Option<u32>,

    /// Days certificates are valid for [default: 3650]
    #[arg(long)]
    pub days: Option<u32>,

    /// Extra subjectAltName DNS entry (repeatable)
    #[arg(long = "DNS", value_name = "NAME")]
    pub dns: Vec<String>,

    /// subjectAltName IP address (repeatable)
    #[arg(long = "IP", value_name = "ADDR")]
    pub ip: Vec<IpAddr>,

    /// subjectAltName email address (repeatable)
    #[arg(long, value_name = "ADDR")]
    pub email: Vec<String>,

    /// Domain appended to each host; the first one forms the common name (repeatable)
    #[arg(long, value_name = "DOMAIN")]
    pub domain: Vec<String>,

    /// openssl executable [default: /usr/bin/openssl]
    #[arg(long, value_name = "PATH")]
    pub openssl: Option<PathBuf>,

    /// Subject country
    #[arg(long)]
    pub country: Option<String>,

    /// Subject state
    #[arg(long)]
    pub state: Option<String>,

    /// Subject city/locality
    #[arg(long)]
    pub city: Option<String>,

    /// Subject organization
    #[arg(long)]
    pub org: Option<String>,

    /// Subject organizational unit
    #[arg(long)]
    pub unit: Option<String>,

    /// Generate key and self-signed certificate
    #[arg(long = "self")]
    pub self_signed: bool,

    /// Generate key and CSR
    #[arg(long)]
    pub csr: bool,

    /// Generate CSR from an existing key
    #[arg(long)]
    pub renew: bool,

    /// Generate key and local CA signed certificate
    #[arg(long)]
    pub ca: bool,

    /// Directory to store the CA in [default: CA]
    #[arg(long = "caDir", value_name = "DIR")]
    pub ca_dir: Option<PathBuf>,

    /// File name prefix and common name of the CA [default: CA]
    #[arg(long = "caPrefix", value_name = "PREFIX")]
    pub ca_prefix: Option<String>,

    /// Days the CA certificate is valid for [default: 7300]
    #[arg(long = "caDays", value_name = "DAYS")]
    pub ca_days: Option<u32>,

    /// CA key size in bits [default: 4096]
    #[arg(long = "cabits", value_name = "BITS")]
    pub ca_bits: Option<u32>,

    /// Random bytes in the CA passphrase [default: 96]
    #[arg(long = "cacodigolen", value_name = "LEN")]
    pub ca_codigo_len: Option<u32>,

    /// Directory in which host directories are created [default: .]
    #[arg(long = "outDir", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Hosts to process at once [default: 1]
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Carry on with a host's remaining steps after an openssl failure
    #[arg(long)]
    pub keep_going: bool,

    /// Defaults file (TOML) instead of the per-user config.toml
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// More diagnostics, including text dumps of what was produced
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// The requested mode; clap guarantees exactly one flag is set.
    pub const fn mode(&self) -> Mode {
        if self.self_signed {
            Mode::SelfSigned
        } else if self.csr {
            Mode::Csr
        } else if self.renew {
            Mode::Renew
        } else {
            Mode::Ca
        }
    }
}
