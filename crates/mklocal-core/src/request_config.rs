//! Request configuration files consumed by the PKI tool.
//!
//! The layout is fixed: `[ req ]` options, the `[ subject ]` fields, three
//! constant extension profiles and finally `[ alt_names ]`.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::{PkiError, Result};
use crate::settings::Settings;
use crate::types::{common_name, SanList, Subject};

/// Profile used when self-signing the CA certificate.
pub const CA_PROFILE: &str = "v3_ca";
/// Profile used for CSRs and the certificates signed from them.
pub const REQUEST_PROFILE: &str = "v3_req";

const EXTENSIONS: &str = "
[ x509_ext ]
# Section x509_ext is used when generating a self-signed certificate.

subjectKeyIdentifier    = hash
authorityKeyIdentifier  = keyid,issuer
basicConstraints        = CA:FALSE
keyUsage                = digitalSignature, keyEncipherment
subjectAltName          = @alt_names

[ v3_ca ]
# Used for CA certificate generation
subjectKeyIdentifier   = hash
authorityKeyIdentifier = keyid:always,issuer
basicConstraints       = critical, CA:TRUE, pathlen:3
keyUsage               = critical, cRLSign, keyCertSign

[ v3_req ]
# Used when generating a CSR
basicConstraints = CA:FALSE
keyUsage         = nonRepudiation, digitalSignature, keyEncipherment
subjectAltName   = @alt_names

[ alt_names ]
";

/// A rendered-on-demand request configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestConfig {
    bits: u32,
    subject: Subject,
    common_name: String,
    sans: SanList,
}

impl RequestConfig {
    pub const fn new(bits: u32, subject: Subject, common_name: String, sans: SanList) -> Self {
        Self {
            bits,
            subject,
            common_name,
            sans,
        }
    }

    /// Configuration for one host: common name and SANs derived from the
    /// run's domains and alternative names.
    pub fn for_host(settings: &Settings, host: &str) -> Self {
        Self::new(
            settings.bits,
            settings.subject.clone(),
            common_name(host, &settings.alt_names.domains),
            SanList::for_host(host, &settings.alt_names),
        )
    }

    /// Configuration for the local CA; its common name is the CA prefix and
    /// it carries no alternative names.
    pub fn for_ca(settings: &Settings) -> Self {
        Self::new(
            settings.ca.bits,
            settings.subject.clone(),
            settings.ca.prefix.clone(),
            SanList::default(),
        )
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    pub const fn sans(&self) -> &SanList {
        &self.sans
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "
# Automatically generated

[ req ]
prompt              = no
default_keyfile     = server-key.pem
distinguished_name  = subject
req_extensions      = {REQUEST_PROFILE}
default_bits        = {}

[ subject ]
",
            self.bits
        );

        for (key, value) in self.subject.fields() {
            let _ = writeln!(out, "{key} = {value}");
        }
        let _ = writeln!(out, "CN = {}", self.common_name);

        out.push_str(EXTENSIONS);
        for entry in self.sans.entries() {
            let _ = writeln!(out, "{entry}");
        }

        out
    }

    /// Write the configuration to `path`, replacing any previous contents.
    pub async fn write(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.render())
            .await
            .map_err(|e| PkiError::io(path, e))
    }
}
