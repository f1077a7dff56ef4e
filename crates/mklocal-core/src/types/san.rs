use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Alternative-name inputs for a run, before they are bound to a host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AltNames {
    /// Domains appended to each host (`host.domain`); the first one also
    /// forms the common name
    #[serde(default)]
    pub domains: Vec<String>,

    /// Extra DNS names, used verbatim
    #[serde(default)]
    pub dns: Vec<String>,

    /// IP addresses
    #[serde(default)]
    pub ip: Vec<IpAddr>,

    /// Email addresses
    #[serde(default)]
    pub email: Vec<String>,
}

/// Kind of subject alternative name, as spelled in the config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SanKind {
    Dns,
    Ip,
    Email,
}

impl SanKind {
    /// Prefix used before the index, e.g. `DNS` in `DNS.0`.
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Dns => "DNS",
            Self::Ip => "IP",
            Self::Email => "email",
        }
    }
}

/// One numbered `alt_names` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanEntry {
    pub kind: SanKind,
    pub index: usize,
    pub value: String,
}

impl fmt::Display for SanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} = {}", self.kind.prefix(), self.index, self.value)
    }
}

/// Ordered SAN entries for one host.
///
/// Domain-derived DNS names come first and explicit DNS names continue their
/// numbering; IP and email entries are each numbered from zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanList {
    entries: Vec<SanEntry>,
}

impl SanList {
    /// Build the list for `host` from the run's alternative-name inputs.
    pub fn for_host(host: &str, names: &AltNames) -> Self {
        let mut list = Self::default();

        let derived = names.domains.iter().map(|domain| format!("{host}.{domain}"));
        list.extend(SanKind::Dns, 0, derived);
        list.extend(SanKind::Dns, names.domains.len(), names.dns.iter().cloned());
        list.extend(SanKind::Ip, 0, names.ip.iter().map(ToString::to_string));
        list.extend(SanKind::Email, 0, names.email.iter().cloned());

        list
    }

    fn extend(&mut self, kind: SanKind, offset: usize, values: impl Iterator<Item = String>) {
        self.entries.extend(values.enumerate().map(|(i, value)| SanEntry {
            kind,
            index: offset + i,
            value,
        }));
    }

    /// Entries in emission order.
    pub fn entries(&self) -> &[SanEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
