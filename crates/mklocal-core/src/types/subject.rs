use serde::{Deserialize, Serialize};

/// Distinguished-name fields shared by every request in a run.
///
/// All fields are optional; the common name is not stored here because it is
/// derived per host (see [`common_name`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Country (`C`)
    #[serde(default)]
    pub country: Option<String>,

    /// State or province (`ST`)
    #[serde(default)]
    pub state: Option<String>,

    /// City or locality (`L`)
    #[serde(default)]
    pub city: Option<String>,

    /// Organization (`O`)
    #[serde(default)]
    pub organization: Option<String>,

    /// Organizational unit (`OU`)
    #[serde(default)]
    pub unit: Option<String>,
}

impl Subject {
    /// Fields in emission order, paired with their padded config keys.
    ///
    /// Omitted fields are skipped, so the result holds only what was supplied.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("C ", self.country.as_deref()),
            ("ST", self.state.as_deref()),
            ("L ", self.city.as_deref()),
            ("O ", self.organization.as_deref()),
            ("OU", self.unit.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }

    /// Fill any unset field from `defaults`.
    #[must_use]
    pub fn with_defaults(self, defaults: Self) -> Self {
        Self {
            country: self.country.or(defaults.country),
            state: self.state.or(defaults.state),
            city: self.city.or(defaults.city),
            organization: self.organization.or(defaults.organization),
            unit: self.unit.or(defaults.unit),
        }
    }
}

/// Common name for `host`: the bare host, or `host.<first domain>`.
pub fn common_name(host: &str, domains: &[String]) -> String {
    match domains.first() {
        Some(domain) => format!("{host}.{domain}"),
        None => host.to_string(),
    }
}
