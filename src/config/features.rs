//! Feature flags passed explicitly into the model
//!
//! Flags are written as a comma-separated list where `+Name` (or a bare
//! `Name`) enables a flag and `-Name` disables it. Later entries win.

use std::collections::BTreeSet;

use tracing::warn;

/// Bind service accounts to cloud IAM roles instead of instance roles
pub const USE_SERVICE_ACCOUNT_IAM: &str = "UseServiceAccountIAM";

const KNOWN_FLAGS: &[&str] = &[USE_SERVICE_ACCOUNT_IAM];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    enabled: BTreeSet<String>,
}

impl FeatureFlags {
    /// Parse a `+Flag,-Flag` list. Unknown names are kept but logged.
    pub fn parse(spec: &str) -> Self {
        let mut flags = Self::default();
        for entry in spec.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (enable, name) = match entry.strip_prefix('-') {
                Some(name) => (false, name),
                None => (true, entry.strip_prefix('+').unwrap_or(entry)),
            };
            if !KNOWN_FLAGS.contains(&name) {
                warn!("Unknown feature flag {:?}", name);
            }
            if enable {
                flags.enabled.insert(name.to_string());
            } else {
                flags.enabled.remove(name);
            }
        }
        flags
    }

    /// Enable a flag
    pub fn with(mut self, name: impl Into<String>) -> Self {
        self.enabled.insert(name.into());
        self
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(|s| s.as_str())
    }
}
