//! Kubernetes version parsing and feature gating
//!
//! The cluster's `kubernetesVersion` decides which provisioning behaviour
//! applies. Gating compares major.minor only, so `1.20.3` and `1.20.0-beta.1`
//! both satisfy "at least 1.20".

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use super::{ModelContext, ModelError, ModelResult};

fn version_pattern() -> Result<&'static Regex, String> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:-([0-9A-Za-z.-]+))?(?:\+([0-9A-Za-z.-]+))?$",
            )
        })
        .as_ref()
        .map_err(|e| e.to_string())
}

/// A parsed semantic version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KubernetesVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
    pub build: Option<String>,
}

impl KubernetesVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
            build: None,
        }
    }

    /// Parse a version string or a release URL ending in a version.
    ///
    /// Accepts `1.20.3`, `v1.20.3`, `1.20`, `1.21.0-alpha.1+abc` and
    /// `https://storage.example.com/ci/v1.21.0-alpha.1/`.
    pub fn parse(version: &str) -> Result<Self, String> {
        let trimmed = version.trim();
        if trimmed.is_empty() {
            return Err("version is empty".to_string());
        }

        let candidate = if trimmed.contains('/') {
            trimmed
                .split('/')
                .filter(|segment| !segment.is_empty())
                .last()
                .unwrap_or_default()
        } else {
            trimmed
        };

        let captures = version_pattern()?
            .captures(candidate)
            .ok_or_else(|| format!("{:?} is not a semantic version", candidate))?;

        let number = |index: usize| -> Result<u64, String> {
            match captures.get(index) {
                Some(m) => m
                    .as_str()
                    .parse::<u64>()
                    .map_err(|e| format!("invalid version component {:?}: {}", m.as_str(), e)),
                None => Ok(0),
            }
        };

        Ok(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            pre: captures.get(4).map(|m| m.as_str().to_string()),
            build: captures.get(5).map(|m| m.as_str().to_string()),
        })
    }

    /// True if this version is at least `other`, comparing major.minor only
    pub fn is_gte(&self, other: &KubernetesVersion) -> bool {
        self.compare_minor(other) != Ordering::Less
    }

    fn compare_minor(&self, other: &KubernetesVersion) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}

impl fmt::Display for KubernetesVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref pre) = self.pre {
            write!(f, "-{}", pre)?;
        }
        if let Some(ref build) = self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl FromStr for KubernetesVersion {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).map_err(|reason| ModelError::InvalidKubernetesVersion {
            version: s.to_string(),
            reason,
        })
    }
}

/// Version queries against the cluster's `kubernetesVersion`
pub struct VersionGate<'a> {
    ctx: &'a ModelContext,
}

impl<'a> VersionGate<'a> {
    pub fn new(ctx: &'a ModelContext) -> Self {
        Self { ctx }
    }

    /// Parse the cluster's version.
    ///
    /// A missing or unparseable version is a fatal error
    /// ([`ModelError::is_fatal`]); no derivation may continue without it.
    pub fn kubernetes_version(&self) -> ModelResult<KubernetesVersion> {
        let version = &self.ctx.cluster().spec.kubernetes_version;
        if version.trim().is_empty() {
            return Err(ModelError::MissingKubernetesVersion);
        }
        version.parse()
    }

    /// Check the cluster is at least `version`, ignoring patch and pre-release
    pub fn is_kubernetes_gte(&self, version: &str) -> ModelResult<bool> {
        let wanted = KubernetesVersion::parse(version).map_err(|reason| {
            ModelError::InvalidComparisonVersion {
                version: version.to_string(),
                reason,
            }
        })?;
        Ok(self.kubernetes_version()?.is_gte(&wanted))
    }

    /// Check the cluster is below `version`, ignoring patch and pre-release
    pub fn is_kubernetes_lt(&self, version: &str) -> ModelResult<bool> {
        Ok(!self.is_kubernetes_gte(version)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Cluster;

    fn context_for(version: &str) -> ModelContext {
        ModelContext::new(Cluster::new("c", version), vec![])
    }

    #[test]
    fn test_parse_plain_versions() {
        assert_eq!(
            KubernetesVersion::parse("1.20.3").unwrap(),
            KubernetesVersion::new(1, 20, 3)
        );
        assert_eq!(
            KubernetesVersion::parse(" v1.19.9 ").unwrap(),
            KubernetesVersion::new(1, 19, 9)
        );
        assert_eq!(
            KubernetesVersion::parse("1.20").unwrap(),
            KubernetesVersion::new(1, 20, 0)
        );
    }

    #[test]
    fn test_parse_prerelease_and_build() {
        let v = KubernetesVersion::parse("1.21.0-alpha.1+ea69570f61af8e").unwrap();
        assert_eq!(v.pre.as_deref(), Some("alpha.1"));
        assert_eq!(v.build.as_deref(), Some("ea69570f61af8e"));
        assert_eq!(v.to_string(), "1.21.0-alpha.1+ea69570f61af8e");
    }

    #[test]
    fn test_parse_release_url() {
        let v = KubernetesVersion::parse(
            "https://storage.googleapis.com/kubernetes-release-dev/ci/v1.21.0-alpha.1/",
        )
        .unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 21, 0));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(KubernetesVersion::parse("").is_err());
        assert!(KubernetesVersion::parse("latest").is_err());
        assert!(KubernetesVersion::parse("1.x.3").is_err());
        assert!(matches!(
            "bogus".parse::<KubernetesVersion>(),
            Err(ModelError::InvalidKubernetesVersion { .. })
        ));
    }

    #[test]
    fn test_gte_ignores_patch_and_prerelease() {
        let ctx = context_for("1.20.3");
        let gate = VersionGate::new(&ctx);
        assert!(gate.is_kubernetes_gte("1.20.0").unwrap());
        assert!(gate.is_kubernetes_gte("1.20.9").unwrap());
        assert!(gate.is_kubernetes_gte("1.19").unwrap());
        assert!(!gate.is_kubernetes_gte("1.21.0").unwrap());

        let ctx = context_for("1.20.0-beta.1");
        assert!(VersionGate::new(&ctx).is_kubernetes_gte("1.20.0").unwrap());
    }

    #[test]
    fn test_gte_below() {
        let ctx = context_for("1.19.9");
        let gate = VersionGate::new(&ctx);
        assert!(!gate.is_kubernetes_gte("1.20.0").unwrap());
        assert!(gate.is_kubernetes_lt("1.20.0").unwrap());
    }

    #[test]
    fn test_lt_is_negation_of_gte() {
        let ctx = context_for("1.20.3");
        let gate = VersionGate::new(&ctx);
        for wanted in ["1.18.0", "1.20.0", "1.20.5", "1.21.0", "2.0.0"] {
            assert_eq!(
                gate.is_kubernetes_lt(wanted).unwrap(),
                !gate.is_kubernetes_gte(wanted).unwrap()
            );
        }
    }

    #[test]
    fn test_missing_version_is_fatal() {
        let ctx = context_for("");
        let err = VersionGate::new(&ctx).kubernetes_version().unwrap_err();
        assert_eq!(err, ModelError::MissingKubernetesVersion);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_invalid_comparison_version_names_argument() {
        let ctx = context_for("1.20.3");
        let err = VersionGate::new(&ctx).is_kubernetes_gte("latest").unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidComparisonVersion {
                version: "latest".to_string(),
                reason: "\"latest\" is not a semantic version".to_string(),
            }
        );
        assert!(err.to_string().contains("compare kubernetes version against \"latest\""));
        assert!(err.is_fatal());
        assert!(VersionGate::new(&ctx).is_kubernetes_lt("").is_err());
    }

    #[test]
    fn test_invalid_version_is_fatal() {
        let ctx = context_for("not-a-version");
        let err = VersionGate::new(&ctx).is_kubernetes_gte("1.20").unwrap_err();
        assert!(matches!(err, ModelError::InvalidKubernetesVersion { .. }));
        assert!(err.is_fatal());
    }
}
