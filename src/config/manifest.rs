use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

use super::cluster::Cluster;
use super::features::FeatureFlags;
use super::instance_group::InstanceGroup;
use crate::model::ModelContext;

/// Errors that can occur during manifest parsing and validation
#[derive(Error, Debug, PartialEq)]
pub enum ManifestError {
    #[error("YAML parse error: {0}")]
    ParseError(String),

    #[error("Document {0} has no kind")]
    MissingKind(usize),

    #[error("Unsupported kind '{0}' in document {1}")]
    UnknownKind(String, usize),

    #[error("No Cluster document found in manifest")]
    NoCluster,

    #[error("Manifest contains {0} Cluster documents, expected exactly one")]
    MultipleClusters(usize),

    #[error("Duplicate instance group name: '{0}'")]
    DuplicateInstanceGroup(String),

    #[error("Instance group in document {0} has no name")]
    UnnamedInstanceGroup(usize),
}

/// A cluster together with its instance groups, as read from one file
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub cluster: Cluster,
    pub instance_groups: Vec<InstanceGroup>,
}

// ============================================================================
// SBIO: Pure parsing functions (no I/O)
// ============================================================================

/// Parse a multi-document YAML (or JSON) manifest.
/// This is a pure function - no I/O.
pub fn parse_manifest(content: &str) -> Result<Manifest, ManifestError> {
    let mut clusters = Vec::new();
    let mut instance_groups = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| ManifestError::ParseError(e.to_string()))?;
        // Blank documents appear around stray `---` separators
        if value.is_null() {
            continue;
        }

        let kind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .ok_or(ManifestError::MissingKind(index))?;

        match kind {
            "Cluster" => {
                let cluster: Cluster = serde_yaml::from_value(value)
                    .map_err(|e| ManifestError::ParseError(e.to_string()))?;
                clusters.push(cluster);
            }
            "InstanceGroup" => {
                let ig: InstanceGroup = serde_yaml::from_value(value)
                    .map_err(|e| ManifestError::ParseError(e.to_string()))?;
                if ig.metadata.name.is_empty() {
                    return Err(ManifestError::UnnamedInstanceGroup(index));
                }
                instance_groups.push(ig);
            }
            other => return Err(ManifestError::UnknownKind(other.to_string(), index)),
        }
    }

    let cluster = match clusters.len() {
        0 => return Err(ManifestError::NoCluster),
        1 => clusters.remove(0),
        n => return Err(ManifestError::MultipleClusters(n)),
    };

    Ok(Manifest {
        cluster,
        instance_groups,
    })
}

/// Validate a manifest for consistency.
/// This is a pure function - no I/O.
///
/// Subnet references are checked by the model when a group is resolved.
pub fn validate_manifest(manifest: &Manifest) -> Result<(), ManifestError> {
    let mut seen = HashSet::new();
    for ig in &manifest.instance_groups {
        if !seen.insert(ig.name()) {
            return Err(ManifestError::DuplicateInstanceGroup(ig.name().to_string()));
        }
    }
    Ok(())
}

impl Manifest {
    /// Parse and validate from a YAML string.
    /// Pure function - no I/O.
    pub fn from_str(content: &str) -> Result<Self, ManifestError> {
        let manifest = parse_manifest(content)?;
        validate_manifest(&manifest)?;
        Ok(manifest)
    }

    /// Hand the manifest to the model layer
    pub fn into_model(self, features: FeatureFlags) -> ModelContext {
        ModelContext::new(self.cluster, self.instance_groups).with_features(features)
    }
}
