pub mod cluster;
pub mod features;
pub mod instance_group;
pub mod manifest;

pub use cluster::{
    AccessSpec, BastionSpec, CloudProviderId, Cluster, ClusterSpec, ClusterSubnetSpec, DnsSpec,
    DnsType, EtcdClusterSpec, EtcdProviderType, KubeApiServerConfig, KubeletConfigSpec,
    LoadBalancerAccessSpec, LoadBalancerClass, ObjectMeta, SubnetType, TopologySpec,
};
pub use features::{FeatureFlags, USE_SERVICE_ACCOUNT_IAM};
pub use instance_group::{InstanceGroup, InstanceGroupRole, InstanceGroupSpec};
pub use manifest::{parse_manifest, validate_manifest, Manifest, ManifestError};

use std::path::Path;
use thiserror::Error;

/// Errors for file I/O operations (separate from pure parsing errors)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Manifest error: {0}")]
    ManifestError(#[from] ManifestError),
}

// ============================================================================
// SBIO: I/O wrapper - thin layer over pure functions
// ============================================================================

/// Load and parse a manifest file from disk.
/// This is the I/O boundary - it reads the file and delegates to pure parsing functions.
pub fn load_manifest_file(path: &Path) -> Result<Manifest, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let manifest = Manifest::from_str(&content)?;
    Ok(manifest)
}
