//! # Cluster Model
//!
//! Derives the facts provisioning steps need from a cluster manifest and its
//! instance groups: resolved subnets, cloud tags, version gates, service
//! network values and topology flags.
//!
//! A [`ModelContext`] is the single read-only handle to the inputs. Each
//! component borrows it:
//!
//! ```text
//!                  ┌───────────────────────┐
//!                  │     ModelContext      │
//!                  │  Arc<Cluster>         │
//!                  │  Arc<[InstanceGroup]> │
//!                  │  FeatureFlags         │
//!                  └───────────┬───────────┘
//!       ┌─────────────┬────────┼───────┬───────────────┐
//!       ▼             ▼        ▼       ▼               ▼
//!  VersionGate SubnetResolver TagDeriver NetworkRanges Topology
//! ```
//!
//! Nothing here mutates its inputs or performs I/O, so a context can be
//! cloned and queried from any number of threads.

pub mod network;
pub mod nodelabels;
pub mod subnets;
pub mod tags;
pub mod topology;
pub mod version;

pub use network::{NetworkRanges, PortRange, DEFAULT_NODE_PORT_RANGE};
pub use nodelabels::build_node_labels;
pub use subnets::SubnetResolver;
pub use tags::{role_tag_key, TagDeriver};
pub use topology::Topology;
pub use version::{KubernetesVersion, VersionGate};

use std::sync::Arc;

use thiserror::Error;

use crate::config::{Cluster, FeatureFlags, InstanceGroup, SubnetType};

/// Errors returned by model derivations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("subnet not found: {0:?}")]
    SubnetNotFound(String),

    #[error("found multiple subnets with name: {0:?}")]
    DuplicateSubnetName(String),

    #[error("found subnets of different types: {first},{other}")]
    MixedSubnetTypes { first: SubnetType, other: SubnetType },

    #[error("cannot find subnet {subnet:?} (declared in instance group {instance_group:?}, not found in cluster)")]
    UnknownSubnetInGroup {
        subnet: String,
        instance_group: String,
    },

    #[error("error parsing ServiceNodePortRange {value:?}: {reason}")]
    InvalidNodePortRange { value: String, reason: String },

    #[error("error parsing ServiceClusterIPRange {0:?}")]
    InvalidServiceCidr(String),

    #[error("service IP offset {id} falls outside ServiceClusterIPRange {cidr}")]
    ServiceIpOutOfRange { id: u32, cidr: String },

    #[error("KubernetesVersion is required")]
    MissingKubernetesVersion,

    #[error("unable to determine kubernetes version from {version:?}: {reason}")]
    InvalidKubernetesVersion { version: String, reason: String },

    #[error("cannot compare kubernetes version against {version:?}: {reason}")]
    InvalidComparisonVersion { version: String, reason: String },
}

impl ModelError {
    /// Fatal errors mean the cluster cannot be modelled at all; the caller
    /// should stop rather than skip the failing step.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ModelError::MissingKubernetesVersion
                | ModelError::InvalidKubernetesVersion { .. }
                | ModelError::InvalidComparisonVersion { .. }
        )
    }
}

/// Result type for model derivations
pub type ModelResult<T> = Result<T, ModelError>;

/// Read-only handle to a cluster and its instance groups
#[derive(Debug, Clone)]
pub struct ModelContext {
    cluster: Arc<Cluster>,
    instance_groups: Arc<[InstanceGroup]>,
    features: FeatureFlags,
}

impl ModelContext {
    pub fn new(cluster: Cluster, instance_groups: Vec<InstanceGroup>) -> Self {
        Self {
            cluster: Arc::new(cluster),
            instance_groups: instance_groups.into(),
            features: FeatureFlags::default(),
        }
    }

    pub fn with_features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn cluster_name(&self) -> &str {
        self.cluster.name()
    }

    pub fn instance_groups(&self) -> &[InstanceGroup] {
        &self.instance_groups
    }

    pub fn features(&self) -> &FeatureFlags {
        &self.features
    }

    pub fn version(&self) -> VersionGate<'_> {
        VersionGate::new(self)
    }

    pub fn subnets(&self) -> SubnetResolver<'_> {
        SubnetResolver::new(self)
    }

    pub fn tags(&self) -> TagDeriver<'_> {
        TagDeriver::new(self)
    }

    pub fn network(&self) -> NetworkRanges<'_> {
        NetworkRanges::new(self)
    }

    pub fn topology(&self) -> Topology<'_> {
        Topology::new(self)
    }
}
