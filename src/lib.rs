//! Derivation layer for cluster provisioning.
//!
//! [`config`] loads the declarative cluster and instance group manifests;
//! [`model`] turns them into the facts provisioning steps consume.

pub mod cli;
pub mod config;
pub mod model;

pub use config::{Cluster, FeatureFlags, InstanceGroup, Manifest};
pub use model::{ModelContext, ModelError, ModelResult};
