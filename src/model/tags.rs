//! Cloud tags for cluster resources and instance groups
//!
//! Tags are built in layers. A later layer overwrites keys written by an
//! earlier one; nothing is ever removed. For instance groups the order is:
//!
//! 1. resource tags for the autoscaling group
//! 2. cluster cloud labels
//! 3. instance group cloud labels
//! 4. cluster-autoscaler node-template labels
//! 5. cluster-autoscaler node-template taints
//! 6. role tag
//! 7. instance group name tag
//!
//! The role and instance group tags come last so no user label can replace
//! them.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{CloudProviderId, InstanceGroup, InstanceGroupRole};

use super::nodelabels::build_node_labels;
use super::{ModelContext, ModelResult};

pub const TAG_NAME: &str = "Name";

/// Legacy cluster identity tag, superseded by the ownership tag
pub const TAG_CLUSTER_NAME: &str = "KubernetesCluster";

pub const TAG_KUBERNETES_CLUSTER_PREFIX: &str = "kubernetes.io/cluster/";
pub const CLOUD_TAG_INSTANCE_GROUP_ROLE_PREFIX: &str = "k8s.io/role/";
pub const CLOUD_TAG_INSTANCE_GROUP_NAME: &str = "kops.k8s.io/instancegroup";
pub const CLUSTER_AUTOSCALER_NODE_TEMPLATE_LABEL: &str =
    "k8s.io/cluster-autoscaler/node-template/label/";
pub const CLUSTER_AUTOSCALER_NODE_TEMPLATE_TAINT: &str =
    "k8s.io/cluster-autoscaler/node-template/taint/";

pub const OWNERSHIP_OWNED: &str = "owned";
pub const OWNERSHIP_SHARED: &str = "shared";

pub struct TagDeriver<'a> {
    ctx: &'a ModelContext,
}

impl<'a> TagDeriver<'a> {
    pub fn new(ctx: &'a ModelContext) -> Self {
        Self { ctx }
    }

    /// Ownership tag key for this cluster
    pub fn ownership_tag_key(&self) -> String {
        format!("{}{}", TAG_KUBERNETES_CLUSTER_PREFIX, self.ctx.cluster_name())
    }

    /// Name of the autoscaling group backing an instance group
    pub fn autoscaling_group_name(&self, ig: &InstanceGroup) -> String {
        let cluster_name = self.ctx.cluster_name();
        match ig.role() {
            InstanceGroupRole::Master => format!("{}.masters.{}", ig.name(), cluster_name),
            InstanceGroupRole::ApiServer => format!("{}.apiservers.{}", ig.name(), cluster_name),
            InstanceGroupRole::Node | InstanceGroupRole::Bastion => {
                format!("{}.{}", ig.name(), cluster_name)
            }
        }
    }

    /// Tags for a cloud resource with the given name.
    ///
    /// Shared resources are managed outside this cluster, so they only get
    /// the `shared` ownership tag: no `Name`, no legacy cluster tag and none
    /// of the cluster's cloud labels.
    pub fn cloud_tags(&self, name: &str, shared: bool) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::new();
        let cluster = self.ctx.cluster();

        match cluster.spec.cloud_provider {
            CloudProviderId::Aws => {
                if shared {
                    debug!("Skipping {} tag for shared resource", TAG_NAME);
                } else if !name.is_empty() {
                    tags.insert(TAG_NAME.to_string(), name.to_string());
                }

                if shared {
                    debug!("Skipping {:?} tag for shared resource", TAG_CLUSTER_NAME);
                } else {
                    tags.insert(TAG_CLUSTER_NAME.to_string(), cluster.name().to_string());
                }

                if shared {
                    tags.insert(self.ownership_tag_key(), OWNERSHIP_SHARED.to_string());
                } else {
                    tags.insert(self.ownership_tag_key(), OWNERSHIP_OWNED.to_string());
                    for (k, v) in &cluster.spec.cloud_labels {
                        tags.insert(k.clone(), v.clone());
                    }
                }
            }
            other => {
                debug!("No cloud tags defined for provider {}", other);
            }
        }

        tags
    }

    /// Tags for the instances of an instance group
    pub fn cloud_tags_for_instance_group(
        &self,
        ig: &InstanceGroup,
    ) -> ModelResult<BTreeMap<String, String>> {
        let mut labels = self.cloud_tags(&self.autoscaling_group_name(ig), false);

        // Cluster labels first so the group's own labels can override them
        for (k, v) in &self.ctx.cluster().spec.cloud_labels {
            labels.insert(k.clone(), v.clone());
        }

        for (k, v) in &ig.spec.cloud_labels {
            labels.insert(k.clone(), v.clone());
        }

        for (k, v) in build_node_labels(self.ctx, ig)? {
            labels.insert(format!("{}{}", CLUSTER_AUTOSCALER_NODE_TEMPLATE_LABEL, k), v);
        }

        for taint in &ig.spec.taints {
            match taint.split_once('=') {
                Some((key, value)) => {
                    labels.insert(
                        format!("{}{}", CLUSTER_AUTOSCALER_NODE_TEMPLATE_TAINT, key),
                        value.to_string(),
                    );
                }
                None => debug!("Skipping taint {:?} without a value", taint),
            }
        }

        // The system tags take priority because the cluster likely breaks without them
        labels.insert(role_tag_key(ig.role()), "1".to_string());
        labels.insert(
            CLOUD_TAG_INSTANCE_GROUP_NAME.to_string(),
            ig.name().to_string(),
        );

        Ok(labels)
    }
}

/// Role tag key, e.g. `k8s.io/role/master`
pub fn role_tag_key(role: InstanceGroupRole) -> String {
    format!(
        "{}{}",
        CLOUD_TAG_INSTANCE_GROUP_ROLE_PREFIX,
        role.as_str().to_lowercase()
    )
}
