//! Kubernetes node labels for the machines of an instance group

use std::collections::BTreeMap;

use crate::config::{InstanceGroup, InstanceGroupRole};

use super::{ModelContext, ModelResult, VersionGate};

pub const ROLE_LABEL_NAME: &str = "kubernetes.io/role";
pub const ROLE_LABEL_MASTER: &str = "node-role.kubernetes.io/master";
pub const ROLE_LABEL_NODE: &str = "node-role.kubernetes.io/node";
pub const ROLE_LABEL_API_SERVER: &str = "node-role.kubernetes.io/api-server";
pub const ROLE_LABEL_CONTROL_PLANE: &str = "node-role.kubernetes.io/control-plane";

/// First version that understands the control-plane role label
const CONTROL_PLANE_LABEL_VERSION: &str = "1.20";

/// Labels the kubelet registers for nodes of this group.
///
/// Cluster-level kubelet labels come first (the master kubelet settings for
/// masters), then the role labels, then the group's own `nodeLabels`.
pub fn build_node_labels(
    ctx: &ModelContext,
    ig: &InstanceGroup,
) -> ModelResult<BTreeMap<String, String>> {
    let role = ig.role();
    let is_master = role == InstanceGroupRole::Master;
    let is_api_server = role == InstanceGroupRole::ApiServer;

    let spec = &ctx.cluster().spec;
    let kubelet = if is_master {
        spec.master_kubelet.as_ref()
    } else {
        spec.kubelet.as_ref()
    };
    let mut labels = kubelet
        .map(|k| k.node_labels.clone())
        .unwrap_or_default();

    if (is_master || is_api_server)
        && VersionGate::new(ctx).is_kubernetes_gte(CONTROL_PLANE_LABEL_VERSION)?
    {
        labels.insert(ROLE_LABEL_CONTROL_PLANE.to_string(), String::new());
    }

    if is_master {
        labels.insert(ROLE_LABEL_MASTER.to_string(), String::new());
        labels.insert(ROLE_LABEL_NAME.to_string(), "master".to_string());
    } else {
        labels.insert(ROLE_LABEL_NODE.to_string(), String::new());
        labels.insert(ROLE_LABEL_NAME.to_string(), "node".to_string());
    }

    if is_api_server {
        labels.insert(ROLE_LABEL_API_SERVER.to_string(), String::new());
    }

    for (k, v) in &ig.spec.node_labels {
        labels.insert(k.clone(), v.clone());
    }

    Ok(labels)
}
