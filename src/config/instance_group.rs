//! InstanceGroup resource - a set of machines sharing a role and placement

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::cluster::{default_api_version, ObjectMeta};

/// An InstanceGroup manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceGroup {
    #[serde(rename = "apiVersion")]
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Kind is always "InstanceGroup"
    #[serde(default = "default_instance_group_kind")]
    pub kind: String,

    pub metadata: ObjectMeta,

    pub spec: InstanceGroupSpec,
}

fn default_instance_group_kind() -> String {
    "InstanceGroup".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceGroupSpec {
    pub role: InstanceGroupRole,

    /// Names of cluster subnets the group is placed into
    #[serde(default)]
    pub subnets: Vec<String>,

    /// Explicit zones, for clouds where groups are not subnet-bound
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,

    #[serde(rename = "cloudLabels")]
    #[serde(default)]
    pub cloud_labels: BTreeMap<String, String>,

    #[serde(rename = "nodeLabels")]
    #[serde(default)]
    pub node_labels: BTreeMap<String, String>,

    /// Taints in `key=value:Effect` form
    #[serde(default)]
    pub taints: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceGroupRole {
    Master,
    #[serde(rename = "APIServer")]
    ApiServer,
    Node,
    Bastion,
}

impl InstanceGroupRole {
    /// Role name as written in manifests
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceGroupRole::Master => "Master",
            InstanceGroupRole::ApiServer => "APIServer",
            InstanceGroupRole::Node => "Node",
            InstanceGroupRole::Bastion => "Bastion",
        }
    }
}

impl fmt::Display for InstanceGroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InstanceGroup {
    /// Create a new instance group with no subnets
    pub fn new(name: impl Into<String>, role: InstanceGroupRole) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_instance_group_kind(),
            metadata: ObjectMeta {
                name: name.into(),
                labels: BTreeMap::new(),
            },
            spec: InstanceGroupSpec {
                role,
                subnets: Vec::new(),
                zones: Vec::new(),
                cloud_labels: BTreeMap::new(),
                node_labels: BTreeMap::new(),
                taints: Vec::new(),
            },
        }
    }

    pub fn with_subnet(mut self, subnet: impl Into<String>) -> Self {
        self.spec.subnets.push(subnet.into());
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.spec.zones.push(zone.into());
        self
    }

    pub fn with_cloud_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.cloud_labels.insert(key.into(), value.into());
        self
    }

    pub fn with_node_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.node_labels.insert(key.into(), value.into());
        self
    }

    pub fn with_taint(mut self, taint: impl Into<String>) -> Self {
        self.spec.taints.push(taint.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn role(&self) -> InstanceGroupRole {
        self.spec.role
    }

    pub fn is_master(&self) -> bool {
        self.spec.role == InstanceGroupRole::Master
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_instance_group() {
        let yaml = r#"
apiVersion: kops.k8s.io/v1alpha2
kind: InstanceGroup
metadata:
  name: api-us-east-1a
spec:
  role: APIServer
  subnets:
  - us-east-1a
  taints:
  - dedicated=api:NoSchedule
"#;
        let ig: InstanceGroup = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(ig.name(), "api-us-east-1a");
        assert_eq!(ig.role(), InstanceGroupRole::ApiServer);
        assert_eq!(ig.spec.subnets, vec!["us-east-1a".to_string()]);
        assert!(ig.spec.cloud_labels.is_empty());
        assert!(!ig.is_master());
    }

    #[test]
    fn test_role_names() {
        assert_eq!(InstanceGroupRole::Master.to_string(), "Master");
        assert_eq!(InstanceGroupRole::ApiServer.to_string(), "APIServer");
        let role: InstanceGroupRole = serde_yaml::from_str("APIServer").unwrap();
        assert_eq!(role, InstanceGroupRole::ApiServer);
    }

    #[test]
    fn test_instance_group_builder() {
        let ig = InstanceGroup::new("nodes", InstanceGroupRole::Node)
            .with_subnet("a")
            .with_subnet("b")
            .with_cloud_label("team", "infra")
            .with_taint("dedicated=gpu");

        assert_eq!(ig.spec.subnets, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(ig.spec.taints.len(), 1);
        assert_eq!(ig.spec.cloud_labels.get("team"), Some(&"infra".to_string()));
    }
}
