//! Cluster resource - the declarative description of a cluster
//!
//! A Cluster manifest carries everything the model layer derives from:
//! - Named, typed subnets that instance groups place machines into
//! - Cloud labels applied to every owned resource
//! - The Kubernetes version used for feature gating
//! - API access, DNS and etcd topology

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// API version written into manifests created by this crate
pub const API_VERSION: &str = "kops.k8s.io/v1alpha2";

/// Service range used when the manifest does not set one
pub const DEFAULT_SERVICE_CLUSTER_IP_RANGE: &str = "100.64.0.0/13";

/// A Cluster manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// API version (e.g., "kops.k8s.io/v1alpha2")
    #[serde(rename = "apiVersion")]
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Kind is always "Cluster"
    #[serde(default = "default_cluster_kind")]
    pub kind: String,

    pub metadata: ObjectMeta,

    pub spec: ClusterSpec,
}

/// Metadata shared by Cluster and InstanceGroup manifests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Unique name (the cluster's DNS name for clusters)
    pub name: String,

    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

pub(crate) fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_cluster_kind() -> String {
    "Cluster".to_string()
}

/// Desired state of the cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSpec {
    #[serde(rename = "cloudProvider")]
    pub cloud_provider: CloudProviderId,

    /// Target Kubernetes version; validated lazily by the version gate
    #[serde(rename = "kubernetesVersion")]
    #[serde(default)]
    pub kubernetes_version: String,

    #[serde(default)]
    pub subnets: Vec<ClusterSubnetSpec>,

    /// Tags applied to every resource owned by this cluster
    #[serde(rename = "cloudLabels")]
    #[serde(default)]
    pub cloud_labels: BTreeMap<String, String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<AccessSpec>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology: Option<TopologySpec>,

    #[serde(rename = "etcdClusters")]
    #[serde(default)]
    pub etcd_clusters: Vec<EtcdClusterSpec>,

    /// `None` uses the default key; `Some("")` disables SSH keys entirely
    #[serde(rename = "sshKeyName")]
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_key_name: Option<String>,

    #[serde(rename = "kubeAPIServer")]
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kube_api_server: Option<KubeApiServerConfig>,

    #[serde(rename = "serviceClusterIPRange")]
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_cluster_ip_range: Option<String>,

    /// Kubelet settings for non-master instance groups
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubelet: Option<KubeletConfigSpec>,

    /// Kubelet settings for master instance groups
    #[serde(rename = "masterKubelet")]
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_kubelet: Option<KubeletConfigSpec>,
}

/// Supported cloud providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProviderId {
    Aws,
    Gce,
    #[serde(rename = "digitalocean")]
    DigitalOcean,
    Openstack,
    Azure,
}

impl fmt::Display for CloudProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CloudProviderId::Aws => "aws",
            CloudProviderId::Gce => "gce",
            CloudProviderId::DigitalOcean => "digitalocean",
            CloudProviderId::Openstack => "openstack",
            CloudProviderId::Azure => "azure",
        };
        f.write_str(name)
    }
}

/// A subnet declared on the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSubnetSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub subnet_type: SubnetType,

    #[serde(default)]
    pub zone: String,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,

    /// Cloud identifier of a pre-existing subnet
    #[serde(rename = "id")]
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

impl ClusterSubnetSpec {
    pub fn new(name: impl Into<String>, subnet_type: SubnetType) -> Self {
        Self {
            name: name.into(),
            subnet_type,
            zone: String::new(),
            cidr: None,
            provider_id: None,
        }
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = zone.into();
        self
    }

    pub fn with_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.cidr = Some(cidr.into());
        self
    }

    pub fn with_provider_id(mut self, id: impl Into<String>) -> Self {
        self.provider_id = Some(id.into());
        self
    }

    /// Subnets that already exist in the cloud are shared with whoever created them
    pub fn is_shared(&self) -> bool {
        self.provider_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Placement class of a subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubnetType {
    Public,
    Private,
    Utility,
}

impl fmt::Display for SubnetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubnetType::Public => "Public",
            SubnetType::Private => "Private",
            SubnetType::Utility => "Utility",
        };
        f.write_str(name)
    }
}

/// How the Kubernetes API is exposed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessSpec {
    #[serde(rename = "loadBalancer")]
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<LoadBalancerAccessSpec>,
}

/// Load balancer in front of the API servers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerAccessSpec {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<LoadBalancerClass>,

    /// Route kubelet traffic through the load balancer too
    #[serde(rename = "useForInternalApi")]
    #[serde(default)]
    pub use_for_internal_api: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadBalancerClass {
    #[default]
    Classic,
    Network,
}

impl fmt::Display for LoadBalancerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadBalancerClass::Classic => f.write_str("Classic"),
            LoadBalancerClass::Network => f.write_str("Network"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologySpec {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bastion: Option<BastionSpec>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BastionSpec {
    #[serde(rename = "bastionPublicName")]
    #[serde(default)]
    pub bastion_public_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsSpec {
    #[serde(rename = "type")]
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_type: Option<DnsType>,
}

/// DNS visibility of the cluster
///
/// Unrecognized values are kept rather than rejected so that the model can
/// fall back to public DNS with a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DnsType {
    Public,
    Private,
    Other(String),
}

impl From<String> for DnsType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Public" => DnsType::Public,
            "Private" => DnsType::Private,
            _ => DnsType::Other(value),
        }
    }
}

impl From<DnsType> for String {
    fn from(value: DnsType) -> Self {
        match value {
            DnsType::Public => "Public".to_string(),
            DnsType::Private => "Private".to_string(),
            DnsType::Other(other) => other,
        }
    }
}

/// One etcd cluster (main, events, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtcdClusterSpec {
    pub name: String,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<EtcdProviderType>,

    #[serde(rename = "enableEtcdTLS")]
    #[serde(default)]
    pub enable_etcd_tls: bool,
}

impl EtcdClusterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: None,
            enable_etcd_tls: false,
        }
    }

    pub fn with_provider(mut self, provider: EtcdProviderType) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_tls(mut self) -> Self {
        self.enable_etcd_tls = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EtcdProviderType {
    Manager,
    Legacy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KubeApiServerConfig {
    /// Override for the NodePort range ("30000-32767" or "30000+2768")
    #[serde(rename = "serviceNodePortRange")]
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_node_port_range: Option<String>,

    #[serde(rename = "enableBootstrapAuthToken")]
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_bootstrap_auth_token: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KubeletConfigSpec {
    #[serde(rename = "nodeLabels")]
    #[serde(default)]
    pub node_labels: BTreeMap<String, String>,
}

impl Cluster {
    /// Create a new AWS cluster with no subnets
    pub fn new(name: impl Into<String>, kubernetes_version: impl Into<String>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_cluster_kind(),
            metadata: ObjectMeta {
                name: name.into(),
                labels: BTreeMap::new(),
            },
            spec: ClusterSpec {
                cloud_provider: CloudProviderId::Aws,
                kubernetes_version: kubernetes_version.into(),
                subnets: Vec::new(),
                cloud_labels: BTreeMap::new(),
                api: None,
                topology: None,
                etcd_clusters: Vec::new(),
                ssh_key_name: None,
                kube_api_server: None,
                service_cluster_ip_range: None,
                kubelet: None,
                master_kubelet: None,
            },
        }
    }

    pub fn with_cloud_provider(mut self, provider: CloudProviderId) -> Self {
        self.spec.cloud_provider = provider;
        self
    }

    pub fn with_subnet(mut self, subnet: ClusterSubnetSpec) -> Self {
        self.spec.subnets.push(subnet);
        self
    }

    pub fn with_cloud_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.cloud_labels.insert(key.into(), value.into());
        self
    }

    pub fn with_etcd_cluster(mut self, etcd: EtcdClusterSpec) -> Self {
        self.spec.etcd_clusters.push(etcd);
        self
    }

    pub fn with_load_balancer(mut self, load_balancer: LoadBalancerAccessSpec) -> Self {
        self.spec.api = Some(AccessSpec {
            load_balancer: Some(load_balancer),
        });
        self
    }

    pub fn with_kube_api_server(mut self, config: KubeApiServerConfig) -> Self {
        self.spec.kube_api_server = Some(config);
        self
    }

    pub fn with_service_cluster_ip_range(mut self, cidr: impl Into<String>) -> Self {
        self.spec.service_cluster_ip_range = Some(cidr.into());
        self
    }

    pub fn with_ssh_key_name(mut self, key: impl Into<String>) -> Self {
        self.spec.ssh_key_name = Some(key.into());
        self
    }

    pub fn with_dns_type(mut self, dns_type: DnsType) -> Self {
        let topology = self.spec.topology.get_or_insert_with(TopologySpec::default);
        topology.dns = Some(DnsSpec {
            dns_type: Some(dns_type),
        });
        self
    }

    pub fn with_bastion_public_name(mut self, name: impl Into<String>) -> Self {
        let topology = self.spec.topology.get_or_insert_with(TopologySpec::default);
        topology.bastion = Some(BastionSpec {
            bastion_public_name: name.into(),
        });
        self
    }

    /// Cluster name, used as the identity in ownership tags
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Service range, falling back to the default when unset
    pub fn service_cluster_ip_range(&self) -> &str {
        self.spec
            .service_cluster_ip_range
            .as_deref()
            .unwrap_or(DEFAULT_SERVICE_CLUSTER_IP_RANGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cluster_yaml() {
        let yaml = r#"
apiVersion: kops.k8s.io/v1alpha2
kind: Cluster
metadata:
  name: my-cluster.example.com
spec:
  cloudProvider: aws
  kubernetesVersion: 1.20.3
  sshKeyName: ""
  subnets:
  - name: us-east-1a
    type: Private
    zone: us-east-1a
    cidr: 172.20.32.0/19
  - name: utility-us-east-1a
    type: Utility
    zone: us-east-1a
    id: subnet-0123
  etcdClusters:
  - name: main
    provider: Manager
    enableEtcdTLS: true
  api:
    loadBalancer:
      class: Network
      useForInternalApi: true
  topology:
    dns:
      type: Private
"#;
        let cluster: Cluster = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cluster.name(), "my-cluster.example.com");
        assert_eq!(cluster.spec.cloud_provider, CloudProviderId::Aws);
        assert_eq!(cluster.spec.subnets.len(), 2);
        assert_eq!(cluster.spec.subnets[0].subnet_type, SubnetType::Private);
        assert!(!cluster.spec.subnets[0].is_shared());
        assert!(cluster.spec.subnets[1].is_shared());
        assert_eq!(cluster.spec.ssh_key_name, Some(String::new()));
        assert_eq!(
            cluster.spec.etcd_clusters[0].provider,
            Some(EtcdProviderType::Manager)
        );
        let lb = cluster.spec.api.unwrap().load_balancer.unwrap();
        assert_eq!(lb.class, Some(LoadBalancerClass::Network));
        assert!(lb.use_for_internal_api);
    }

    #[test]
    fn test_unknown_dns_type_is_kept() {
        let dns: DnsSpec = serde_yaml::from_str("type: Hybrid").unwrap();
        assert_eq!(dns.dns_type, Some(DnsType::Other("Hybrid".to_string())));
    }

    #[test]
    fn test_unknown_subnet_type_is_rejected() {
        let result: Result<ClusterSubnetSpec, _> =
            serde_yaml::from_str("name: a\ntype: Transit\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_service_range() {
        let cluster = Cluster::new("c", "1.20.0");
        assert_eq!(
            cluster.service_cluster_ip_range(),
            DEFAULT_SERVICE_CLUSTER_IP_RANGE
        );

        let cluster = cluster.with_service_cluster_ip_range("10.0.0.0/16");
        assert_eq!(cluster.service_cluster_ip_range(), "10.0.0.0/16");
    }

    #[test]
    fn test_cluster_builder() {
        let cluster = Cluster::new("c", "1.20.0")
            .with_subnet(ClusterSubnetSpec::new("a", SubnetType::Public).with_zone("z1"))
            .with_subnet(
                ClusterSubnetSpec::new("b", SubnetType::Private)
                    .with_cidr("172.20.64.0/19")
                    .with_provider_id("subnet-0abc"),
            )
            .with_cloud_label("team", "infra")
            .with_dns_type(DnsType::Private)
            .with_bastion_public_name("bastion.c");

        assert_eq!(cluster.spec.subnets[0].zone, "z1");
        assert!(!cluster.spec.subnets[0].is_shared());
        assert_eq!(cluster.spec.subnets[1].cidr.as_deref(), Some("172.20.64.0/19"));
        assert!(cluster.spec.subnets[1].is_shared());
        assert!(!ClusterSubnetSpec::new("c", SubnetType::Private)
            .with_provider_id("")
            .is_shared());
        assert_eq!(cluster.spec.cloud_labels.get("team"), Some(&"infra".to_string()));
        let topology = cluster.spec.topology.unwrap();
        assert_eq!(topology.dns.unwrap().dns_type, Some(DnsType::Private));
        assert_eq!(topology.bastion.unwrap().bastion_public_name, "bastion.c");
    }
}
