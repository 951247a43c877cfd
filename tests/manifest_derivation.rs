//! End-to-end derivation from a manifest on disk
//!
//! These tests load a multi-document manifest the way the binary does and
//! check the facts each component derives from it.

use std::io::Write;

use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

use clustermodel::cli::{build_report, ReportError};
use clustermodel::config::{
    load_manifest_file, ConfigError, FeatureFlags, InstanceGroupRole, ManifestError,
    USE_SERVICE_ACCOUNT_IAM,
};
use clustermodel::model::{ModelContext, ModelError, PortRange};

const MANIFEST: &str = r#"
apiVersion: kops.k8s.io/v1alpha2
kind: Cluster
metadata:
  name: prod.example.com
spec:
  cloudProvider: aws
  kubernetesVersion: "v1.21.4"
  serviceClusterIPRange: 10.96.0.0/12
  sshKeyName: ""
  cloudLabels:
    team: platform
  kubeAPIServer:
    serviceNodePortRange: 28000-28999
    enableBootstrapAuthToken: true
  api:
    loadBalancer:
      useForInternalApi: true
  topology:
    dns:
      type: Private
    bastion:
      bastionPublicName: bastion.prod.example.com
  etcdClusters:
  - name: main
    provider: Manager
    enableEtcdTLS: true
  subnets:
  - name: eu-west-1a
    type: Private
    zone: eu-west-1a
    cidr: 172.20.32.0/19
  - name: eu-west-1b
    type: Private
    zone: eu-west-1b
    cidr: 172.20.64.0/19
    id: subnet-0abc
  - name: utility-eu-west-1a
    type: Utility
    zone: eu-west-1a
---
apiVersion: kops.k8s.io/v1alpha2
kind: InstanceGroup
metadata:
  name: master-eu-west-1a
spec:
  role: Master
  subnets:
  - eu-west-1a
---
apiVersion: kops.k8s.io/v1alpha2
kind: InstanceGroup
metadata:
  name: nodes
spec:
  role: Node
  subnets:
  - eu-west-1a
  - eu-west-1b
  cloudLabels:
    team: data
  nodeLabels:
    workload: batch
  taints:
  - dedicated=batch:NoSchedule
---
apiVersion: kops.k8s.io/v1alpha2
kind: InstanceGroup
metadata:
  name: bastions
spec:
  role: Bastion
  subnets:
  - utility-eu-west-1a
"#;

fn write_manifest(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn load(content: &str, features: FeatureFlags) -> ModelContext {
    let file = write_manifest(content);
    load_manifest_file(file.path())
        .unwrap()
        .into_model(features)
}

#[test]
fn test_subnets_and_zones() {
    let model = load(MANIFEST, FeatureFlags::default());
    let resolver = model.subnets();
    let nodes = resolver.find_instance_group("nodes").unwrap();

    let names: Vec<_> = resolver
        .gather_subnets(nodes)
        .unwrap()
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(names, vec!["eu-west-1a", "eu-west-1b"]);
    assert_eq!(
        resolver.find_zones_for_instance_group(nodes).unwrap(),
        vec!["eu-west-1a", "eu-west-1b"]
    );
    assert!(resolver.find_subnet("eu-west-1b").unwrap().is_shared());

    assert_eq!(resolver.master_instance_groups().len(), 1);
    assert_eq!(resolver.node_instance_groups().len(), 2);
}

#[test]
fn test_version_gates() {
    let model = load(MANIFEST, FeatureFlags::default());
    let version = model.version();

    assert_eq!(version.kubernetes_version().unwrap().to_string(), "1.21.4");
    assert!(version.is_kubernetes_gte("1.21").unwrap());
    assert!(version.is_kubernetes_gte("1.21.9").unwrap());
    assert!(version.is_kubernetes_lt("1.22").unwrap());
}

#[test]
fn test_network_ranges() {
    let model = load(MANIFEST, FeatureFlags::default());
    let network = model.network();

    assert_eq!(
        network.node_port_range().unwrap(),
        PortRange { base: 28000, size: 1000 }
    );
    assert_eq!(
        network.well_known_service_ip(1).unwrap().to_string(),
        "10.96.0.1"
    );
    assert_eq!(
        network.well_known_service_ip(10).unwrap().to_string(),
        "10.96.0.10"
    );
}

#[test]
fn test_instance_group_tags() {
    let model = load(MANIFEST, FeatureFlags::default());
    let nodes = model.subnets().find_instance_group("nodes").unwrap();
    let tags = model.tags().cloud_tags_for_instance_group(nodes).unwrap();

    assert_eq!(tags.get("Name").map(String::as_str), Some("nodes.prod.example.com"));
    assert_eq!(tags.get("team").map(String::as_str), Some("data"));
    assert_eq!(tags.get("k8s.io/role/node").map(String::as_str), Some("1"));
    assert_eq!(
        tags.get("kops.k8s.io/instancegroup").map(String::as_str),
        Some("nodes")
    );
    assert_eq!(
        tags.get("k8s.io/cluster-autoscaler/node-template/label/workload")
            .map(String::as_str),
        Some("batch")
    );
    assert_eq!(
        tags.get("k8s.io/cluster-autoscaler/node-template/taint/dedicated")
            .map(String::as_str),
        Some("batch:NoSchedule")
    );
    assert_eq!(
        tags.get("kubernetes.io/cluster/prod.example.com")
            .map(String::as_str),
        Some("owned")
    );
}

#[test]
fn test_master_tags_carry_control_plane_label() {
    let model = load(MANIFEST, FeatureFlags::default());
    let master = model
        .subnets()
        .find_instance_group("master-eu-west-1a")
        .unwrap();
    assert_eq!(master.role(), InstanceGroupRole::Master);

    let tags = model.tags().cloud_tags_for_instance_group(master).unwrap();
    assert_eq!(
        tags.get("Name").map(String::as_str),
        Some("master-eu-west-1a.masters.prod.example.com")
    );
    assert!(tags.contains_key(
        "k8s.io/cluster-autoscaler/node-template/label/node-role.kubernetes.io/control-plane"
    ));
    assert_eq!(tags.get("k8s.io/role/master").map(String::as_str), Some("1"));
}

#[test]
fn test_topology() {
    let model = load(MANIFEST, FeatureFlags::parse("+UseServiceAccountIAM"));
    let topology = model.topology();

    assert!(topology.uses_bastion_dns());
    assert!(topology.uses_ssh_bastion());
    assert!(topology.use_load_balancer_for_api());
    assert!(topology.use_load_balancer_for_internal_api());
    assert!(topology.use_classic_load_balancer());
    assert!(topology.use_private_dns());
    assert!(topology.use_etcd_manager());
    assert!(topology.use_etcd_tls());
    assert!(!topology.use_ssh_key());
    assert!(topology.use_kops_controller_for_node_bootstrap().unwrap());
    assert!(!topology.use_bootstrap_tokens().unwrap());
    assert!(topology.use_service_account_iam());
    assert!(model.features().is_enabled(USE_SERVICE_ACCOUNT_IAM));
}

#[test]
fn test_group_with_mixed_subnet_types_fails_only_that_group() {
    let content = MANIFEST.replace(
        "  - eu-west-1a\n  - eu-west-1b\n",
        "  - eu-west-1a\n  - utility-eu-west-1a\n",
    );
    let model = load(&content, FeatureFlags::default());
    let resolver = model.subnets();

    let nodes = resolver.find_instance_group("nodes").unwrap();
    assert!(matches!(
        resolver.gather_subnets(nodes),
        Err(ModelError::MixedSubnetTypes { .. })
    ));

    let bastions = resolver.find_instance_group("bastions").unwrap();
    assert_eq!(resolver.gather_subnets(bastions).unwrap().len(), 1);
}

#[test]
fn test_missing_version_is_fatal() {
    let content = MANIFEST.replace("  kubernetesVersion: \"v1.21.4\"\n", "");
    let model = load(&content, FeatureFlags::default());

    match build_report(&model, None) {
        Err(ReportError::Model(e)) => assert!(e.is_fatal()),
        other => panic!("expected a fatal model error, got {:?}", other),
    }

    // Node tags never consult the version
    let nodes = model.subnets().find_instance_group("nodes").unwrap();
    assert!(model.tags().cloud_tags_for_instance_group(nodes).is_ok());
}

#[test]
fn test_duplicate_instance_group_rejected() {
    let content = format!(
        "{}---\nkind: InstanceGroup\nmetadata:\n  name: nodes\nspec:\n  role: Node\n",
        MANIFEST
    );
    let file = write_manifest(&content);
    let result = load_manifest_file(file.path());
    assert!(matches!(
        result,
        Err(ConfigError::ManifestError(ManifestError::DuplicateInstanceGroup(name))) if name == "nodes"
    ));
}
