use clap::{ArgAction, Parser};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::config::InstanceGroup;
use crate::model::{ModelContext, ModelError};

/// Offset of the cluster DNS service inside the service range
pub const DNS_SERVICE_IP_ID: u32 = 10;

#[derive(Parser, Debug)]
#[command(name = "clustermodel")]
#[command(about = "Derive subnets, cloud tags and topology facts from a cluster manifest")]
#[command(version)]
pub struct Args {
    /// Path to the manifest (Cluster and InstanceGroup documents, YAML or JSON)
    #[arg(required = true)]
    pub manifest: PathBuf,

    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only report on this instance group
    #[arg(short, long, value_name = "NAME")]
    pub instance_group: Option<String>,

    /// Feature flags, e.g. "+UseServiceAccountIAM"
    #[arg(long, env = "CLUSTERMODEL_FEATURE_FLAGS", default_value = "")]
    pub features: String,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Errors that can occur while building a report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Instance group '{0}' not found")]
    UnknownInstanceGroup(String),
}

/// Everything the model derives for one cluster
#[derive(Debug, Clone, Serialize)]
pub struct ClusterReport {
    pub cluster: String,

    #[serde(rename = "kubernetesVersion")]
    pub kubernetes_version: String,

    #[serde(rename = "nodePortRange")]
    pub node_port_range: String,

    #[serde(rename = "dnsServiceIP")]
    pub dns_service_ip: IpAddr,

    pub topology: TopologyReport,

    #[serde(rename = "instanceGroups")]
    pub instance_groups: Vec<InstanceGroupReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopologyReport {
    #[serde(rename = "bastionDNS")]
    pub bastion_dns: bool,

    #[serde(rename = "sshBastion")]
    pub ssh_bastion: bool,

    /// Load balancer class, if the API has one
    #[serde(rename = "apiLoadBalancer")]
    pub api_load_balancer: Option<String>,

    #[serde(rename = "internalAPILoadBalancer")]
    pub internal_api_load_balancer: bool,

    #[serde(rename = "privateDNS")]
    pub private_dns: bool,

    #[serde(rename = "etcdManager")]
    pub etcd_manager: bool,

    #[serde(rename = "etcdTLS")]
    pub etcd_tls: bool,

    #[serde(rename = "bootstrapTokens")]
    pub bootstrap_tokens: bool,

    #[serde(rename = "sshKey")]
    pub ssh_key: bool,

    #[serde(rename = "serviceAccountIAM")]
    pub service_account_iam: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceGroupReport {
    pub name: String,
    pub role: String,

    #[serde(rename = "autoscalingGroup")]
    pub autoscaling_group: String,

    pub subnets: Vec<String>,
    pub zones: Vec<String>,
    pub tags: BTreeMap<String, String>,
}

// ============================================================================
// SBIO: Pure report logic (no I/O - returns data or formatted strings)
// ============================================================================

/// Derive the full report for a model, optionally for a single instance group.
pub fn build_report(
    model: &ModelContext,
    instance_group: Option<&str>,
) -> Result<ClusterReport, ReportError> {
    let kubernetes_version = model.version().kubernetes_version()?;
    let topology = model.topology();

    let groups: Vec<&InstanceGroup> = match instance_group {
        Some(name) => vec![model
            .subnets()
            .find_instance_group(name)
            .ok_or_else(|| ReportError::UnknownInstanceGroup(name.to_string()))?],
        None => model.instance_groups().iter().collect(),
    };

    let instance_groups = groups
        .into_iter()
        .map(|ig| instance_group_report(model, ig))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ClusterReport {
        cluster: model.cluster_name().to_string(),
        kubernetes_version: kubernetes_version.to_string(),
        node_port_range: model.network().node_port_range()?.to_string(),
        dns_service_ip: model.network().well_known_service_ip(DNS_SERVICE_IP_ID)?,
        topology: TopologyReport {
            bastion_dns: topology.uses_bastion_dns(),
            ssh_bastion: topology.uses_ssh_bastion(),
            api_load_balancer: topology
                .use_load_balancer_for_api()
                .then(|| topology.api_load_balancer_class().to_string()),
            internal_api_load_balancer: topology.use_load_balancer_for_internal_api(),
            private_dns: topology.use_private_dns(),
            etcd_manager: topology.use_etcd_manager(),
            etcd_tls: topology.use_etcd_tls(),
            bootstrap_tokens: topology.use_bootstrap_tokens()?,
            ssh_key: topology.use_ssh_key(),
            service_account_iam: topology.use_service_account_iam(),
        },
        instance_groups,
    })
}

fn instance_group_report(
    model: &ModelContext,
    ig: &InstanceGroup,
) -> Result<InstanceGroupReport, ModelError> {
    let subnets = model.subnets().gather_subnets(ig)?;
    Ok(InstanceGroupReport {
        name: ig.name().to_string(),
        role: ig.role().to_string(),
        autoscaling_group: model.tags().autoscaling_group_name(ig),
        subnets: subnets.iter().map(|s| s.name.clone()).collect(),
        zones: model.subnets().find_zones_for_instance_group(ig)?,
        tags: model.tags().cloud_tags_for_instance_group(ig)?,
    })
}

/// Format a report for the terminal.
/// Pure function - returns a formatted string.
pub fn format_report(report: &ClusterReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("Cluster: {}\n", report.cluster));
    output.push_str(&format!("Kubernetes: {}\n", report.kubernetes_version));
    output.push_str(&format!("NodePort range: {}\n", report.node_port_range));
    output.push_str(&format!("DNS service IP: {}\n\n", report.dns_service_ip));

    let t = &report.topology;
    output.push_str("Topology:\n");
    output.push_str(&format!(
        "  API load balancer: {}\n",
        t.api_load_balancer.as_deref().unwrap_or("none")
    ));
    let flags = [
        ("Internal API via load balancer", t.internal_api_load_balancer),
        ("Private DNS", t.private_dns),
        ("SSH bastion", t.ssh_bastion),
        ("Bastion DNS", t.bastion_dns),
        ("etcd-manager", t.etcd_manager),
        ("etcd TLS", t.etcd_tls),
        ("Bootstrap tokens", t.bootstrap_tokens),
        ("SSH key", t.ssh_key),
        ("Service account IAM", t.service_account_iam),
    ];
    for (label, enabled) in flags {
        output.push_str(&format!(
            "  {}: {}\n",
            label,
            if enabled { "yes" } else { "no" }
        ));
    }

    output.push_str(&format!(
        "\nInstance Groups ({}):\n",
        report.instance_groups.len()
    ));
    for ig in &report.instance_groups {
        output.push_str(&format!("  [{}] {} -> {}\n", ig.role, ig.name, ig.autoscaling_group));
        output.push_str(&format!("    Subnets: {}\n", ig.subnets.join(", ")));
        output.push_str(&format!("    Zones: {}\n", ig.zones.join(", ")));
        output.push_str("    Tags:\n");
        for (k, v) in &ig.tags {
            output.push_str(&format!("      {} = {}\n", k, v));
        }
    }

    output
}
