//! Read-only topology predicates other provisioning steps branch on

use tracing::warn;

use crate::config::{
    CloudProviderId, DnsType, EtcdProviderType, InstanceGroupRole, LoadBalancerAccessSpec,
    LoadBalancerClass, USE_SERVICE_ACCOUNT_IAM,
};

use super::{ModelContext, ModelResult, VersionGate};

/// First version where nodes bootstrap through kops-controller on AWS
const NODE_BOOTSTRAP_CONTROLLER_VERSION: &str = "1.19";

pub struct Topology<'a> {
    ctx: &'a ModelContext,
}

impl<'a> Topology<'a> {
    pub fn new(ctx: &'a ModelContext) -> Self {
        Self { ctx }
    }

    fn load_balancer(&self) -> Option<&'a LoadBalancerAccessSpec> {
        self.ctx
            .cluster()
            .spec
            .api
            .as_ref()
            .and_then(|api| api.load_balancer.as_ref())
    }

    /// Check if the bastion has its own public DNS name
    pub fn uses_bastion_dns(&self) -> bool {
        self.ctx
            .cluster()
            .spec
            .topology
            .as_ref()
            .and_then(|t| t.bastion.as_ref())
            .is_some_and(|b| !b.bastion_public_name.is_empty())
    }

    /// Check if any instance group is a bastion
    pub fn uses_ssh_bastion(&self) -> bool {
        self.ctx
            .instance_groups()
            .iter()
            .any(|ig| ig.role() == InstanceGroupRole::Bastion)
    }

    /// Check if the API is fronted by a load balancer
    pub fn use_load_balancer_for_api(&self) -> bool {
        self.load_balancer().is_some()
    }

    /// Check if kubelets also reach the API through the load balancer
    pub fn use_load_balancer_for_internal_api(&self) -> bool {
        self.load_balancer().is_some_and(|lb| lb.use_for_internal_api)
    }

    /// Load balancer class for the API, Classic unless set
    pub fn api_load_balancer_class(&self) -> LoadBalancerClass {
        self.load_balancer()
            .and_then(|lb| lb.class)
            .unwrap_or_default()
    }

    pub fn use_classic_load_balancer(&self) -> bool {
        self.use_load_balancer_for_api()
            && self.api_load_balancer_class() == LoadBalancerClass::Classic
    }

    pub fn use_network_load_balancer(&self) -> bool {
        self.use_load_balancer_for_api()
            && self.api_load_balancer_class() == LoadBalancerClass::Network
    }

    /// Check if the cluster uses private DNS
    ///
    /// A DNS section with no type or an unknown type falls back to public DNS.
    pub fn use_private_dns(&self) -> bool {
        let dns = self
            .ctx
            .cluster()
            .spec
            .topology
            .as_ref()
            .and_then(|t| t.dns.as_ref());

        match dns.map(|d| d.dns_type.as_ref()) {
            None => false,
            Some(Some(DnsType::Public)) => false,
            Some(Some(DnsType::Private)) => true,
            Some(Some(DnsType::Other(other))) => {
                warn!("Unknown DNS type {:?}", other);
                false
            }
            Some(None) => {
                warn!("Unknown DNS type \"\"");
                false
            }
        }
    }

    /// Check if any etcd cluster is run by etcd-manager
    pub fn use_etcd_manager(&self) -> bool {
        self.ctx
            .cluster()
            .spec
            .etcd_clusters
            .iter()
            .any(|e| e.provider == Some(EtcdProviderType::Manager))
    }

    /// Check if any etcd cluster has TLS enabled
    pub fn use_etcd_tls(&self) -> bool {
        self.ctx
            .cluster()
            .spec
            .etcd_clusters
            .iter()
            .any(|e| e.enable_etcd_tls)
    }

    /// Check if nodes bootstrap through kops-controller instead of tokens
    pub fn use_kops_controller_for_node_bootstrap(&self) -> ModelResult<bool> {
        match self.ctx.cluster().spec.cloud_provider {
            CloudProviderId::Aws => {
                VersionGate::new(self.ctx).is_kubernetes_gte(NODE_BOOTSTRAP_CONTROLLER_VERSION)
            }
            _ => Ok(false),
        }
    }

    /// Check if bootstrap tokens are enabled on the API server
    pub fn use_bootstrap_tokens(&self) -> ModelResult<bool> {
        let Some(api_server) = self.ctx.cluster().spec.kube_api_server.as_ref() else {
            return Ok(false);
        };
        if self.use_kops_controller_for_node_bootstrap()? {
            return Ok(false);
        }
        Ok(api_server.enable_bootstrap_auth_token.unwrap_or(false))
    }

    /// False only when `sshKeyName` is explicitly set to an empty string
    pub fn use_ssh_key(&self) -> bool {
        self.ctx
            .cluster()
            .spec
            .ssh_key_name
            .as_deref()
            .map_or(true, |name| !name.is_empty())
    }

    /// Check if service accounts are bound to cloud IAM roles
    pub fn use_service_account_iam(&self) -> bool {
        self.ctx.features().is_enabled(USE_SERVICE_ACCOUNT_IAM)
    }
}
