//! Subnet resolution for instance groups
//!
//! Instance groups reference cluster subnets by name. Resolution maps those
//! names to the cluster's subnet records and enforces that one group never
//! spans subnets of different types.

use std::collections::BTreeSet;

use crate::config::{ClusterSubnetSpec, InstanceGroup, InstanceGroupRole, SubnetType};

use super::{ModelContext, ModelError, ModelResult};

pub struct SubnetResolver<'a> {
    ctx: &'a ModelContext,
}

impl<'a> SubnetResolver<'a> {
    pub fn new(ctx: &'a ModelContext) -> Self {
        Self { ctx }
    }

    /// Map the subnet names in an instance group to the cluster's subnet records.
    ///
    /// Records come back in the order the group declares them. A name that
    /// matches no subnet or more than one subnet is an error, as is a group
    /// whose subnets have different types.
    pub fn gather_subnets(&self, ig: &InstanceGroup) -> ModelResult<Vec<&'a ClusterSubnetSpec>> {
        let cluster_subnets = &self.ctx.cluster().spec.subnets;
        let mut subnets = Vec::with_capacity(ig.spec.subnets.len());
        let mut subnet_type: Option<SubnetType> = None;

        for subnet_name in &ig.spec.subnets {
            let mut matches = cluster_subnets.iter().filter(|s| &s.name == subnet_name);
            let subnet = matches
                .next()
                .ok_or_else(|| ModelError::SubnetNotFound(subnet_name.clone()))?;
            if matches.next().is_some() {
                return Err(ModelError::DuplicateSubnetName(subnet_name.clone()));
            }

            match subnet_type {
                None => subnet_type = Some(subnet.subnet_type),
                Some(first) if first != subnet.subnet_type => {
                    return Err(ModelError::MixedSubnetTypes {
                        first,
                        other: subnet.subnet_type,
                    });
                }
                Some(_) => {}
            }

            subnets.push(subnet);
        }

        Ok(subnets)
    }

    /// Find the instance group with the matching name
    pub fn find_instance_group(&self, name: &str) -> Option<&'a InstanceGroup> {
        self.ctx.instance_groups().iter().find(|ig| ig.name() == name)
    }

    /// Find the cluster subnet with the matching name
    pub fn find_subnet(&self, name: &str) -> Option<&'a ClusterSubnetSpec> {
        self.ctx
            .cluster()
            .spec
            .subnets
            .iter()
            .find(|s| s.name == name)
    }

    /// Zones an instance group spans, sorted and de-duplicated
    pub fn find_zones_for_instance_group(&self, ig: &InstanceGroup) -> ModelResult<Vec<String>> {
        let mut zones: BTreeSet<String> = ig.spec.zones.iter().cloned().collect();

        for subnet_name in &ig.spec.subnets {
            let subnet =
                self.find_subnet(subnet_name)
                    .ok_or_else(|| ModelError::UnknownSubnetInGroup {
                        subnet: subnet_name.clone(),
                        instance_group: ig.name().to_string(),
                    })?;
            if !subnet.zone.is_empty() {
                zones.insert(subnet.zone.clone());
            }
        }

        Ok(zones.into_iter().collect())
    }

    /// Instance groups with the master role
    pub fn master_instance_groups(&self) -> Vec<&'a InstanceGroup> {
        self.groups_with_role(InstanceGroupRole::Master)
    }

    /// Instance groups with the node role
    pub fn node_instance_groups(&self) -> Vec<&'a InstanceGroup> {
        self.groups_with_role(InstanceGroupRole::Node)
    }

    fn groups_with_role(&self, role: InstanceGroupRole) -> Vec<&'a InstanceGroup> {
        self.ctx
            .instance_groups()
            .iter()
            .filter(|ig| ig.role() == role)
            .collect()
    }
}
