//! Service network derivations: NodePort range and well-known service IPs

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use ipnet::IpNet;
use super::{ModelContext, ModelError, ModelResult};

/// Default NodePort range, 30000-32767
pub const DEFAULT_NODE_PORT_RANGE: PortRange = PortRange {
    base: 30000,
    size: 2768,
};

const MAX_PORT: u32 = 65535;

/// A contiguous range of ports, `base` through `base + size - 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRange {
    pub base: u32,
    pub size: u32,
}

impl PortRange {
    /// Check if a port falls inside the range
    pub fn contains(&self, port: u32) -> bool {
        port >= self.base && port - self.base < self.size
    }

    /// Last port in the range
    pub fn end(&self) -> u32 {
        self.base.saturating_add(self.size.saturating_sub(1))
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.size == 0 {
            return Ok(());
        }
        write!(f, "{}-{}", self.base, self.end())
    }
}

impl FromStr for PortRange {
    type Err = String;

    /// Parse `30000-32767`, `30000+2767` or a single port `30000`.
    /// An empty string is the empty range.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(PortRange { base: 0, size: 0 });
        }

        let port = |s: &str| -> Result<u32, String> {
            s.parse::<u32>()
                .map_err(|e| format!("invalid port {:?}: {}", s, e))
        };

        let (low, high) = match (value.find('-'), value.find('+')) {
            (None, None) => {
                let p = port(value)?;
                (p, p)
            }
            (Some(i), None) => (port(&value[..i])?, port(&value[i + 1..])?),
            (None, Some(i)) => {
                let low = port(&value[..i])?;
                let offset = port(&value[i + 1..])?;
                (low, low.saturating_add(offset))
            }
            (Some(_), Some(_)) => return Err(format!("unable to parse port range: {}", value)),
        };

        if low > MAX_PORT || high > MAX_PORT {
            return Err(format!(
                "the port range cannot be greater than {}: {}",
                MAX_PORT, value
            ));
        }
        if high < low {
            return Err(format!("end port cannot be less than start port: {}", value));
        }

        Ok(PortRange {
            base: low,
            size: 1 + high - low,
        })
    }
}

/// Derivations over the cluster's service network
pub struct NetworkRanges<'a> {
    ctx: &'a ModelContext,
}

impl<'a> NetworkRanges<'a> {
    pub fn new(ctx: &'a ModelContext) -> Self {
        Self { ctx }
    }

    /// Range of ports allocated to NodePort services.
    ///
    /// An override on the API server replaces the default entirely; a
    /// malformed override is an error, never a fallback to the default.
    pub fn node_port_range(&self) -> ModelResult<PortRange> {
        let override_range = self
            .ctx
            .cluster()
            .spec
            .kube_api_server
            .as_ref()
            .and_then(|api| api.service_node_port_range.as_deref())
            .filter(|value| !value.is_empty());

        match override_range {
            Some(value) => value
                .parse()
                .map_err(|reason| ModelError::InvalidNodePortRange {
                    value: value.to_string(),
                    reason,
                }),
            None => Ok(DEFAULT_NODE_PORT_RANGE),
        }
    }

    /// Service IP at offset `id` inside the service CIDR
    /// (e.g. 10 for cluster DNS, 1 for the kubernetes service)
    pub fn well_known_service_ip(&self, id: u32) -> ModelResult<IpAddr> {
        let range = self.ctx.cluster().service_cluster_ip_range();
        let cidr: IpNet = range
            .parse()
            .map_err(|_| ModelError::InvalidServiceCidr(range.to_string()))?;

        let out_of_range = || ModelError::ServiceIpOutOfRange {
            id,
            cidr: range.to_string(),
        };

        let ip = match cidr.network() {
            IpAddr::V4(base) => u32::from(base)
                .checked_add(id)
                .map(|n| IpAddr::V4(Ipv4Addr::from(n)))
                .ok_or_else(out_of_range)?,
            IpAddr::V6(base) => u128::from(base)
                .checked_add(u128::from(id))
                .map(|n| IpAddr::V6(Ipv6Addr::from(n)))
                .ok_or_else(out_of_range)?,
        };

        if !cidr.contains(&ip) {
            return Err(out_of_range());
        }
        Ok(ip)
    }
}
