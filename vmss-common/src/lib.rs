use serde::{Deserialize, Serialize};
use std::fmt;

pub mod error;
pub mod primary;
pub mod resource_id;

pub use error::{NotScaleSetInstance, ResolveError};
pub use primary::select_primary;
pub use resource_id::{last_segment, scale_set_instance_id};

// --- Identifiers ---

/// Name of a cluster node, as registered by the kubelet (the VM's computer name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeName(String);

impl NodeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeAddressType {
    #[serde(rename = "InternalIP")]
    InternalIp,
    Hostname,
}

// --- Records (snapshots returned by the control plane) ---

/// Reference from a VM's network profile to one of its network interfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterfaceReference {
    /// Full ARM resource id, e.g. `/subscriptions/.../networkInterfaces/nic-0`.
    pub id: String,
    #[serde(default)]
    pub primary: bool,
}

/// A scale-set VM as seen through its network profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleSetVm {
    pub name: String,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterfaceReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpConfiguration {
    pub name: String,
    #[serde(default)]
    pub primary: bool,
    /// Unset on configurations that have no private address allocated (e.g. a pending IPv6 config).
    #[serde(default)]
    pub private_ip_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    #[serde(default)]
    pub ip_configurations: Vec<IpConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    #[serde(rename = "type")]
    pub kind: NodeAddressType,
    pub address: String,
}

impl ScaleSetVm {
    /// The interface the VM's primary IP is bound to.
    pub fn primary_interface(&self) -> Result<&NetworkInterfaceReference, ResolveError> {
        select_primary(&self.network_interfaces, |nic| nic.primary).ok_or_else(|| {
            ResolveError::NoPrimaryInterface {
                vm_name: self.name.clone(),
            }
        })
    }
}

impl NetworkInterface {
    pub fn primary_ip_configuration(&self) -> Result<&IpConfiguration, ResolveError> {
        select_primary(&self.ip_configurations, |cfg| cfg.primary).ok_or_else(|| {
            ResolveError::NoPrimaryIpConfiguration {
                nic_name: self.name.clone(),
            }
        })
    }
}
