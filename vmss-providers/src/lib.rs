use anyhow::Result;
use async_trait::async_trait;
use vmss_common::{NetworkInterface, NodeName, ScaleSetVm};

pub mod config;
pub mod limiter;

/// Scale-set inventory: finds the VM backing a cluster node.
#[async_trait]
pub trait InstanceLookup: Send + Sync {
    /// Returns `Ok(None)` when the control plane has no such instance.
    /// Any other failure (transport, auth, malformed node name) is an `Err`.
    async fn get_scale_set_vm(&self, node: &NodeName) -> Result<Option<ScaleSetVm>>;
}

/// Network control plane: fetches a network interface by its short name.
#[async_trait]
pub trait InterfaceLookup: Send + Sync {
    async fn get_network_interface(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<NetworkInterface>;
}

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "azure")]
pub mod azure;
