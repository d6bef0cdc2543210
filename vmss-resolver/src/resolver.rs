use std::sync::Arc;
use vmss_common::{last_segment, NodeAddress, NodeAddressType, NodeName, ResolveError};
use vmss_providers::limiter::RateLimiter;
use vmss_providers::{InstanceLookup, InterfaceLookup};

/// Resolves the private IP of a scale-set node by chaining the VM and NIC lookups.
///
/// Cheap to share: all collaborators are behind `Arc`, and concurrent calls only
/// contend on the rate limiter.
pub struct InstanceAddressResolver {
    instances: Arc<dyn InstanceLookup>,
    interfaces: Arc<dyn InterfaceLookup>,
    limiter: Arc<dyn RateLimiter>,
    resource_group: String,
}

impl InstanceAddressResolver {
    pub fn new(
        instances: Arc<dyn InstanceLookup>,
        interfaces: Arc<dyn InterfaceLookup>,
        limiter: Arc<dyn RateLimiter>,
        resource_group: impl Into<String>,
    ) -> Self {
        Self {
            instances,
            interfaces,
            limiter,
            resource_group: resource_group.into(),
        }
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    /// Private address of the primary IP configuration on the node's primary NIC.
    ///
    /// Fails fast: the first failing step aborts the resolution, nothing is retried.
    pub async fn resolve_instance_private_ip(&self, node: &NodeName) -> Result<String, ResolveError> {
        self.limiter.accept().await;
        let vm = match self.instances.get_scale_set_vm(node).await {
            Ok(Some(vm)) => vm,
            Ok(None) => {
                tracing::debug!("resolve_instance_private_ip({}): instance not found", node);
                return Err(ResolveError::InstanceNotFound);
            }
            Err(e) => {
                tracing::error!(
                    "error: resolve_instance_private_ip({}), get_scale_set_vm({}), err={:#}",
                    node,
                    node,
                    e
                );
                return Err(ResolveError::Provider(e));
            }
        };

        let nic_id = vm.primary_interface().map_err(|e| {
            tracing::error!(
                "error: resolve_instance_private_ip({}), primary_interface({:?}), err={}",
                node,
                vm,
                e
            );
            e
        })?;

        let nic_name = last_segment(&nic_id.id).map_err(|e| {
            tracing::error!(
                "error: resolve_instance_private_ip({}), last_segment({}), err={}",
                node,
                nic_id.id,
                e
            );
            e
        })?;

        self.limiter.accept().await;
        tracing::trace!("get_network_interface({:?}): start", nic_name);
        let nic = self
            .interfaces
            .get_network_interface(&self.resource_group, nic_name)
            .await;
        tracing::trace!("get_network_interface({:?}): end", nic_name);
        let nic = nic.map_err(|e| {
            tracing::error!(
                "error: resolve_instance_private_ip({}), get_network_interface({}, {}), err={:#}",
                node,
                self.resource_group,
                nic_name,
                e
            );
            ResolveError::Provider(e)
        })?;

        let ip_config = nic.primary_ip_configuration().map_err(|e| {
            tracing::error!(
                "error: resolve_instance_private_ip({}), primary_ip_configuration({:?}), err={}",
                node,
                nic,
                e
            );
            e
        })?;

        match &ip_config.private_ip_address {
            Some(ip) => Ok(ip.clone()),
            None => {
                let e = ResolveError::NoPrivateIpAddress {
                    nic_name: nic.name.clone(),
                    ipconfig_name: ip_config.name.clone(),
                };
                tracing::error!("error: resolve_instance_private_ip({}), err={}", node, e);
                Err(e)
            }
        }
    }

    /// Addresses to publish on the node object: the internal IP, then the hostname.
    pub async fn node_addresses(&self, node: &NodeName) -> Result<Vec<NodeAddress>, ResolveError> {
        let ip = self.resolve_instance_private_ip(node).await?;
        Ok(vec![
            NodeAddress {
                kind: NodeAddressType::InternalIp,
                address: ip,
            },
            NodeAddress {
                kind: NodeAddressType::Hostname,
                address: node.to_string(),
            },
        ])
    }
}
