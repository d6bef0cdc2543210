use crate::{InstanceLookup, InterfaceLookup};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use vmss_common::{NetworkInterface, NodeName, ScaleSetVm};

/// In-memory control plane for local runs and tests.
///
/// VMs are keyed by node name, interfaces by short name (any resource group).
#[derive(Default)]
pub struct MockProvider {
    vms: HashMap<String, ScaleSetVm>,
    interfaces: HashMap<String, NetworkInterface>,
    instance_errors: HashMap<String, String>,
    interface_errors: HashMap<String, String>,
    instance_lookups: AtomicUsize,
    interface_lookups: AtomicUsize,
    interface_requests: Mutex<Vec<(String, String)>>,
}

#[derive(Debug, Default, Deserialize)]
struct Fixture {
    #[serde(default)]
    vms: Vec<FixtureVm>,
    #[serde(default)]
    interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Deserialize)]
struct FixtureVm {
    node: String,
    #[serde(flatten)]
    vm: ScaleSetVm,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `{"vms": [{"node": .., "name": .., "network_interfaces": [..]}], "interfaces": [..]}`.
    pub fn from_json(raw: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(raw).context("invalid mock fixture")?;
        let mut provider = Self::new();
        for entry in fixture.vms {
            provider = provider.with_vm(entry.node, entry.vm);
        }
        for nic in fixture.interfaces {
            provider = provider.with_interface(nic);
        }
        Ok(provider)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read mock fixture {}", path))?;
        Self::from_json(&raw)
    }

    pub fn with_vm(mut self, node: impl Into<String>, vm: ScaleSetVm) -> Self {
        self.vms.insert(node.into(), vm);
        self
    }

    pub fn with_interface(mut self, nic: NetworkInterface) -> Self {
        self.interfaces.insert(nic.name.clone(), nic);
        self
    }

    /// Make the instance lookup for `node` fail with `message`.
    pub fn with_instance_error(mut self, node: impl Into<String>, message: impl Into<String>) -> Self {
        self.instance_errors.insert(node.into(), message.into());
        self
    }

    pub fn with_interface_error(mut self, name: impl Into<String>, message: impl Into<String>) -> Self {
        self.interface_errors.insert(name.into(), message.into());
        self
    }

    pub fn instance_lookups(&self) -> usize {
        self.instance_lookups.load(Ordering::SeqCst)
    }

    pub fn interface_lookups(&self) -> usize {
        self.interface_lookups.load(Ordering::SeqCst)
    }

    /// `(resource_group, name)` of every interface fetch, in call order.
    pub fn interface_requests(&self) -> Vec<(String, String)> {
        self.interface_requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl InstanceLookup for MockProvider {
    async fn get_scale_set_vm(&self, node: &NodeName) -> Result<Option<ScaleSetVm>> {
        self.instance_lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.instance_errors.get(node.as_str()) {
            return Err(anyhow::anyhow!("{}", message));
        }
        Ok(self.vms.get(node.as_str()).cloned())
    }
}

#[async_trait]
impl InterfaceLookup for MockProvider {
    async fn get_network_interface(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<NetworkInterface> {
        self.interface_lookups.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.interface_requests.lock() {
            requests.push((resource_group.to_string(), name.to_string()));
        }
        if let Some(message) = self.interface_errors.get(name) {
            return Err(anyhow::anyhow!("{}", message));
        }
        self.interfaces.get(name).cloned().ok_or_else(|| {
            anyhow::anyhow!(
                "network interface {} not found in resource group {}",
                name,
                resource_group
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "vms": [
            {
                "node": "k8s-agent-vmss000000",
                "name": "agentpool-vmss_0",
                "network_interfaces": [
                    {"id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/networkInterfaces/nic-0"}
                ]
            }
        ],
        "interfaces": [
            {
                "name": "nic-0",
                "ip_configurations": [
                    {"name": "ipconfig1", "private_ip_address": "10.0.0.4"}
                ]
            }
        ]
    }"#;

    #[tokio::test]
    async fn fixture_round_trips_through_lookups() {
        let provider = MockProvider::from_json(FIXTURE).unwrap();

        let vm = provider
            .get_scale_set_vm(&NodeName::from("k8s-agent-vmss000000"))
            .await
            .unwrap()
            .expect("vm should exist");
        assert_eq!(vm.name, "agentpool-vmss_0");

        let missing = provider
            .get_scale_set_vm(&NodeName::from("k8s-agent-vmss000001"))
            .await
            .unwrap();
        assert!(missing.is_none());

        let nic = provider.get_network_interface("rg", "nic-0").await.unwrap();
        assert_eq!(
            nic.ip_configurations[0].private_ip_address.as_deref(),
            Some("10.0.0.4")
        );

        assert_eq!(provider.instance_lookups(), 2);
        assert_eq!(provider.interface_lookups(), 1);
        assert_eq!(
            provider.interface_requests(),
            vec![("rg".to_string(), "nic-0".to_string())]
        );
    }

    #[tokio::test]
    async fn injected_errors_are_returned() {
        let provider = MockProvider::new()
            .with_instance_error("vm-err", "throttled")
            .with_interface_error("nic-err", "forbidden");

        let err = provider
            .get_scale_set_vm(&NodeName::from("vm-err"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "throttled");

        let err = provider
            .get_network_interface("rg", "nic-err")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "forbidden");

        assert!(provider.get_network_interface("rg", "nic-x").await.is_err());
    }

    #[test]
    fn malformed_fixture_is_rejected() {
        assert!(MockProvider::from_json("{\"vms\": [{}]}").is_err());
    }
}
