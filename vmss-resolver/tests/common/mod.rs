// Shared fixtures. All resolution tests run against the Mock provider.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vmss_common::{IpConfiguration, NetworkInterface, NetworkInterfaceReference, ScaleSetVm};
use vmss_providers::limiter::RateLimiter;
use vmss_providers::mock::MockProvider;
use vmss_resolver::InstanceAddressResolver;

pub const RESOURCE_GROUP: &str = "k8s-rg";

/// Limiter that admits everyone and counts permits.
#[derive(Default)]
pub struct CountingLimiter {
    accepted: AtomicUsize,
}

impl CountingLimiter {
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateLimiter for CountingLimiter {
    async fn accept(&self) {
        self.accepted.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn nic_id(name: &str) -> String {
    format!(
        "/subscriptions/sub/resourceGroups/{}/providers/Microsoft.Network/networkInterfaces/{}",
        RESOURCE_GROUP, name
    )
}

pub fn vm(name: &str, nics: &[(&str, bool)]) -> ScaleSetVm {
    ScaleSetVm {
        name: name.to_string(),
        network_interfaces: nics
            .iter()
            .map(|(nic, primary)| NetworkInterfaceReference {
                id: nic_id(nic),
                primary: *primary,
            })
            .collect(),
    }
}

pub fn nic(name: &str, configs: &[(&str, bool, &str)]) -> NetworkInterface {
    NetworkInterface {
        name: name.to_string(),
        ip_configurations: configs
            .iter()
            .map(|(config, primary, ip)| IpConfiguration {
                name: config.to_string(),
                primary: *primary,
                private_ip_address: Some(ip.to_string()),
            })
            .collect(),
    }
}

pub struct TestResolver {
    pub resolver: InstanceAddressResolver,
    pub provider: Arc<MockProvider>,
    pub limiter: Arc<CountingLimiter>,
}

pub fn resolver_with(provider: MockProvider) -> TestResolver {
    let provider = Arc::new(provider);
    let limiter = Arc::new(CountingLimiter::default());
    let resolver = InstanceAddressResolver::new(
        provider.clone(),
        provider.clone(),
        limiter.clone(),
        RESOURCE_GROUP,
    );
    TestResolver {
        resolver,
        provider,
        limiter,
    }
}
