use crate::resolver::InstanceAddressResolver;
use anyhow::Result;
use std::env;

#[cfg(feature = "provider-mock")]
const DEFAULT_MOCK_RESOURCE_GROUP: &str = "mock-rg";

pub struct ProviderManager;

impl ProviderManager {
    /// Wire a resolver to the named provider, configured from the environment.
    pub fn build_resolver(provider_name: &str) -> Result<InstanceAddressResolver> {
        match provider_name.trim().to_lowercase().as_str() {
            "azure" => Self::azure(),
            "mock" => Self::mock(),
            other => Err(anyhow::anyhow!("unknown provider {:?}", other)),
        }
    }

    #[cfg(feature = "provider-azure")]
    fn azure() -> Result<InstanceAddressResolver> {
        use std::sync::Arc;
        use vmss_providers::azure::AzureProvider;
        use vmss_providers::config::AzureConfig;
        use vmss_providers::limiter::limiter_from_config;

        let config = AzureConfig::from_env()?;
        tracing::info!(
            "azure provider: subscription={} resource_group={} scale_set={}",
            config.subscription_id,
            config.resource_group,
            config.primary_scale_set_name
        );
        let limiter = limiter_from_config(&config.rate_limit);
        let resource_group = config.resource_group.clone();
        let provider = Arc::new(AzureProvider::new(config)?);
        Ok(InstanceAddressResolver::new(
            provider.clone(),
            provider,
            limiter,
            resource_group,
        ))
    }

    #[cfg(not(feature = "provider-azure"))]
    fn azure() -> Result<InstanceAddressResolver> {
        Err(anyhow::anyhow!(
            "provider azure is not compiled in (enable feature provider-azure)"
        ))
    }

    #[cfg(feature = "provider-mock")]
    fn mock() -> Result<InstanceAddressResolver> {
        use std::sync::Arc;
        use vmss_providers::limiter::NoopLimiter;
        use vmss_providers::mock::MockProvider;

        let provider = match env::var("MOCK_FIXTURE_FILE") {
            Ok(path) if !path.trim().is_empty() => MockProvider::from_file(path.trim())?,
            _ => MockProvider::new(),
        };
        let resource_group = env::var("MOCK_RESOURCE_GROUP")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_MOCK_RESOURCE_GROUP.to_string());
        let provider = Arc::new(provider);
        Ok(InstanceAddressResolver::new(
            provider.clone(),
            provider,
            Arc::new(NoopLimiter),
            resource_group,
        ))
    }

    #[cfg(not(feature = "provider-mock"))]
    fn mock() -> Result<InstanceAddressResolver> {
        Err(anyhow::anyhow!(
            "provider mock is not compiled in (enable feature provider-mock)"
        ))
    }
}
