use crate::config::AzureConfig;
use crate::{InstanceLookup, InterfaceLookup};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use vmss_common::{
    scale_set_instance_id, IpConfiguration, NetworkInterface, NetworkInterfaceReference, NodeName,
    ScaleSetVm,
};

const COMPUTE_API_VERSION: &str = "2017-03-30";
const NETWORK_API_VERSION: &str = "2017-09-01";
/// Refresh the AAD token this long before it actually expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// Lifetime assumed when AAD omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(300);
/// Upper bound on a cached token's lifetime, whatever AAD reports.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Azure Resource Manager backed lookups for scale-set VMs and their NICs.
pub struct AzureProvider {
    client: Client,
    config: AzureConfig,
    token: Mutex<Option<CachedToken>>,
}

impl AzureProvider {
    pub fn new(config: AzureConfig) -> Result<Self> {
        // Default reqwest client has no overall timeout. If ARM stalls, a resolution can hang forever.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .context("failed to build Azure HTTP client")?;
        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &AzureConfig {
        &self.config
    }

    fn scale_set_vm_url(&self, instance_id: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachineScaleSets/{}/virtualMachines/{}?api-version={}",
            self.config.resource_manager_endpoint,
            self.config.subscription_id,
            self.config.resource_group,
            self.config.primary_scale_set_name,
            instance_id,
            COMPUTE_API_VERSION
        )
    }

    fn network_interface_url(&self, resource_group: &str, name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/networkInterfaces/{}?api-version={}",
            self.config.resource_manager_endpoint,
            self.config.subscription_id,
            resource_group,
            name,
            NETWORK_API_VERSION
        )
    }

    /// AAD client-credentials token for the resource manager, cached until near expiry.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let url = format!(
            "{}/{}/oauth2/token",
            self.config.active_directory_endpoint, self.config.tenant_id
        );
        let resource = format!("{}/", self.config.resource_manager_endpoint);
        tracing::debug!("[Azure AD] POST {} - requesting token for {}", url, resource);

        let resp = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("resource", resource.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Azure AD token request failed: status={} body={}",
                status.as_u16(),
                text
            ));
        }

        let body: TokenResponse = resp.json().await.context("invalid Azure AD token response")?;
        let lifetime = body
            .expires_in_secs()
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let access_token = body.access_token;
        *cached = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at: token_deadline(Instant::now(), lifetime),
        });
        Ok(access_token)
    }

    /// GET an ARM resource. `Ok(None)` on 404.
    async fn get_resource<T: DeserializeOwned>(&self, call: &str, url: &str) -> Result<Option<T>> {
        let token = self.access_token().await?;
        let request_id = uuid::Uuid::new_v4();
        tracing::debug!("[Azure API] GET {} - {} (request_id={})", url, call, request_id);

        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .header("x-ms-client-request-id", request_id.to_string())
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!("[Azure API] GET {} - not found (request_id={})", url, request_id);
            return Ok(None);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Azure {} failed: status={} body={} request_id={}",
                call,
                status.as_u16(),
                text,
                request_id
            ));
        }

        let body = resp
            .json::<T>()
            .await
            .with_context(|| format!("invalid {} response (request_id={})", call, request_id))?;
        Ok(Some(body))
    }
}

fn token_deadline(now: Instant, lifetime: Duration) -> Instant {
    let lifetime = lifetime.min(MAX_TOKEN_LIFETIME);
    now.checked_add(lifetime)
        .or_else(|| now.checked_add(DEFAULT_TOKEN_LIFETIME))
        .unwrap_or(now)
}

#[async_trait]
impl InstanceLookup for AzureProvider {
    async fn get_scale_set_vm(&self, node: &NodeName) -> Result<Option<ScaleSetVm>> {
        let instance_id = scale_set_instance_id(node.as_str())?;
        let url = self.scale_set_vm_url(&instance_id);
        let Some(wire) = self
            .get_resource::<ScaleSetVmWire>("VirtualMachineScaleSetVMs.Get", &url)
            .await?
        else {
            return Ok(None);
        };
        wire.into_scale_set_vm(node).map(Some)
    }
}

#[async_trait]
impl InterfaceLookup for AzureProvider {
    async fn get_network_interface(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<NetworkInterface> {
        let url = self.network_interface_url(resource_group, name);
        let wire = self
            .get_resource::<NetworkInterfaceWire>("InterfacesClient.Get", &url)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "network interface {} not found in resource group {}",
                    name,
                    resource_group
                )
            })?;
        Ok(wire.into_network_interface(name))
    }
}

// --- Wire format (ARM JSON, every field optional) ---

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    // AAD v1 returns this as a string, v2 as a number.
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

impl TokenResponse {
    fn expires_in_secs(&self) -> Option<u64> {
        match self.expires_in.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScaleSetVmWire {
    name: Option<String>,
    properties: Option<ScaleSetVmProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScaleSetVmProperties {
    network_profile: Option<NetworkProfileWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkProfileWire {
    network_interfaces: Option<Vec<InterfaceReferenceWire>>,
}

#[derive(Debug, Deserialize)]
struct InterfaceReferenceWire {
    id: Option<String>,
    properties: Option<PrimaryFlag>,
}

#[derive(Debug, Deserialize)]
struct PrimaryFlag {
    primary: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct NetworkInterfaceWire {
    name: Option<String>,
    properties: Option<NetworkInterfaceProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkInterfaceProperties {
    ip_configurations: Option<Vec<IpConfigurationWire>>,
}

#[derive(Debug, Deserialize)]
struct IpConfigurationWire {
    name: Option<String>,
    properties: Option<IpConfigurationProperties>,
}

#[derive(Debug, Deserialize)]
struct IpConfigurationProperties {
    #[serde(rename = "privateIPAddress")]
    private_ip_address: Option<String>,
    primary: Option<bool>,
}

impl ScaleSetVmWire {
    fn into_scale_set_vm(self, node: &NodeName) -> Result<ScaleSetVm> {
        let name = self.name.unwrap_or_else(|| node.to_string());
        let refs = self
            .properties
            .and_then(|p| p.network_profile)
            .and_then(|p| p.network_interfaces)
            .unwrap_or_default();

        let network_interfaces = refs
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                let id = r.id.ok_or_else(|| {
                    anyhow::anyhow!("network interface reference {} of vm {} has no id", i, name)
                })?;
                Ok(NetworkInterfaceReference {
                    id,
                    primary: r.properties.and_then(|p| p.primary).unwrap_or(false),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ScaleSetVm {
            name,
            network_interfaces,
        })
    }
}

impl NetworkInterfaceWire {
    fn into_network_interface(self, requested: &str) -> NetworkInterface {
        let name = self.name.unwrap_or_else(|| requested.to_string());
        let configs = self
            .properties
            .and_then(|p| p.ip_configurations)
            .unwrap_or_default();

        let ip_configurations = configs
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                let props = c.properties;
                IpConfiguration {
                    name: c.name.unwrap_or_else(|| format!("ipconfig-{}", i)),
                    primary: props.as_ref().and_then(|p| p.primary).unwrap_or(false),
                    private_ip_address: props
                        .and_then(|p| p.private_ip_address)
                        .filter(|ip| !ip.is_empty()),
                }
            })
            .collect();

        NetworkInterface {
            name,
            ip_configurations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vm_wire_converts_with_missing_flags() {
        let wire: ScaleSetVmWire = serde_json::from_str(
            r#"{
                "name": "agentpool-vmss_3",
                "instanceId": "3",
                "properties": {
                    "networkProfile": {
                        "networkInterfaces": [
                            {"id": "/s/networkInterfaces/nic-a"},
                            {"id": "/s/networkInterfaces/nic-b", "properties": {"primary": true}}
                        ]
                    }
                }
            }"#,
        )
        .unwrap();
        let vm = wire.into_scale_set_vm(&NodeName::from("vmss000003")).unwrap();
        assert_eq!(vm.name, "agentpool-vmss_3");
        assert_eq!(
            vm.network_interfaces,
            vec![
                NetworkInterfaceReference {
                    id: "/s/networkInterfaces/nic-a".to_string(),
                    primary: false
                },
                NetworkInterfaceReference {
                    id: "/s/networkInterfaces/nic-b".to_string(),
                    primary: true
                },
            ]
        );
    }

    #[test]
    fn vm_without_network_profile_has_no_interfaces() {
        let wire: ScaleSetVmWire = serde_json::from_str(r#"{"properties": {}}"#).unwrap();
        let vm = wire.into_scale_set_vm(&NodeName::from("vmss000003")).unwrap();
        assert_eq!(vm.name, "vmss000003");
        assert!(vm.network_interfaces.is_empty());
    }

    #[test]
    fn interface_reference_without_id_is_rejected() {
        let wire: ScaleSetVmWire = serde_json::from_str(
            r#"{"name": "vm", "properties": {"networkProfile": {"networkInterfaces": [{}]}}}"#,
        )
        .unwrap();
        assert!(wire.into_scale_set_vm(&NodeName::from("vm")).is_err());
    }

    #[test]
    fn nic_wire_converts_ip_configurations() {
        let wire: NetworkInterfaceWire = serde_json::from_str(
            r#"{
                "name": "nic-0",
                "properties": {
                    "ipConfigurations": [
                        {"name": "ipconfig1", "properties": {"privateIPAddress": "10.0.0.4", "primary": true}},
                        {"properties": {"privateIPAddress": ""}}
                    ]
                }
            }"#,
        )
        .unwrap();
        let nic = wire.into_network_interface("nic-0");
        assert_eq!(
            nic.ip_configurations[0].private_ip_address.as_deref(),
            Some("10.0.0.4")
        );
        assert!(nic.ip_configurations[0].primary);
        assert_eq!(nic.ip_configurations[1].name, "ipconfig-1");
        assert_eq!(nic.ip_configurations[1].private_ip_address, None);
    }

    #[test]
    fn secondary_config_without_address_keeps_the_nic_usable() {
        let wire: NetworkInterfaceWire = serde_json::from_str(
            r#"{
                "name": "nic-0",
                "properties": {
                    "ipConfigurations": [
                        {"name": "ipconfig1", "properties": {"privateIPAddress": "10.0.0.4", "primary": true}},
                        {"name": "ipv6config", "properties": {"primary": false}}
                    ]
                }
            }"#,
        )
        .unwrap();
        let nic = wire.into_network_interface("nic-0");
        assert_eq!(nic.ip_configurations.len(), 2);
        let primary = nic.primary_ip_configuration().unwrap();
        assert_eq!(primary.name, "ipconfig1");
        assert_eq!(primary.private_ip_address.as_deref(), Some("10.0.0.4"));
    }

    #[test]
    fn token_deadline_is_capped() {
        let now = Instant::now();
        assert_eq!(
            token_deadline(now, Duration::from_secs(3599)),
            now + Duration::from_secs(3599)
        );
        assert_eq!(
            token_deadline(now, Duration::from_secs(u64::MAX)),
            now + MAX_TOKEN_LIFETIME
        );
    }

    #[test]
    fn token_expiry_accepts_string_or_number() {
        let v1: TokenResponse =
            serde_json::from_str(r#"{"access_token": "t", "expires_in": "3599"}"#).unwrap();
        assert_eq!(v1.expires_in_secs(), Some(3599));
        let v2: TokenResponse =
            serde_json::from_str(r#"{"access_token": "t", "expires_in": 3600}"#).unwrap();
        assert_eq!(v2.expires_in_secs(), Some(3600));
        let none: TokenResponse = serde_json::from_str(r#"{"access_token": "t"}"#).unwrap();
        assert_eq!(none.expires_in_secs(), None);
    }
}
