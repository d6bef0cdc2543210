use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::num::NonZeroU32;
use thiserror::Error;

const DEFAULT_RATE_LIMIT_QPS: f32 = 1.0;
const DEFAULT_RATE_LIMIT_BUCKET: u32 = 5;
/// Slowest accepted refill rate: one permit every 1000s.
pub const MIN_RATE_LIMIT_QPS: f32 = 0.001;
/// Fastest accepted refill rate: one permit per nanosecond.
pub const MAX_RATE_LIMIT_QPS: f32 = 1e9;
const DEFAULT_CLIENT_SECRET_FILE: &str = "/run/secrets/azure_client_secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("unknown cloud environment {0:?}")]
    UnknownCloud(String),
    #[error("failed to read cloud config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse cloud config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Sovereign cloud the subscription lives in; selects the API endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AzureEnvironment {
    Public,
    China,
    UsGovernment,
    Germany,
}

impl AzureEnvironment {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "azurepubliccloud" => Some(Self::Public),
            "azurechinacloud" => Some(Self::China),
            "azureusgovernmentcloud" => Some(Self::UsGovernment),
            "azuregermancloud" => Some(Self::Germany),
            _ => None,
        }
    }

    pub fn resource_manager_endpoint(self) -> &'static str {
        match self {
            Self::Public => "https://management.azure.com",
            Self::China => "https://management.chinacloudapi.cn",
            Self::UsGovernment => "https://management.usgovcloudapi.net",
            Self::Germany => "https://management.microsoftazure.de",
        }
    }

    pub fn active_directory_endpoint(self) -> &'static str {
        match self {
            Self::Public => "https://login.microsoftonline.com",
            Self::China => "https://login.chinacloudapi.cn",
            Self::UsGovernment => "https://login.microsoftonline.us",
            Self::Germany => "https://login.microsoftonline.de",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub qps: f32,
    pub bucket: NonZeroU32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            qps: DEFAULT_RATE_LIMIT_QPS,
            bucket: NonZeroU32::new(DEFAULT_RATE_LIMIT_BUCKET).unwrap_or(NonZeroU32::MIN),
        }
    }
}

/// Cloud config file, as written by cluster provisioning tools (`azure.json`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudConfigFile {
    cloud: Option<String>,
    tenant_id: Option<String>,
    subscription_id: Option<String>,
    aad_client_id: Option<String>,
    aad_client_secret: Option<String>,
    resource_group: Option<String>,
    primary_scale_set_name: Option<String>,
    cloud_provider_rate_limit: Option<bool>,
    #[serde(rename = "cloudProviderRateLimitQPS")]
    cloud_provider_rate_limit_qps: Option<f32>,
    cloud_provider_rate_limit_bucket: Option<u32>,
}

#[derive(Clone)]
pub struct AzureConfig {
    pub tenant_id: String,
    pub subscription_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub resource_group: String,
    pub primary_scale_set_name: String,
    pub resource_manager_endpoint: String,
    pub active_directory_endpoint: String,
    pub rate_limit: RateLimitConfig,
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConfig")
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("resource_group", &self.resource_group)
            .field("primary_scale_set_name", &self.primary_scale_set_name)
            .field("resource_manager_endpoint", &self.resource_manager_endpoint)
            .field("active_directory_endpoint", &self.active_directory_endpoint)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl AzureConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from the optional `AZURE_CONFIG_FILE` plus `AZURE_*` variables.
    /// Variables win over the file.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let file = match var("AZURE_CONFIG_FILE") {
            Some(path) => read_cloud_config(&path)?,
            None => CloudConfigFile::default(),
        };
        let pick = |key: &str, from_file: Option<String>| {
            var(key).or_else(|| from_file.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        };

        let cloud = pick("AZURE_CLOUD", file.cloud.clone()).unwrap_or_default();
        let environment =
            AzureEnvironment::parse(&cloud).ok_or_else(|| ConfigError::UnknownCloud(cloud))?;

        // Prefer *_FILE for secrets (Docker/K8s friendly), fallback to env var, then the config file.
        let secret_file = var("AZURE_CLIENT_SECRET_FILE")
            .unwrap_or_else(|| DEFAULT_CLIENT_SECRET_FILE.to_string());
        let client_secret = fs::read_to_string(&secret_file)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| pick("AZURE_CLIENT_SECRET", file.aad_client_secret.clone()))
            .ok_or(ConfigError::Missing("aadClientSecret"))?;

        let rate_limit = RateLimitConfig {
            enabled: match var("AZURE_RATE_LIMIT") {
                Some(v) => parse_bool("AZURE_RATE_LIMIT", &v)?,
                None => file.cloud_provider_rate_limit.unwrap_or(false),
            },
            qps: match var("AZURE_RATE_LIMIT_QPS") {
                Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                    key: "AZURE_RATE_LIMIT_QPS",
                    value: v,
                })?,
                None => file
                    .cloud_provider_rate_limit_qps
                    .unwrap_or(DEFAULT_RATE_LIMIT_QPS),
            },
            bucket: {
                let bucket = match var("AZURE_RATE_LIMIT_BUCKET") {
                    Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                        key: "AZURE_RATE_LIMIT_BUCKET",
                        value: v,
                    })?,
                    None => file
                        .cloud_provider_rate_limit_bucket
                        .unwrap_or(DEFAULT_RATE_LIMIT_BUCKET),
                };
                NonZeroU32::new(bucket).ok_or(ConfigError::Invalid {
                    key: "AZURE_RATE_LIMIT_BUCKET",
                    value: bucket.to_string(),
                })?
            },
        };
        if !(MIN_RATE_LIMIT_QPS..=MAX_RATE_LIMIT_QPS).contains(&rate_limit.qps) {
            return Err(ConfigError::Invalid {
                key: "AZURE_RATE_LIMIT_QPS",
                value: rate_limit.qps.to_string(),
            });
        }

        Ok(Self {
            tenant_id: pick("AZURE_TENANT_ID", file.tenant_id)
                .ok_or(ConfigError::Missing("tenantId"))?,
            subscription_id: pick("AZURE_SUBSCRIPTION_ID", file.subscription_id)
                .ok_or(ConfigError::Missing("subscriptionId"))?,
            client_id: pick("AZURE_CLIENT_ID", file.aad_client_id)
                .ok_or(ConfigError::Missing("aadClientId"))?,
            client_secret,
            resource_group: pick("AZURE_RESOURCE_GROUP", file.resource_group)
                .ok_or(ConfigError::Missing("resourceGroup"))?,
            primary_scale_set_name: pick("AZURE_PRIMARY_SCALE_SET", file.primary_scale_set_name)
                .ok_or(ConfigError::Missing("primaryScaleSetName"))?,
            resource_manager_endpoint: var("AZURE_RESOURCE_MANAGER_ENDPOINT")
                .unwrap_or_else(|| environment.resource_manager_endpoint().to_string())
                .trim_end_matches('/')
                .to_string(),
            active_directory_endpoint: var("AZURE_AD_ENDPOINT")
                .unwrap_or_else(|| environment.active_directory_endpoint().to_string())
                .trim_end_matches('/')
                .to_string(),
            rate_limit,
        })
    }
}

fn read_cloud_config(path: &str) -> Result<CloudConfigFile, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}
