//! TOML file configuration structures.
//!
//! These structs directly map to the `sigrelay.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// `[processing]` section: retry schedule and worker limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
    #[serde(default = "default_base_retry_delay_ms")]
    pub base_retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_true")]
    pub exponential_backoff: bool,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_stale_processing_secs")]
    pub stale_processing_secs: u64,
    #[serde(default = "default_max_concurrent_attempts")]
    pub max_concurrent_attempts: usize,
    #[serde(default = "default_true")]
    pub verify_signatures: bool,
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_retry_delay_ms: default_base_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            exponential_backoff: true,
            sweep_interval_secs: default_sweep_interval_secs(),
            stale_processing_secs: default_stale_processing_secs(),
            max_concurrent_attempts: default_max_concurrent_attempts(),
            verify_signatures: true,
            remote_timeout_secs: default_remote_timeout_secs(),
        }
    }
}

fn default_max_retries() -> i32 {
    3
}

fn default_base_retry_delay_ms() -> u64 {
    1000
}

fn default_max_retry_delay_ms() -> u64 {
    60_000
}

fn default_sweep_interval_secs() -> u64 {
    10
}

fn default_stale_processing_secs() -> u64 {
    300
}

fn default_max_concurrent_attempts() -> usize {
    16
}

fn default_remote_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// One `[[tenants]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub id: String,
    /// Display name; defaults to the id.
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Shared secret for `X-Signature`. Unsigned deliveries are accepted when unset.
    pub webhook_secret: Option<String>,
    pub crm: CrmConfig,
    pub documents: DocumentsConfig,
    pub notification_url: Option<Url>,
}

/// `[tenants.crm]`: the tenant's CRM REST endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    pub base_url: Url,
    pub access_token: String,
}

/// `[tenants.documents]`: the tenant's document-provider account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    pub base_url: Url,
    pub api_key: String,
}
