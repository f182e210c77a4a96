//! Configuration module for sigrelay-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::{
    FileConfig, ProcessingConfig as FileProcessingConfig, TenantConfig as FileTenantConfig,
};
use sigrelay_core::config::{
    CrmCredentials, DocumentCredentials, ProcessingConfig, RetryPolicy, Tenant,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Server section after CLI overrides.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub processing: ProcessingConfig,
    pub tenants: Vec<Tenant>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read, override, validate and convert the configuration file.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;
        Ok(build_loaded_config(file_config))
    }

    /// Reload the configuration (used during SIGHUP).
    ///
    /// Only the tenant set is applied live; processing options need a restart.
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    validate_processing(&config.processing)?;

    let mut seen = HashSet::new();
    for tenant in &config.tenants {
        if tenant.id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "tenant id must not be empty".to_string(),
            ));
        }
        if !seen.insert(tenant.id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate tenant id {}",
                tenant.id
            )));
        }
        if tenant.webhook_secret.as_deref() == Some("") {
            return Err(ConfigError::ValidationError(format!(
                "tenant {} has an empty webhook_secret",
                tenant.id
            )));
        }
        if tenant.crm.access_token.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "tenant {} has no CRM access token",
                tenant.id
            )));
        }
    }
    Ok(())
}

fn validate_processing(p: &FileProcessingConfig) -> Result<(), ConfigError> {
    let fail = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));
    if p.max_retries < 0 {
        return fail("max_retries must not be negative");
    }
    if p.base_retry_delay_ms > p.max_retry_delay_ms {
        return fail("base_retry_delay_ms exceeds max_retry_delay_ms");
    }
    if p.sweep_interval_secs == 0 {
        return fail("sweep_interval_secs must be at least 1");
    }
    if p.max_concurrent_attempts == 0 {
        return fail("max_concurrent_attempts must be at least 1");
    }
    if p.remote_timeout_secs == 0 {
        return fail("remote_timeout_secs must be at least 1");
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    LoadedConfig {
        server: ServerConfig {
            listen: file_config.server.listen,
        },
        processing: convert_processing(&file_config.processing),
        tenants: file_config
            .tenants
            .into_iter()
            .map(convert_tenant)
            .collect(),
    }
}

fn convert_processing(p: &FileProcessingConfig) -> ProcessingConfig {
    ProcessingConfig {
        retry: RetryPolicy {
            max_retries: p.max_retries,
            base_delay: Duration::from_millis(p.base_retry_delay_ms),
            max_delay: Duration::from_millis(p.max_retry_delay_ms),
            exponential: p.exponential_backoff,
        },
        sweep_interval: Duration::from_secs(p.sweep_interval_secs),
        stale_processing: Duration::from_secs(p.stale_processing_secs),
        max_concurrent_attempts: p.max_concurrent_attempts,
        verify_signatures: p.verify_signatures,
        remote_timeout: Duration::from_secs(p.remote_timeout_secs),
    }
}

fn convert_tenant(t: FileTenantConfig) -> Tenant {
    Tenant {
        name: t.name.unwrap_or_else(|| t.id.clone()),
        id: t.id,
        active: t.active,
        webhook_secret: t
            .webhook_secret
            .map(|s| s.into_bytes().into_boxed_slice()),
        crm: CrmCredentials {
            base_url: t.crm.base_url,
            access_token: t.crm.access_token,
        },
        documents: DocumentCredentials {
            base_url: t.documents.base_url,
            api_key: t.documents.api_key,
        },
        notification_url: t.notification_url,
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
