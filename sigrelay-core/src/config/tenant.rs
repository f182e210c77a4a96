use async_trait::async_trait;
use sigrelay_sdk::signature::{SignatureError, verify_body};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmCredentials {
    pub base_url: Url,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCredentials {
    pub base_url: Url,
    pub api_key: String,
}

/// A tenant: one CRM instance plus one document-provider account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub active: bool,
    /// HMAC key for inbound webhook signatures.
    pub webhook_secret: Option<Box<[u8]>>,
    pub crm: CrmCredentials,
    pub documents: DocumentCredentials,
    /// Default target for `send_notification` actions.
    pub notification_url: Option<Url>,
}

impl Tenant {
    /// Check an `X-Signature` header against the raw body.
    ///
    /// Tenants without a secret accept every body.
    pub fn verify_signature(&self, body: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        let Some(secret) = self.webhook_secret.as_deref() else {
            return Ok(());
        };
        let header = header.ok_or(SignatureError::Missing)?;
        verify_body(body, header, secret)
    }
}

/// Read-only tenant lookup used by the ingestor and the orchestrator.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn tenant(&self, id: &str) -> Option<Tenant>;
}

/// Tenant set held in memory and swapped wholesale on reload.
#[derive(Clone)]
pub struct TenantRegistry {
    tenants: Arc<RwLock<HashMap<String, Tenant>>>,
}

impl TenantRegistry {
    pub fn new(tenants: impl IntoIterator<Item = Tenant>) -> Self {
        Self {
            tenants: Arc::new(RwLock::new(index(tenants))),
        }
    }

    /// Lookups in flight keep the old set; later ones see only the new one.
    pub async fn replace(&self, tenants: impl IntoIterator<Item = Tenant>) {
        let indexed = index(tenants);
        *self.tenants.write().await = indexed;
    }
}

fn index(tenants: impl IntoIterator<Item = Tenant>) -> HashMap<String, Tenant> {
    tenants.into_iter().map(|t| (t.id.clone(), t)).collect()
}

#[async_trait]
impl TenantDirectory for TenantRegistry {
    async fn tenant(&self, id: &str) -> Option<Tenant> {
        self.tenants.read().await.get(id).cloned()
    }
}
