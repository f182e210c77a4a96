//! Ingestor: validates, deduplicates and persists inbound webhooks.
//!
//! Rejections (malformed body, unroutable tenant, bad signature) happen
//! before anything is written. A new event is committed as `pending` and an
//! immediate attempt is requested from the scheduler.

use crate::config::{ProcessingConfig, TenantDirectory};
use crate::entities::events::{EventRecord, InsertEvent};
use crate::events::{AttemptRequest, AttemptSender};
use crate::payload::first_string;
use crate::store::{EventStore, InsertOutcome, StoreError};
use bytes::Bytes;
use serde_json::Value;
use sigrelay_sdk::signature::SignatureError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    /// Raw body exactly as received; signatures are computed over it.
    pub body: Bytes,
    pub signature: Option<String>,
    /// Tenant from the route, preferred over the payload.
    pub tenant_hint: Option<String>,
    /// Event id from the `X-Event-Id` header, preferred over the payload.
    pub event_id_hint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub event: EventRecord,
    pub duplicate: bool,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("no tenant in route, metadata.tenant_id or tenant_id")]
    MissingTenant,
    #[error("unknown tenant: {0}")]
    UnknownTenant(String),
    #[error("tenant is inactive: {0}")]
    TenantInactive(String),
    #[error("signature rejected: {0}")]
    Signature(#[from] SignatureError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub struct Ingestor {
    store: Arc<dyn EventStore>,
    tenants: Arc<dyn TenantDirectory>,
    attempts: AttemptSender,
    max_retries: i32,
    verify_signatures: bool,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn EventStore>,
        tenants: Arc<dyn TenantDirectory>,
        attempts: AttemptSender,
        config: &ProcessingConfig,
    ) -> Self {
        if !config.verify_signatures {
            warn!("Webhook signature verification is disabled");
        }
        Self {
            store,
            tenants,
            attempts,
            max_retries: config.retry.max_retries,
            verify_signatures: config.verify_signatures,
        }
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome, IngestError> {
        let payload = normalize(&request.body)?;
        let event_type = first_string(&payload, &["eventType", "event_type", "event"])
            .ok_or_else(|| IngestError::Malformed("missing eventType".to_string()))?;

        let tenant_id = non_empty(request.tenant_hint)
            .or_else(|| first_string(&payload, &["metadata.tenant_id", "tenant_id"]))
            .ok_or(IngestError::MissingTenant)?;
        let tenant = self
            .tenants
            .tenant(&tenant_id)
            .await
            .ok_or_else(|| IngestError::UnknownTenant(tenant_id.clone()))?;
        if !tenant.active {
            return Err(IngestError::TenantInactive(tenant_id));
        }
        if self.verify_signatures {
            tenant.verify_signature(&request.body, request.signature.as_deref())?;
        }

        let event_id = non_empty(request.event_id_hint)
            .or_else(|| first_string(&payload, &["eventId", "event_id", "id", "data.id"]))
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let outcome = self
            .store
            .insert_if_absent(InsertEvent {
                id: Uuid::new_v4(),
                event_id,
                event_type,
                tenant_id,
                payload,
                max_retries: self.max_retries,
            })
            .await?;

        match outcome {
            InsertOutcome::Duplicate(event) => {
                debug!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    webhook_id = %event.id,
                    "Duplicate webhook"
                );
                Ok(IngestOutcome {
                    event,
                    duplicate: true,
                })
            }
            InsertOutcome::Inserted(event) => {
                info!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    tenant_id = %event.tenant_id,
                    webhook_id = %event.id,
                    "Webhook queued"
                );
                if let Err(e) = self.attempts.send(AttemptRequest::now(event.id)).await {
                    warn!(webhook_id = %event.id, error = %e, "Could not request attempt, sweep will pick the event up");
                }
                Ok(IngestOutcome {
                    event,
                    duplicate: false,
                })
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Parse the body into a JSON object. A array body is reduced to its first
/// element.
fn normalize(body: &[u8]) -> Result<Value, IngestError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| IngestError::Malformed(e.to_string()))?;
    let value = match value {
        Value::Array(items) => items
            .into_iter()
            .next()
            .ok_or_else(|| IngestError::Malformed("empty array".to_string()))?,
        other => other,
    };
    if !value.is_object() {
        return Err(IngestError::Malformed("expected a JSON object".to_string()));
    }
    Ok(value)
}
