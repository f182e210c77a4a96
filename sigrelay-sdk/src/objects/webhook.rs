//! Inbound webhook acknowledgement types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether an inbound delivery created a new event or matched a stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Queued,
    Duplicate,
}

/// Body returned to the document provider once the event is durable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub message: String,
    /// Sender-side event id (supplied or synthesized).
    pub event_id: String,
    /// Internal id of the stored event, used by the operator endpoints.
    pub webhook_id: Uuid,
    pub status: IngestStatus,
}

impl IngestResponse {
    pub fn queued(event_id: String, webhook_id: Uuid) -> Self {
        Self {
            message: "Webhook received and queued for processing".to_string(),
            event_id,
            webhook_id,
            status: IngestStatus::Queued,
        }
    }

    pub fn duplicate(event_id: String, webhook_id: Uuid) -> Self {
        Self {
            message: "Webhook already received".to_string(),
            event_id,
            webhook_id,
            status: IngestStatus::Duplicate,
        }
    }
}
