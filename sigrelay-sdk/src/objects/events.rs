//! Operator API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Processing status of a stored event.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `sigrelay-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Processing,
    Success,
    Failed,
    PermanentlyFailed,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Pending => write!(f, "pending"),
            EventStatus::Processing => write!(f, "processing"),
            EventStatus::Success => write!(f, "success"),
            EventStatus::Failed => write!(f, "failed"),
            EventStatus::PermanentlyFailed => write!(f, "permanently_failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Event row as shown in listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummaryResponse {
    pub id: Uuid,
    pub event_id: String,
    pub event_type: String,
    pub tenant_id: String,
    pub status: EventStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: Option<i64>,
    pub error_message: Option<String>,
    pub actions_triggered: i32,
    pub received_at: i64,
    pub processed_at: Option<i64>,
    pub updated_at: i64,
}

/// Full event detail, including the payload and the per-action audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetailResponse {
    #[serde(flatten)]
    pub summary: EventSummaryResponse,
    pub payload: serde_json::Value,
    pub processing_time_ms: Option<i64>,
    pub response: Option<serde_json::Value>,
}

/// Event counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatsResponse {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub success: i64,
    pub failed: i64,
    pub permanently_failed: i64,
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;
const MAX_OFFSET: i64 = 100_000;

/// Query parameters for the statistics endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsQuery {
    pub tenant_id: Option<String>,
}

/// Query parameters for listing failed events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFailedEventsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub tenant_id: Option<String>,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// Clamp limit and offset to safe maximums.
pub fn clamp_pagination(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(1, MAX_LIMIT), offset.clamp(0, MAX_OFFSET))
}
