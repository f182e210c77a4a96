use axum::{
    Json,
    extract::{Path, State},
};
use sigrelay_sdk::objects::EventSummaryResponse;
use uuid::Uuid;

use crate::state::AppState;

use super::{EventsApiError, event_summary};

/// `POST /events/{id}/retry`: reset to `pending` and attempt immediately.
///
/// Completed actions stay marked and are skipped on the new attempt.
pub async fn retry_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventSummaryResponse>, EventsApiError> {
    let event = state.scheduler.manual_retry(id).await?;
    tracing::info!(event_id = %id, "Manual retry requested");
    Ok(Json(event_summary(&event)))
}
