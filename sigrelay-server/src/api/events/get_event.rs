use axum::{
    Json,
    extract::{Path, State},
};
use sigrelay_sdk::objects::EventDetailResponse;
use uuid::Uuid;

use crate::state::AppState;

use super::{EventsApiError, event_detail};

/// `GET /events/{id}`: full event including payload and action audit trail.
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventDetailResponse>, EventsApiError> {
    let event = state
        .events
        .get(id)
        .await?
        .ok_or(EventsApiError::NotFound)?;
    Ok(Json(event_detail(event)))
}
