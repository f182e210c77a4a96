use axum::{
    Json,
    extract::{Query, State},
};
use sigrelay_sdk::objects::{EventSummaryResponse, ListFailedEventsQuery, clamp_pagination};

use crate::state::AppState;

use super::{EventsApiError, event_summary};

/// `GET /events/failed`: `failed` and `permanently_failed` events, newest first.
pub async fn list_failed(
    State(state): State<AppState>,
    Query(query): Query<ListFailedEventsQuery>,
) -> Result<Json<Vec<EventSummaryResponse>>, EventsApiError> {
    let (limit, offset) = clamp_pagination(query.limit, query.offset);
    let tenant_id = query.tenant_id.filter(|t| !t.is_empty());

    let events = state.events.list_failed(tenant_id, limit, offset).await?;
    Ok(Json(events.iter().map(event_summary).collect()))
}
