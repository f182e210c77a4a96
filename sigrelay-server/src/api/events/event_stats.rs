use axum::{
    Json,
    extract::{Query, State},
};
use sigrelay_sdk::objects::{EventStatsResponse, StatsQuery};

use crate::state::AppState;

use super::{EventsApiError, stats_response};

/// `GET /events/stats`: counts per status, optionally for one tenant.
pub async fn event_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<EventStatsResponse>, EventsApiError> {
    let tenant_id = query.tenant_id.filter(|t| !t.is_empty());
    let stats = state.events.stats(tenant_id).await?;
    Ok(Json(stats_response(stats)))
}
