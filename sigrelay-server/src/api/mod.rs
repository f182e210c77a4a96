//! HTTP API handlers.
//!
//! # Endpoints
//!
//! - `POST /webhooks`                – receive a webhook, tenant taken from the payload
//! - `POST /webhooks/{tenant_id}`    – receive a webhook for an explicit tenant
//! - `GET  /events/stats`            – event counts by status
//! - `GET  /events/failed`           – failed and permanently failed events (paginated)
//! - `GET  /events/{id}`             – event detail including the action audit trail
//! - `POST /events/{id}/retry`       – reset an event to `pending` and attempt it again

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::state::AppState;

pub mod events;
pub mod extractors;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod testing;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks", post(webhooks::receive))
        .route("/webhooks/{tenant_id}", post(webhooks::receive_for_tenant))
        .route("/events/stats", get(events::event_stats::event_stats))
        .route("/events/failed", get(events::list_failed::list_failed))
        .route("/events/{id}", get(events::get_event::get_event))
        .route("/events/{id}/retry", post(events::retry_event::retry_event))
        .layer(DefaultBodyLimit::max(extractors::MAX_BODY_BYTES))
}
