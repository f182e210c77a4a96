//! Operator endpoints over stored events.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sigrelay_core::entities::EventStatus;
use sigrelay_core::entities::events::{EventRecord, EventStats};
use sigrelay_core::processors::SchedulerError;
use sigrelay_core::store::StoreError;
use sigrelay_sdk::objects::{EventDetailResponse, EventStatsResponse, EventSummaryResponse};

pub mod event_stats;
pub mod get_event;
pub mod list_failed;
pub mod retry_event;

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in event handlers.
#[derive(Debug)]
pub(crate) enum EventsApiError {
    Store(StoreError),
    NotFound,
    InvalidTransition(EventStatus),
}

impl From<StoreError> for EventsApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<SchedulerError> for EventsApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Store(e) => Self::Store(e),
            SchedulerError::NotFound(_) => Self::NotFound,
            SchedulerError::InvalidTransition { status, .. } => Self::InvalidTransition(status),
        }
    }
}

impl IntoResponse for EventsApiError {
    fn into_response(self) -> Response {
        match self {
            EventsApiError::Store(e) => {
                tracing::error!(error = %e, "Events API store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            EventsApiError::NotFound => (StatusCode::NOT_FOUND, "event not found").into_response(),
            EventsApiError::InvalidTransition(status) => (
                StatusCode::CONFLICT,
                format!("event is {status} and cannot be retried"),
            )
                .into_response(),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

pub(crate) fn event_summary(r: &EventRecord) -> EventSummaryResponse {
    EventSummaryResponse {
        id: r.id,
        event_id: r.event_id.clone(),
        event_type: r.event_type.clone(),
        tenant_id: r.tenant_id.clone(),
        status: r.status.into(),
        retry_count: r.retry_count,
        max_retries: r.max_retries,
        next_retry_at: r.next_retry_at.map(|t| t.unix_timestamp()),
        error_message: r.error_message.clone(),
        actions_triggered: r.actions_triggered,
        received_at: r.received_at.unix_timestamp(),
        processed_at: r.processed_at.map(|t| t.unix_timestamp()),
        updated_at: r.updated_at.unix_timestamp(),
    }
}

pub(crate) fn event_detail(r: EventRecord) -> EventDetailResponse {
    EventDetailResponse {
        summary: event_summary(&r),
        payload: r.payload,
        processing_time_ms: r.processing_time_ms,
        response: r.response,
    }
}

pub(crate) fn stats_response(s: EventStats) -> EventStatsResponse {
    EventStatsResponse {
        total: s.total,
        pending: s.pending,
        processing: s.processing,
        success: s.success,
        failed: s.failed,
        permanently_failed: s.permanently_failed,
    }
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{TestApp, get, post_empty, post_json, read_json};
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sigrelay_core::processors::AttemptReport;
    use uuid::Uuid;

    async fn ingest(app: &TestApp, event_id: &str, fail: bool) -> Uuid {
        let body = json!({
            "eventType": "document.signed",
            "eventId": event_id,
            "fail": fail,
        })
        .to_string();
        let response = app.send(post_json("/webhooks/open", &body, &[])).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        json["webhookId"].as_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn test_failed_event_listing_stats_and_retry() {
        let app = TestApp::new();
        let failing = ingest(&app, "evt-fail", true).await;
        let passing = ingest(&app, "evt-ok", false).await;

        let report = app.scheduler.attempt(failing).await.unwrap();
        assert!(matches!(report, AttemptReport::RetryScheduled { retry_count: 1, .. }));
        app.scheduler.attempt(passing).await.unwrap();

        let stats = read_json(app.send(get("/events/stats")).await).await;
        assert_eq!(stats["total"], 2);
        assert_eq!(stats["failed"], 1);
        assert_eq!(stats["success"], 1);
        assert_eq!(stats["permanentlyFailed"], 0);

        let other = read_json(app.send(get("/events/stats?tenant_id=acme")).await).await;
        assert_eq!(other["total"], 0);

        let failed = read_json(app.send(get("/events/failed?limit=0")).await).await;
        let failed = failed.as_array().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["eventId"], "evt-fail");
        assert_eq!(failed[0]["status"], "failed");
        assert_eq!(failed[0]["retryCount"], 1);
        assert!(failed[0]["nextRetryAt"].is_i64());

        let retried = app
            .send(post_empty(&format!("/events/{failing}/retry")))
            .await;
        assert_eq!(retried.status(), StatusCode::OK);
        let retried = read_json(retried).await;
        assert_eq!(retried["status"], "pending");
        assert_eq!(retried["retryCount"], 0);
        assert_eq!(retried["nextRetryAt"], Value::Null);
    }

    #[tokio::test]
    async fn test_retry_rejects_successful_and_unknown_events() {
        let app = TestApp::new();
        let id = ingest(&app, "evt-done", false).await;
        app.scheduler.attempt(id).await.unwrap();

        let conflict = app.send(post_empty(&format!("/events/{id}/retry"))).await;
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let missing = app
            .send(post_empty(&format!("/events/{}/retry", Uuid::new_v4())))
            .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let garbage = app.send(post_empty("/events/not-a-uuid/retry")).await;
        assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_event_detail() {
        let app = TestApp::new();
        let id = ingest(&app, "evt-detail", false).await;
        app.scheduler.attempt(id).await.unwrap();

        let detail = read_json(app.send(get(&format!("/events/{id}"))).await).await;
        assert_eq!(detail["id"], id.to_string());
        assert_eq!(detail["status"], "success");
        assert_eq!(detail["payload"]["eventId"], "evt-detail");
        assert_eq!(detail["response"]["workflows"], json!([]));
        assert_eq!(detail["actionsTriggered"], 1);

        let missing = app
            .send(get(&format!("/events/{}", Uuid::new_v4())))
            .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
