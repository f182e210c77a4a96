//! Inbound webhook endpoints.
//!
//! The handler returns as soon as the event is durable; processing runs on
//! the scheduler.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sigrelay_core::processors::{IngestError, IngestOutcome};
use sigrelay_sdk::objects::IngestResponse;

use crate::api::extractors::RawWebhook;
use crate::state::AppState;

/// `POST /webhooks`: tenant from `metadata.tenant_id` or `tenant_id`.
pub async fn receive(
    State(state): State<AppState>,
    webhook: RawWebhook,
) -> Result<Json<IngestResponse>, WebhookError> {
    ingest(&state, webhook, None).await
}

/// `POST /webhooks/{tenant_id}`: the route parameter wins over the payload.
pub async fn receive_for_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    webhook: RawWebhook,
) -> Result<Json<IngestResponse>, WebhookError> {
    ingest(&state, webhook, Some(tenant_id)).await
}

async fn ingest(
    state: &AppState,
    webhook: RawWebhook,
    tenant_hint: Option<String>,
) -> Result<Json<IngestResponse>, WebhookError> {
    let IngestOutcome { event, duplicate } = state
        .ingestor
        .ingest(webhook.into_request(tenant_hint))
        .await?;
    let response = if duplicate {
        IngestResponse::duplicate(event.event_id, event.id)
    } else {
        IngestResponse::queued(event.event_id, event.id)
    };
    Ok(Json(response))
}

/// Ingest rejection mapped onto an HTTP status.
#[derive(Debug)]
pub struct WebhookError(IngestError);

impl From<IngestError> for WebhookError {
    fn from(err: IngestError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            IngestError::Malformed(_) => StatusCode::BAD_REQUEST,
            IngestError::Signature(_) => StatusCode::UNAUTHORIZED,
            IngestError::TenantInactive(_) => StatusCode::FORBIDDEN,
            IngestError::UnknownTenant(_) => StatusCode::NOT_FOUND,
            IngestError::MissingTenant => StatusCode::UNPROCESSABLE_ENTITY,
            IngestError::Store(e) => {
                tracing::error!(error = %e, "Webhook could not be stored");
                return (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
                    .into_response();
            }
        };
        tracing::debug!(%status, error = %self.0, "Webhook rejected");
        (status, self.0.to_string()).into_response()
    }
}
