//! Custom Axum extractors.
//!
//! [`RawWebhook`] keeps the body as raw bytes so the `X-Signature` HMAC is
//! checked over exactly what the sender signed.

use axum::{
    body::Bytes,
    extract::{FromRequest, Request, rejection::BytesRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use sigrelay_core::processors::IngestRequest;
use sigrelay_sdk::signature::{EVENT_ID_HEADER, SIGNATURE_HEADER};

/// Maximum accepted webhook body, enforced by the router's `DefaultBodyLimit`.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Raw webhook delivery: body bytes plus the optional routing headers.
#[derive(Debug, Clone)]
pub struct RawWebhook {
    pub body: Bytes,
    pub signature: Option<String>,
    pub event_id: Option<String>,
}

impl RawWebhook {
    pub fn into_request(self, tenant_hint: Option<String>) -> IngestRequest {
        IngestRequest {
            body: self.body,
            signature: self.signature,
            tenant_hint,
            event_id_hint: self.event_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RawWebhookError {
    /// Over-limit bodies surface here as `413 Payload Too Large`.
    #[error(transparent)]
    Body(#[from] BytesRejection),
    #[error("invalid {0} header")]
    InvalidHeader(&'static str),
}

impl IntoResponse for RawWebhookError {
    fn into_response(self) -> Response {
        match self {
            Self::Body(rejection) => {
                tracing::debug!(status = %rejection.status(), "Webhook body rejected");
                (rejection.status(), rejection.body_text()).into_response()
            }
            Self::InvalidHeader(_) => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
        }
    }
}

fn header(headers: &HeaderMap, name: &'static str) -> Result<Option<String>, RawWebhookError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::to_owned)
                .map_err(|_| RawWebhookError::InvalidHeader(name))
        })
        .transpose()
}

impl<S: Send + Sync> FromRequest<S> for RawWebhook {
    type Rejection = RawWebhookError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let signature = header(req.headers(), SIGNATURE_HEADER)?;
        let event_id = header(req.headers(), EVENT_ID_HEADER)?;

        let body = Bytes::from_request(req, state).await?;

        Ok(RawWebhook {
            body,
            signature,
            event_id,
        })
    }
}
