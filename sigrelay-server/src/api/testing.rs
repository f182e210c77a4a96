//! In-memory application used by the handler tests.

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use serde_json::{Value, json};
use sigrelay_core::config::{
    CrmCredentials, DocumentCredentials, ProcessingConfig, Tenant, TenantRegistry,
};
use sigrelay_core::entities::events::EventRecord;
use sigrelay_core::events::{AttemptReceiver, attempt_channel};
use sigrelay_core::processors::{AttemptHandler, AttemptOutcome, Ingestor, RetryScheduler};
use sigrelay_core::store::MemoryEventStore;
use std::sync::Arc;
use tower::ServiceExt;

use crate::server::build_router;
use crate::state::AppState;

/// Fails events whose payload carries `"fail": true`.
struct PayloadHandler;

#[async_trait]
impl AttemptHandler for PayloadHandler {
    async fn handle(&self, event: &EventRecord) -> AttemptOutcome {
        let fail = event.payload["fail"] == json!(true);
        AttemptOutcome {
            success: !fail,
            error_message: fail.then(|| "crm: update_record: 503".to_string()),
            actions_triggered: i32::from(!fail),
            response: json!({ "workflows": [] }),
        }
    }
}

fn tenant(id: &str, secret: Option<&str>, active: bool) -> Tenant {
    Tenant {
        id: id.to_string(),
        name: id.to_string(),
        active,
        webhook_secret: secret.map(|s| s.as_bytes().into()),
        crm: CrmCredentials {
            base_url: "https://crm.test/rest/v11".parse().unwrap(),
            access_token: "token".to_string(),
        },
        documents: DocumentCredentials {
            base_url: "https://docs.test/api".parse().unwrap(),
            api_key: "key".to_string(),
        },
        notification_url: None,
    }
}

pub(crate) struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryEventStore>,
    pub scheduler: RetryScheduler,
    _attempts: AttemptReceiver,
}

impl TestApp {
    pub fn new() -> Self {
        let config = ProcessingConfig::default();
        let store = Arc::new(MemoryEventStore::new());
        let tenants = TenantRegistry::new([
            tenant("acme", Some("s3cret"), true),
            tenant("open", None, true),
            tenant("dormant", None, false),
        ]);
        let (attempt_tx, attempt_rx) = attempt_channel();

        let ingestor = Ingestor::new(
            store.clone(),
            Arc::new(tenants),
            attempt_tx.clone(),
            &config,
        );
        let scheduler = RetryScheduler::new(store.clone(), Arc::new(PayloadHandler), config, attempt_tx);
        let state = AppState::new(ingestor, scheduler.clone(), store.clone());

        Self {
            router: build_router(state),
            store,
            scheduler,
            _attempts: attempt_rx,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub(crate) fn post_json(uri: &str, body: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::post(uri).header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub(crate) fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub(crate) fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

pub(crate) async fn read_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
