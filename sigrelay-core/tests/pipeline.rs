//! Ingest → scheduler → orchestrator → executor, with in-memory stores and
//! recording remotes.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value, json};
use sigrelay_core::actions::ActionExecutor;
use sigrelay_core::config::{
    CrmCredentials, DocumentCredentials, ProcessingConfig, Tenant, TenantRegistry,
};
use sigrelay_core::entities::EventStatus;
use sigrelay_core::entities::field_mappings::FieldMapping;
use sigrelay_core::entities::workflows::Workflow;
use sigrelay_core::events::attempt_channel;
use sigrelay_core::processors::{
    AttemptReport, EventProcessor, IngestRequest, Ingestor, RetryScheduler,
};
use sigrelay_core::remote::{CrmClient, DocumentFile, DocumentProvider, Notifier, RemoteError};
use sigrelay_core::rules::{Action, WorkflowDefinition};
use sigrelay_core::store::{EventStore, MemoryEventStore, MemoryRuleStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use url::Url;
use uuid::Uuid;

#[derive(Default)]
struct FakeCrm {
    updates: Mutex<Vec<(String, String, Map<String, Value>)>>,
    down: AtomicBool,
}

#[async_trait]
impl CrmClient for FakeCrm {
    async fn update_record(
        &self,
        _tenant: &Tenant,
        module: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Value, RemoteError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        self.updates
            .lock()
            .await
            .push((module.to_string(), record_id.to_string(), fields.clone()));
        Ok(json!({"id": record_id}))
    }

    async fn upload_attachment(
        &self,
        _tenant: &Tenant,
        _module: &str,
        _record_id: &str,
        _file: DocumentFile,
    ) -> Result<Value, RemoteError> {
        Ok(Value::Null)
    }

    async fn create_note(
        &self,
        _tenant: &Tenant,
        _module: &str,
        _record_id: &str,
        _subject: &str,
        _body: &str,
    ) -> Result<Value, RemoteError> {
        Ok(Value::Null)
    }
}

struct NoDocuments;

#[async_trait]
impl DocumentProvider for NoDocuments {
    async fn download(&self, _tenant: &Tenant, document_id: &str) -> Result<DocumentFile, RemoteError> {
        Err(RemoteError::UnexpectedResponse(format!("no document {document_id}")))
    }
}

struct NoNotifier;

#[async_trait]
impl Notifier for NoNotifier {
    async fn notify(&self, _url: &Url, _body: &Value) -> Result<Value, RemoteError> {
        Ok(Value::Null)
    }
}

fn tenant() -> Tenant {
    Tenant {
        id: "t1".to_string(),
        name: "Tenant One".to_string(),
        active: true,
        webhook_secret: None,
        crm: CrmCredentials {
            base_url: Url::parse("https://crm.example.com/rest/v11").unwrap(),
            access_token: "token".to_string(),
        },
        documents: DocumentCredentials {
            base_url: Url::parse("https://docs.example.com/api").unwrap(),
            api_key: "key".to_string(),
        },
        notification_url: None,
    }
}

struct Pipeline {
    ingestor: Ingestor,
    scheduler: RetryScheduler,
    store: Arc<MemoryEventStore>,
    crm: Arc<FakeCrm>,
    rx: Option<sigrelay_core::events::AttemptReceiver>,
}

async fn pipeline(config: ProcessingConfig) -> Pipeline {
    let store = Arc::new(MemoryEventStore::new());
    let rules = Arc::new(MemoryRuleStore::new());
    rules
        .add_workflow(Workflow {
            id: Uuid::new_v4(),
            tenant_id: "t1".to_string(),
            name: "sync on signature".to_string(),
            event_type: "document_signed".to_string(),
            active: true,
            definition: WorkflowDefinition::Flat {
                actions: vec![Action::SyncFields {
                    module: None,
                    tokens: None,
                }],
            },
        })
        .await;
    rules
        .add_mapping(FieldMapping {
            id: Uuid::new_v4(),
            tenant_id: "t1".to_string(),
            source_module: "Opportunities".to_string(),
            source_field: "amount_c".to_string(),
            token: "amount".to_string(),
            active: true,
        })
        .await;

    let tenants = Arc::new(TenantRegistry::new([tenant()]));
    let crm = Arc::new(FakeCrm::default());
    let executor = ActionExecutor::new(crm.clone(), Arc::new(NoDocuments), Arc::new(NoNotifier));
    let processor = Arc::new(EventProcessor::new(tenants.clone(), rules, executor));

    let (tx, rx) = attempt_channel();
    let ingestor = Ingestor::new(store.clone(), tenants, tx.clone(), &config);
    let scheduler = RetryScheduler::new(store.clone(), processor, config, tx);
    Pipeline {
        ingestor,
        scheduler,
        store,
        crm,
        rx: Some(rx),
    }
}

fn signed_event() -> IngestRequest {
    let body = json!({
        "eventId": "e1",
        "eventType": "document_signed",
        "data": {"id": "d1", "fields": [{"merge_field": "amount", "value": "500"}]},
        "metadata": {"tenant_id": "t1", "sugar_record_id": "r1"}
    });
    IngestRequest {
        body: Bytes::from(serde_json::to_vec(&body).unwrap()),
        ..Default::default()
    }
}

#[tokio::test]
async fn signed_document_syncs_mapped_fields() {
    let mut p = pipeline(ProcessingConfig::default()).await;

    let ingested = p.ingestor.ingest(signed_event()).await.unwrap();
    assert!(!ingested.duplicate);
    assert_eq!(ingested.event.status, EventStatus::Pending);

    let request = p.rx.as_mut().unwrap().try_recv().unwrap();
    assert_eq!(request.event, ingested.event.id);
    assert_eq!(request.delay, Duration::ZERO);

    let report = p.scheduler.attempt(request.event).await.unwrap();
    assert_eq!(report, AttemptReport::Succeeded { actions_triggered: 1 });

    let updates = p.crm.updates.lock().await;
    assert_eq!(updates.len(), 1);
    let (module, record, fields) = &updates[0];
    assert_eq!(module, "Opportunities");
    assert_eq!(record, "r1");
    assert_eq!(Value::Object(fields.clone()), json!({"amount_c": "500"}));

    let event = p.store.get(ingested.event.id).await.unwrap().unwrap();
    assert_eq!(event.status, EventStatus::Success);
    assert_eq!(event.actions_triggered, 1);
    assert_eq!(event.retry_count, 0);
    let details = event.response.as_ref().unwrap()["actionsDetails"]
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0]["apiPayload"], json!({"amount_c": "500"}));

    let again = p.ingestor.ingest(signed_event()).await.unwrap();
    assert!(again.duplicate);
    assert_eq!(again.event.id, ingested.event.id);
}

#[tokio::test(start_paused = true)]
async fn failing_crm_exhausts_retries_then_manual_retry_recovers() {
    let mut p = pipeline(ProcessingConfig {
        sweep_interval: Duration::from_secs(3600),
        ..Default::default()
    })
    .await;
    p.crm.down.store(true, Ordering::SeqCst);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let rx = p.rx.take().unwrap();
    let run = tokio::spawn(p.scheduler.clone().run(rx, shutdown_rx));
    // Let the start-up sweep pass over the empty store so only timers drive attempts.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let id = p.ingestor.ingest(signed_event()).await.unwrap().event.id;

    let mut seen_counts = Vec::new();
    for _ in 0..120 {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let event = p.store.get(id).await.unwrap().unwrap();
        if seen_counts.last() != Some(&event.retry_count) {
            seen_counts.push(event.retry_count);
        }
        if event.status == EventStatus::PermanentlyFailed {
            break;
        }
    }

    let event = p.store.get(id).await.unwrap().unwrap();
    assert_eq!(event.status, EventStatus::PermanentlyFailed);
    assert_eq!(event.retry_count, 3);
    assert!(event.next_retry_at.is_none());
    assert!(event.error_message.as_deref().unwrap().contains("502"));
    assert!(seen_counts.windows(2).all(|w| w[1] == w[0] + 1));

    // No further automatic attempts once exhausted.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(p.store.get(id).await.unwrap().unwrap().retry_count, 3);

    p.crm.down.store(false, Ordering::SeqCst);
    let reset = p.scheduler.manual_retry(id).await.unwrap();
    assert_eq!(reset.status, EventStatus::Pending);
    assert_eq!(reset.retry_count, 0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let event = p.store.get(id).await.unwrap().unwrap();
    assert_eq!(event.status, EventStatus::Success);
    assert_eq!(event.actions_triggered, 1);
    assert_eq!(p.crm.updates.lock().await.len(), 1);

    shutdown_tx.send(true).unwrap();
    run.await.unwrap();
}
