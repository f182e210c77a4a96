//! Executes one [`Action`] against the remote systems and reports an
//! [`ActionResult`] for the event's audit trail.
//!
//! Remote failures stop here: `execute` never returns an error, it returns
//! a result with `status: error`.

pub mod fields;
pub mod template;

use crate::config::Tenant;
use crate::entities::events::EventRecord;
use crate::entities::field_mappings::FieldMapping;
use crate::payload;
use crate::remote::{CrmClient, DocumentProvider, Notifier, RemoteError};
use crate::rules::Action;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

/// Module used when neither the action nor the payload names one.
pub const DEFAULT_MODULE: &str = "Opportunities";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Error,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub action_type: String,
    pub status: ActionStatus,
    pub message: String,
    pub api_payload: Option<Value>,
    pub api_response: Option<Value>,
    pub execution_time_ms: u64,
    /// `{event uuid}:{workflow id}:{action index}`.
    pub idempotency_key: String,
    pub workflow_id: Uuid,
    pub attempt: i32,
}

impl ActionResult {
    /// Result for an action that succeeded in an earlier attempt.
    pub fn already_completed(action: &Action, scope: &ActionScope) -> Self {
        Self {
            action_type: action.kind().to_string(),
            status: ActionStatus::Skipped,
            message: "already completed in a previous attempt".to_string(),
            api_payload: None,
            api_response: None,
            execution_time_ms: 0,
            idempotency_key: scope.idempotency_key.clone(),
            workflow_id: scope.workflow_id,
            attempt: scope.attempt,
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(
        "no CRM record id in payload metadata (sugar_record_id, crm_record_id or record_id)"
    )]
    MissingRecordId,
    #[error("no document id in payload (data.id or metadata.document_id)")]
    MissingDocumentId,
    #[error("no notification url on the action or the tenant")]
    MissingNotificationUrl,
    #[error("invalid notification url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("{call} failed: {source}")]
    Remote {
        call: &'static str,
        payload: Option<Value>,
        #[source]
        source: RemoteError,
    },
}

/// Position of one action within an attempt.
#[derive(Debug, Clone)]
pub struct ActionScope {
    pub workflow_id: Uuid,
    pub idempotency_key: String,
    pub attempt: i32,
}

impl ActionScope {
    pub fn new(event: &EventRecord, workflow_id: Uuid, index: usize) -> Self {
        Self {
            workflow_id,
            idempotency_key: format!("{}:{}:{}", event.id, workflow_id, index),
            attempt: event.retry_count + 1,
        }
    }
}

/// What an action acts on.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub event: &'a EventRecord,
    pub tenant: &'a Tenant,
    pub mappings: &'a [FieldMapping],
}

impl ActionContext<'_> {
    fn payload(&self) -> &Value {
        &self.event.payload
    }

    fn module(&self, action: &Action) -> String {
        action
            .module()
            .map(str::to_owned)
            .or_else(|| payload::metadata_module(self.payload()))
            .unwrap_or_else(|| DEFAULT_MODULE.to_string())
    }

    fn record_id(&self) -> Result<String, ActionError> {
        payload::record_id(self.payload()).ok_or(ActionError::MissingRecordId)
    }
}

struct Performed {
    status: ActionStatus,
    message: String,
    api_payload: Option<Value>,
    api_response: Option<Value>,
}

impl Performed {
    fn success(message: String, api_payload: Value, api_response: Option<Value>) -> Self {
        Self {
            status: ActionStatus::Success,
            message,
            api_payload: Some(api_payload),
            api_response,
        }
    }
}

#[derive(Clone)]
pub struct ActionExecutor {
    crm: Arc<dyn CrmClient>,
    documents: Arc<dyn DocumentProvider>,
    notifier: Arc<dyn Notifier>,
}

impl ActionExecutor {
    pub fn new(
        crm: Arc<dyn CrmClient>,
        documents: Arc<dyn DocumentProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            crm,
            documents,
            notifier,
        }
    }

    pub async fn execute(
        &self,
        action: &Action,
        ctx: ActionContext<'_>,
        scope: &ActionScope,
    ) -> ActionResult {
        let started = Instant::now();
        let outcome = self.perform(action, ctx).await;
        let execution_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (status, message, api_payload, api_response) = match outcome {
            Ok(done) => (done.status, done.message, done.api_payload, done.api_response),
            Err(e) => {
                warn!(
                    event_id = %ctx.event.id,
                    action = action.kind(),
                    idempotency_key = %scope.idempotency_key,
                    error = %e,
                    "Action failed"
                );
                let api_payload = match &e {
                    ActionError::Remote { payload, .. } => payload.clone(),
                    _ => None,
                };
                (ActionStatus::Error, e.to_string(), api_payload, None)
            }
        };

        ActionResult {
            action_type: action.kind().to_string(),
            status,
            message,
            api_payload,
            api_response,
            execution_time_ms,
            idempotency_key: scope.idempotency_key.clone(),
            workflow_id: scope.workflow_id,
            attempt: scope.attempt,
        }
    }

    async fn perform(&self, action: &Action, ctx: ActionContext<'_>) -> Result<Performed, ActionError> {
        match action {
            Action::UpdateRecord { field, value, .. } => {
                let module = ctx.module(action);
                let record_id = ctx.record_id()?;
                let rendered = template::render(value, ctx.payload());
                let mut fields = serde_json::Map::new();
                fields.insert(field.clone(), Value::String(rendered));
                self.update(ctx, &module, &record_id, fields).await
            }
            Action::SyncFields { tokens, .. } => {
                self.sync(action, ctx, tokens.as_deref()).await
            }
            Action::SyncAllFields { .. } => self.sync(action, ctx, None).await,
            Action::AttachFile { file_name, .. } => {
                let module = ctx.module(action);
                let document_id =
                    payload::document_id(ctx.payload()).ok_or(ActionError::MissingDocumentId)?;
                let record_id = ctx.record_id()?;
                let api_payload = json!({
                    "module": module,
                    "recordId": record_id,
                    "documentId": document_id,
                });

                let mut file = self
                    .documents
                    .download(ctx.tenant, &document_id)
                    .await
                    .map_err(|source| ActionError::Remote {
                        call: "document download",
                        payload: Some(api_payload.clone()),
                        source,
                    })?;
                if let Some(name) = file_name
                    .as_deref()
                    .map(|t| template::render(t, ctx.payload()))
                    .filter(|n| !n.trim().is_empty())
                    .or_else(|| payload::document_name(ctx.payload()))
                {
                    file.file_name = name;
                }

                let mut api_payload = api_payload;
                api_payload["fileName"] = json!(file.file_name);
                api_payload["size"] = json!(file.bytes.len());
                let file_name = file.file_name.clone();

                let response = self
                    .crm
                    .upload_attachment(ctx.tenant, &module, &record_id, file)
                    .await
                    .map_err(|source| ActionError::Remote {
                        call: "attachment upload",
                        payload: Some(api_payload.clone()),
                        source,
                    })?;
                Ok(Performed::success(
                    format!("attached {file_name} to {module}/{record_id}"),
                    api_payload,
                    Some(response),
                ))
            }
            Action::CreateNote { subject, body, .. } => {
                let module = ctx.module(action);
                let record_id = ctx.record_id()?;
                let subject = template::render(subject, ctx.payload());
                let body = template::render(body, ctx.payload());
                let api_payload = json!({
                    "module": module,
                    "recordId": record_id,
                    "subject": subject,
                    "body": body,
                });
                let response = self
                    .crm
                    .create_note(ctx.tenant, &module, &record_id, &subject, &body)
                    .await
                    .map_err(|source| ActionError::Remote {
                        call: "note creation",
                        payload: Some(api_payload.clone()),
                        source,
                    })?;
                Ok(Performed::success(
                    format!("created note on {module}/{record_id}"),
                    api_payload,
                    Some(response),
                ))
            }
            Action::LogActivity { message } => {
                let message = template::render(message, ctx.payload());
                info!(
                    event_id = %ctx.event.id,
                    tenant_id = %ctx.tenant.id,
                    activity = %message,
                    "Activity"
                );
                Ok(Performed::success(
                    "activity logged".to_string(),
                    json!({ "message": message }),
                    None,
                ))
            }
            Action::SendNotification { message, url } => {
                let url = match url.as_deref() {
                    Some(raw) => Url::parse(raw).map_err(|e| ActionError::InvalidUrl {
                        url: raw.to_string(),
                        reason: e.to_string(),
                    })?,
                    None => ctx
                        .tenant
                        .notification_url
                        .clone()
                        .ok_or(ActionError::MissingNotificationUrl)?,
                };
                let body = json!({
                    "tenantId": ctx.tenant.id,
                    "eventId": ctx.event.event_id,
                    "eventType": ctx.event.event_type,
                    "message": template::render(message, ctx.payload()),
                });
                let response = self
                    .notifier
                    .notify(&url, &body)
                    .await
                    .map_err(|source| ActionError::Remote {
                        call: "notification",
                        payload: Some(body.clone()),
                        source,
                    })?;
                Ok(Performed::success(
                    format!("notified {url}"),
                    body,
                    Some(response),
                ))
            }
        }
    }

    async fn sync(
        &self,
        action: &Action,
        ctx: ActionContext<'_>,
        only: Option<&[String]>,
    ) -> Result<Performed, ActionError> {
        let module = ctx.module(action);
        let update = fields::sync_update(ctx.mappings, &module, ctx.payload(), only);
        if update.is_empty() {
            return Ok(Performed {
                status: ActionStatus::Skipped,
                message: format!("no mapped fields for {module} in payload"),
                api_payload: None,
                api_response: None,
            });
        }
        let record_id = ctx.record_id()?;
        self.update(ctx, &module, &record_id, update).await
    }

    async fn update(
        &self,
        ctx: ActionContext<'_>,
        module: &str,
        record_id: &str,
        fields: serde_json::Map<String, Value>,
    ) -> Result<Performed, ActionError> {
        let count = fields.len();
        let response = self
            .crm
            .update_record(ctx.tenant, module, record_id, &fields)
            .await
            .map_err(|source| ActionError::Remote {
                call: "record update",
                payload: Some(Value::Object(fields.clone())),
                source,
            })?;
        Ok(Performed::success(
            format!("updated {count} field(s) on {module}/{record_id}"),
            Value::Object(fields),
            Some(response),
        ))
    }
}
