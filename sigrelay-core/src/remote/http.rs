//! reqwest clients.
//!
//! The CRM client speaks the SugarCRM REST v11 dialect (`OAuth-Token`
//! header, `/{module}/{id}` records, attachments as `Notes` with a file
//! field). The document client fetches `/documents/{id}/download` with a
//! bearer key.

use super::{CrmClient, DocumentFile, DocumentProvider, Notifier, RemoteError, endpoint};
use crate::config::Tenant;
use async_trait::async_trait;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const OAUTH_HEADER: &str = "OAuth-Token";
const DEFAULT_CONTENT_TYPE: &str = "application/pdf";

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Turn a response into JSON, or a [`RemoteError::Status`] for non-2xx.
///
/// An empty or non-JSON success body becomes `null` or a string.
async fn read_json(response: reqwest::Response) -> Result<Value, RemoteError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        });
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
}

#[derive(Debug, Clone)]
pub struct HttpCrmClient {
    client: reqwest::Client,
}

impl HttpCrmClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
        }
    }
}

#[async_trait]
impl CrmClient for HttpCrmClient {
    async fn update_record(
        &self,
        tenant: &Tenant,
        module: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Value, RemoteError> {
        let url = endpoint(&tenant.crm.base_url, &[module, record_id])?;
        debug!(%url, fields = fields.len(), "CRM update");
        let response = self
            .client
            .put(url)
            .header(OAUTH_HEADER, &tenant.crm.access_token)
            .json(fields)
            .send()
            .await?;
        read_json(response).await
    }

    async fn upload_attachment(
        &self,
        tenant: &Tenant,
        module: &str,
        record_id: &str,
        file: DocumentFile,
    ) -> Result<Value, RemoteError> {
        let note = json!({
            "name": file.file_name,
            "filename": file.file_name,
            "file_mime_type": file.content_type,
            "parent_type": module,
            "parent_id": record_id,
        });
        let create_url = endpoint(&tenant.crm.base_url, &["Notes"])?;
        let created = read_json(
            self.client
                .post(create_url)
                .header(OAUTH_HEADER, &tenant.crm.access_token)
                .json(&note)
                .send()
                .await?,
        )
        .await?;
        let note_id = created
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::UnexpectedResponse("note without id".to_string()))?
            .to_owned();

        let upload_url = endpoint(&tenant.crm.base_url, &["Notes", note_id.as_str(), "file", "filename"])?;
        debug!(%upload_url, size = file.bytes.len(), "CRM attachment upload");
        let uploaded = read_json(
            self.client
                .put(upload_url)
                .header(OAUTH_HEADER, &tenant.crm.access_token)
                .header(CONTENT_TYPE, file.content_type)
                .header(
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file.file_name.replace('"', "")),
                )
                .body(file.bytes)
                .send()
                .await?,
        )
        .await?;
        Ok(json!({ "note": created, "file": uploaded }))
    }

    async fn create_note(
        &self,
        tenant: &Tenant,
        module: &str,
        record_id: &str,
        subject: &str,
        body: &str,
    ) -> Result<Value, RemoteError> {
        let url = endpoint(&tenant.crm.base_url, &["Notes"])?;
        let response = self
            .client
            .post(url)
            .header(OAUTH_HEADER, &tenant.crm.access_token)
            .json(&json!({
                "name": subject,
                "description": body,
                "parent_type": module,
                "parent_id": record_id,
            }))
            .send()
            .await?;
        read_json(response).await
    }
}

#[derive(Debug, Clone)]
pub struct HttpDocumentClient {
    client: reqwest::Client,
}

impl HttpDocumentClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
        }
    }
}

#[async_trait]
impl DocumentProvider for HttpDocumentClient {
    async fn download(&self, tenant: &Tenant, document_id: &str) -> Result<DocumentFile, RemoteError> {
        let url = endpoint(&tenant.documents.base_url, &["documents", document_id, "download"])?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&tenant.documents.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_owned();
        let bytes = response.bytes().await?;
        Ok(DocumentFile {
            file_name: format!("{document_id}.pdf"),
            content_type,
            bytes,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, url: &Url, body: &Value) -> Result<Value, RemoteError> {
        let response = self.client.post(url.clone()).json(body).send().await?;
        read_json(response).await
    }
}
