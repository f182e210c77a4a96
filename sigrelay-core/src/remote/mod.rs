//! Clients for the systems actions touch: the CRM, the document provider
//! and outbound notification endpoints.
//!
//! The traits are the seam; [`http`] holds the reqwest implementations.

pub mod http;

use crate::config::Tenant;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

pub use http::{HttpCrmClient, HttpDocumentClient, HttpNotifier};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("remote returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("cannot build endpoint from {0}")]
    InvalidEndpoint(Url),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// A downloaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Write `fields` onto one record in a single call.
    async fn update_record(
        &self,
        tenant: &Tenant,
        module: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Value, RemoteError>;

    /// Upload `file` as an attachment linked to the record.
    async fn upload_attachment(
        &self,
        tenant: &Tenant,
        module: &str,
        record_id: &str,
        file: DocumentFile,
    ) -> Result<Value, RemoteError>;

    async fn create_note(
        &self,
        tenant: &Tenant,
        module: &str,
        record_id: &str,
        subject: &str,
        body: &str,
    ) -> Result<Value, RemoteError>;
}

#[async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn download(&self, tenant: &Tenant, document_id: &str) -> Result<DocumentFile, RemoteError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, url: &Url, body: &Value) -> Result<Value, RemoteError>;
}

/// `base` with `segments` appended as escaped path segments.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, RemoteError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| RemoteError::InvalidEndpoint(base.clone()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_appends_escaped_segments() {
        let base = Url::parse("https://crm.example.com/rest/v11/").unwrap();
        let url = endpoint(&base, &["Opportunities", "a b/c"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://crm.example.com/rest/v11/Opportunities/a%20b%2Fc"
        );

        let bare = Url::parse("https://crm.example.com").unwrap();
        assert_eq!(
            endpoint(&bare, &["Notes"]).unwrap().as_str(),
            "https://crm.example.com/Notes"
        );
    }

    #[test]
    fn test_endpoint_rejects_opaque_urls() {
        let base = Url::parse("mailto:ops@example.com").unwrap();
        assert!(matches!(
            endpoint(&base, &["x"]),
            Err(RemoteError::InvalidEndpoint(_))
        ));
    }
}
