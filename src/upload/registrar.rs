use std::collections::HashMap;
use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::hooks::{RequestContext, UploadHooks};
use super::transport::{HttpTransport, PendingRequest};
use super::types::SelectedFile;
use crate::config::HostConfig;
use crate::error::{FailureCause, UploadError};
use crate::utils::checksum::content_checksum;

#[derive(Serialize)]
struct BlobRequest<'a> {
    blob: BlobAttributes<'a>,
}

#[derive(Serialize)]
struct BlobAttributes<'a> {
    filename: &'a str,
    content_type: &'a str,
    byte_size: u64,
    checksum: String,
}

/// The signed storage record created for one file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlobRecord {
    pub signed_id: String,
    #[serde(default)]
    pub key: Option<String>,
    pub direct_upload: DirectUploadTarget,
}

/// Where and how the file bytes must be sent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectUploadTarget {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_method() -> String {
    "PUT".to_string()
}

/// Creates blob records on the application backend.
#[derive(Clone)]
pub struct MetadataRegistrar {
    transport: Arc<dyn HttpTransport>,
    host: Arc<HostConfig>,
}

impl MetadataRegistrar {
    pub fn new(transport: Arc<dyn HttpTransport>, host: Arc<HostConfig>) -> Self {
        Self { transport, host }
    }

    /// Registers `file` and returns its signed record.
    pub async fn register(
        &self,
        id: &str,
        file: &SelectedFile,
        hooks: &dyn UploadHooks,
    ) -> Result<BlobRecord, UploadError> {
        let fail = UploadError::MetadataRegistration;

        let payload = BlobRequest {
            blob: BlobAttributes {
                filename: &file.name,
                content_type: &file.content_type,
                byte_size: file.byte_size(),
                checksum: content_checksum(&file.data),
            },
        };
        let body =
            serde_json::to_vec(&payload).map_err(|e| fail(FailureCause::Malformed(e.to_string())))?;
        let url = self
            .host
            .direct_uploads_url()
            .map_err(|e| fail(e.into()))?;

        let mut headers = self.host.json_headers();
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );

        let mut request = PendingRequest::new(Method::POST, url)
            .with_headers(headers)
            .with_body(body);
        hooks.before_blob_request(RequestContext {
            id,
            file,
            request: &mut request,
        });

        debug!(id, file = %file.name, bytes = file.byte_size(), "registering blob");
        let response = self
            .transport
            .execute(request, None)
            .await
            .map_err(|e| fail(e.into()))?;

        if !response.is_success() {
            return Err(fail(FailureCause::Rejected(response)));
        }

        let record: BlobRecord = response
            .json()
            .map_err(|e| fail(FailureCause::Malformed(format!("blob record: {e}"))))?;
        if record.signed_id.is_empty() {
            return Err(fail(FailureCause::Malformed("blob record has an empty signed_id".into())));
        }

        debug!(id, signed_id = %record.signed_id, "blob registered");
        Ok(record)
    }
}
