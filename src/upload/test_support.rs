//! Scripted transport for engine tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use super::transport::{
    HttpTransport, PendingRequest, ProgressCallback, RawResponse, TransferProgress,
    TransportFuture,
};
use crate::error::TransportError;

type Responder = Box<dyn Fn(&PendingRequest) -> Result<RawResponse, TransportError> + Send + Sync>;
type Delay = Box<dyn Fn(&PendingRequest) -> Duration + Send + Sync>;

/// Records every request and answers from a responder closure.
///
/// Progress is reported at half and full body length before the reply.
pub(crate) struct MockTransport {
    requests: Mutex<Vec<PendingRequest>>,
    responder: Responder,
    delay: Delay,
    gate: Option<Arc<Semaphore>>,
}

impl MockTransport {
    pub(crate) fn new<R>(responder: R) -> Self
    where
        R: Fn(&PendingRequest) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
            delay: Box::new(|_| Duration::ZERO),
            gate: None,
        }
    }

    /// Sleeps (on tokio's clock) before answering each request.
    pub(crate) fn with_delay<D>(mut self, delay: D) -> Self
    where
        D: Fn(&PendingRequest) -> Duration + Send + Sync + 'static,
    {
        self.delay = Box::new(delay);
        self
    }

    /// Holds every request until the semaphore hands out a permit.
    pub(crate) fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn requests(&self) -> Vec<PendingRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn requests_to(&self, path_prefix: &str) -> Vec<PendingRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.path().starts_with(path_prefix))
            .collect()
    }
}

impl HttpTransport for MockTransport {
    fn execute(
        &self,
        request: PendingRequest,
        on_progress: Option<ProgressCallback>,
    ) -> TransportFuture<'_> {
        self.requests.lock().unwrap().push(request.clone());

        Box::pin(async move {
            if let Some(gate) = &self.gate {
                let _permit = gate
                    .acquire()
                    .await
                    .map_err(|_| TransportError::Network("gate closed".into()))?;
            }

            let delay = (self.delay)(&request);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            if let Some(callback) = on_progress {
                let total = request.body.len() as u64;
                if total > 0 {
                    callback(TransferProgress {
                        sent: total / 2,
                        total,
                    });
                    callback(TransferProgress { sent: total, total });
                }
            }

            (self.responder)(&request)
        })
    }
}

pub(crate) fn json_response(status: u16, body: Value) -> RawResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    RawResponse::new(
        StatusCode::from_u16(status).unwrap(),
        headers,
        Bytes::from(body.to_string()),
    )
}

pub(crate) fn empty_response(status: u16) -> RawResponse {
    RawResponse::new(StatusCode::from_u16(status).unwrap(), HeaderMap::new(), Bytes::new())
}

pub(crate) fn blob_record_json(signed_id: &str, url: &str) -> Value {
    json!({
        "id": 1,
        "key": format!("key-{signed_id}"),
        "signed_id": signed_id,
        "direct_upload": {
            "url": url,
            "headers": {"Content-Type": "text/plain"}
        }
    })
}

/// Filename out of a blob registration body.
pub(crate) fn registered_filename(request: &PendingRequest) -> String {
    serde_json::from_slice::<Value>(&request.body)
        .ok()
        .and_then(|body| body["blob"]["filename"].as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Backend + storage + application endpoint in one responder.
///
/// Blob registration answers `sid-<filename>` and points storage at
/// `https://storage.test/<filename>`; filenames listed in `reject_blob` get a
/// 422 and those in `reject_storage` a 500 from storage. Anything else is the
/// submission endpoint and answers `submit_reply`.
pub(crate) fn rails_like(
    reject_blob: &'static [&'static str],
    reject_storage: &'static [&'static str],
    submit_reply: (u16, Value),
) -> impl Fn(&PendingRequest) -> Result<RawResponse, TransportError> + Send + Sync + 'static {
    move |request: &PendingRequest| {
        if request.url.path() == crate::config::DEFAULT_DIRECT_UPLOADS_PATH {
            let filename = registered_filename(request);
            if reject_blob.contains(&filename.as_str()) {
                return Ok(json_response(422, json!({"error": "unprocessable"})));
            }
            let url = format!("https://storage.test/{filename}");
            return Ok(json_response(200, blob_record_json(&format!("sid-{filename}"), &url)));
        }

        if request.url.host_str() == Some("storage.test") {
            let filename = request.url.path().trim_start_matches('/');
            if reject_storage.contains(&filename) {
                return Ok(empty_response(500));
            }
            return Ok(empty_response(200));
        }

        Ok(json_response(submit_reply.0, submit_reply.1.clone()))
    }
}
