//! HTTP seam between the upload engine and the network.
//!
//! Every network step (blob registration, direct transfer, submission) goes
//! through [`HttpTransport`]. Hooks see the [`PendingRequest`] before it is
//! handed over, and every answer comes back as a [`RawResponse`] so failing
//! responses can be surfaced untouched.

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH};
use reqwest::{Body, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::TransportError;

/// Default size of the body slices handed to the transport.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Body bytes accepted by the transport so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub sent: u64,
    pub total: u64,
}

impl TransferProgress {
    /// Whole percentage, 0 for an empty body.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.sent.min(self.total) * 100) / self.total) as u8
    }
}

pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + Send + 'a>>;

/// A request that has been built but not sent yet.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl PendingRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Status, headers and body of a finished exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Executes requests for the upload engine.
///
/// When `on_progress` is given, the implementation reports body bytes as the
/// transport accepts them.
pub trait HttpTransport: Send + Sync {
    fn execute(
        &self,
        request: PendingRequest,
        on_progress: Option<ProgressCallback>,
    ) -> TransportFuture<'_>;
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
///
/// The client keeps a cookie store, which stands in for same-origin
/// credentials: session cookies set by the application host are sent back
/// to it, and only to it.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    chunk_size: usize,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError::InvalidRequest(format!("failed to build client: {e}")))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(
        &self,
        request: PendingRequest,
        on_progress: Option<ProgressCallback>,
    ) -> TransportFuture<'_> {
        Box::pin(async move {
            let PendingRequest {
                method,
                url,
                mut headers,
                body,
            } = request;

            debug!(%method, %url, bytes = body.len(), "sending request");

            let body = match on_progress {
                Some(callback) => {
                    // A streamed body has no implicit length.
                    if !headers.contains_key(CONTENT_LENGTH) {
                        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
                    }
                    Body::wrap_stream(progress_stream(body, self.chunk_size, callback))
                }
                None => Body::from(body),
            };

            let response = self
                .client
                .request(method, url)
                .headers(headers)
                .body(body)
                .send()
                .await
                .map_err(|e| TransportError::Network(format!("failed to send request: {e}")))?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::Network(format!("failed to read response: {e}")))?;

            debug!(status = status.as_u16(), bytes = body.len(), "response received");
            Ok(RawResponse::new(status, headers, body))
        })
    }
}

/// Splits `body` into slices and reports each one as it is pulled.
fn progress_stream(
    body: Bytes,
    chunk_size: usize,
    callback: ProgressCallback,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync + 'static {
    let total = body.len() as u64;
    let chunks: Vec<Bytes> = (0..body.len())
        .step_by(chunk_size.max(1))
        .map(|start| body.slice(start..(start + chunk_size).min(body.len())))
        .collect();

    let mut sent = 0u64;
    futures::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        callback(TransferProgress { sent, total });
        Ok(chunk)
    }))
}
