use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use tracing::debug;

use super::hooks::{RequestContext, UploadHooks};
use super::registrar::DirectUploadTarget;
use super::transport::{HttpTransport, PendingRequest, ProgressCallback, TransferProgress};
use super::types::SelectedFile;
use crate::config::HostConfig;
use crate::error::{FailureCause, TransportError, UploadError};

/// Highest percentage reported while bytes are still in flight.
const IN_FLIGHT_CEILING: u8 = 99;

/// Turns raw byte counts into non-decreasing percentages.
///
/// 100 is only ever emitted by [`ProgressGauge::complete`]; once completed or
/// closed, late transport callbacks are dropped.
struct ProgressGauge<F> {
    emit: F,
    last: AtomicU8,
    closed: AtomicBool,
}

impl<F: Fn(u8)> ProgressGauge<F> {
    fn new(emit: F) -> Self {
        Self {
            emit,
            last: AtomicU8::new(0),
            closed: AtomicBool::new(false),
        }
    }

    fn observe(&self, progress: TransferProgress) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let percent = progress.percent().min(IN_FLIGHT_CEILING);
        let previous = self.last.fetch_max(percent, Ordering::AcqRel);
        if percent > previous {
            (self.emit)(percent);
        }
    }

    fn complete(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.last.store(100, Ordering::Release);
            (self.emit)(100);
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Sends file bytes straight to the storage service.
#[derive(Clone)]
pub struct DirectTransferClient {
    transport: Arc<dyn HttpTransport>,
    host: Arc<HostConfig>,
}

impl DirectTransferClient {
    pub fn new(transport: Arc<dyn HttpTransport>, host: Arc<HostConfig>) -> Self {
        Self { transport, host }
    }

    /// Uploads `file` to `target`, reporting whole percentages to
    /// `on_progress`.
    pub async fn transfer<F>(
        &self,
        id: &str,
        file: &SelectedFile,
        target: &DirectUploadTarget,
        hooks: &dyn UploadHooks,
        on_progress: F,
    ) -> Result<(), UploadError>
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let fail = UploadError::Transfer;

        let mut request = self.build_request(target).map_err(|e| fail(e.into()))?;
        request.body = file.data.clone();
        hooks.before_storage_request(RequestContext {
            id,
            file,
            request: &mut request,
        });

        let gauge = Arc::new(ProgressGauge::new(on_progress));
        let callback: ProgressCallback = {
            let gauge = Arc::clone(&gauge);
            Arc::new(move |progress: TransferProgress| gauge.observe(progress))
        };

        debug!(id, url = %request.url, bytes = file.byte_size(), "transferring");
        match self.transport.execute(request, Some(callback)).await {
            Ok(response) if response.is_success() => {
                gauge.complete();
                debug!(id, status = response.status().as_u16(), "transfer finished");
                Ok(())
            }
            Ok(response) => {
                gauge.close();
                Err(fail(FailureCause::Rejected(response)))
            }
            Err(e) => {
                gauge.close();
                Err(fail(e.into()))
            }
        }
    }

    fn build_request(&self, target: &DirectUploadTarget) -> Result<PendingRequest, TransportError> {
        let method = Method::from_bytes(target.method.to_uppercase().as_bytes())
            .map_err(|_| TransportError::InvalidRequest(format!("bad method {}", target.method)))?;
        let url = self.host.resolve(&target.url)?;

        let mut request = PendingRequest::new(method, url);
        for (name, value) in &target.headers {
            let name = HeaderName::from_str(name)
                .map_err(|e| TransportError::InvalidRequest(format!("bad header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidRequest(format!("bad header value: {e}")))?;
            request.headers.insert(name, value);
        }
        Ok(request)
    }
}
