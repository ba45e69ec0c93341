//! Runs a batch of uploads and reports the signed ids once all of them land.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;
use derivative::Derivative;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::barrier::SettlementBarrier;
use super::controller::{StateReporter, UploadController};
use super::hooks::{NoHooks, UploadHooks};
use super::registrar::MetadataRegistrar;
use super::submission::SubmissionClient;
use super::transfer::DirectTransferClient;
use super::transport::HttpTransport;
use super::types::{BatchState, FileUploadState, SelectedFile, SignedIdSet};
use crate::config::{Endpoint, HostConfig, SubmitOptions};
use crate::error::BatchError;

/// Completion and error callbacks for a batch.
pub trait SubmitHandler: Send + Sync {
    /// Receives the parsed response of a successful submission.
    fn on_submit(&self, response: &Value);

    /// Receives any batch failure. Without an override the failure is
    /// dropped once the batch state has been updated.
    fn on_error(&self, _error: &BatchError) {}
}

/// Resets the batch to idle when `submit` finishes or its future is dropped.
struct IdleGuard<'a> {
    uploading: &'a AtomicBool,
    state: &'a watch::Sender<BatchState>,
}

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(BatchState::reset);
        self.uploading.store(false, Ordering::Release);
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct BatchOrchestrator {
    #[derivative(Debug = "ignore")]
    transport: Arc<dyn HttpTransport>,
    host: Arc<HostConfig>,
    endpoint: Endpoint,
    options: SubmitOptions,
    #[derivative(Debug = "ignore")]
    hooks: Arc<dyn UploadHooks>,
    #[derivative(Debug = "ignore")]
    handler: Option<Arc<dyn SubmitHandler>>,
    uploading: AtomicBool,
    #[derivative(Debug = "ignore")]
    state: watch::Sender<BatchState>,
}

impl BatchOrchestrator {
    pub fn new(transport: Arc<dyn HttpTransport>, host: HostConfig, endpoint: Endpoint) -> Self {
        let (state, _) = watch::channel(BatchState::default());
        Self {
            transport,
            host: Arc::new(host),
            endpoint,
            options: SubmitOptions::default(),
            hooks: Arc::new(NoHooks),
            handler: None,
            uploading: AtomicBool::new(false),
            state,
        }
    }

    pub fn with_options(mut self, options: SubmitOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn UploadHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn SubmitHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Read-only view of the active batch.
    pub fn subscribe(&self) -> watch::Receiver<BatchState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> BatchState {
        self.state.borrow().clone()
    }

    /// `true` when no batch is in flight.
    pub fn is_ready(&self) -> bool {
        !self.uploading.load(Ordering::Acquire)
    }

    /// Uploads every file, then submits their signed ids in input order.
    ///
    /// Returns `None` without doing anything when `files` is empty or another
    /// batch is still running. Otherwise every upload is allowed to settle;
    /// submission happens only if all of them succeeded. The handler is
    /// notified before the state is reset.
    pub async fn submit(&self, files: Vec<SelectedFile>) -> Option<Result<Value, BatchError>> {
        if files.is_empty() {
            return None;
        }
        if self
            .uploading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("batch already in progress, ignoring submit");
            return None;
        }
        let guard = IdleGuard {
            uploading: &self.uploading,
            state: &self.state,
        };

        let stamp = Local::now().format("%Y%m%d%H%M%S%3f").to_string();
        let files: Vec<Arc<SelectedFile>> = files.into_iter().map(Arc::new).collect();
        let pending: Vec<FileUploadState> = files
            .iter()
            .enumerate()
            .map(|(index, file)| {
                FileUploadState::pending(format!("{stamp}-{index}-{}", file.name), Arc::clone(file))
            })
            .collect();
        let labels: Vec<(String, String)> = pending
            .iter()
            .map(|state| (state.id().to_string(), state.file().name.clone()))
            .collect();

        self.state.send_modify(|state| state.begin(pending));
        info!(files = labels.len(), "batch started");

        let result = self.run_batch(&labels, files).await;
        match &result {
            Ok(_) => info!(files = labels.len(), "batch submitted"),
            Err(error) => warn!(files = labels.len(), error = %error, "batch failed"),
        }

        if let Some(handler) = &self.handler {
            match &result {
                Ok(response) => handler.on_submit(response),
                Err(error) => handler.on_error(error),
            }
        }

        drop(guard);
        Some(result)
    }

    async fn run_batch(
        &self,
        labels: &[(String, String)],
        files: Vec<Arc<SelectedFile>>,
    ) -> Result<Value, BatchError> {
        let controller = self.controller();
        let (tx, mut updates) = mpsc::unbounded_channel();

        let mut in_flight: FuturesUnordered<_> = labels
            .iter()
            .zip(files)
            .enumerate()
            .map(|(index, ((id, _), file))| {
                let controller = controller.clone();
                let reporter = StateReporter::new(tx.clone());
                let id = id.clone();
                async move { (index, controller.run(id, file, reporter).await) }
            })
            .collect();
        drop(tx);

        // The barrier ends the loop. A transport may keep a progress callback
        // (and with it a reporter) alive after its upload settled.
        let mut barrier = SettlementBarrier::new(labels.len());
        while !barrier.is_released() {
            tokio::select! {
                biased;
                Some(update) = updates.recv() => {
                    self.state.send_if_modified(|state| state.apply(update));
                }
                Some((index, outcome)) = in_flight.next() => {
                    barrier.settle(index, outcome);
                }
                else => break,
            }
        }
        while let Ok(update) = updates.try_recv() {
            self.state.send_if_modified(|state| state.apply(update));
        }

        let settlements = barrier.release().map_err(|barrier| BatchError::Interrupted {
            settled: barrier.settled(),
            total: labels.len(),
        })?;
        let ids = SignedIdSet::from_settlements(labels, settlements)?;

        SubmissionClient::new(Arc::clone(&self.transport), Arc::clone(&self.host))
            .submit(&self.endpoint, &ids, &self.options)
            .await
            .map_err(BatchError::Submission)
    }

    fn controller(&self) -> UploadController {
        UploadController::new(
            MetadataRegistrar::new(Arc::clone(&self.transport), Arc::clone(&self.host)),
            DirectTransferClient::new(Arc::clone(&self.transport), Arc::clone(&self.host)),
            Arc::clone(&self.hooks),
        )
    }
}
