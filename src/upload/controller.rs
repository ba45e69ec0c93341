//! Drives one file through registration and transfer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::hooks::UploadHooks;
use super::registrar::MetadataRegistrar;
use super::transfer::DirectTransferClient;
use super::types::{FileUploadState, SelectedFile};
use crate::error::UploadError;

/// Write-only handle a controller uses to publish its file's state.
#[derive(Debug, Clone)]
pub struct StateReporter {
    tx: mpsc::UnboundedSender<FileUploadState>,
}

impl StateReporter {
    pub fn new(tx: mpsc::UnboundedSender<FileUploadState>) -> Self {
        Self { tx }
    }

    /// Sends an update. A dropped receiver means nobody is watching anymore.
    pub fn report(&self, state: FileUploadState) {
        let _ = self.tx.send(state);
    }
}

#[derive(Clone)]
pub struct UploadController {
    registrar: MetadataRegistrar,
    transfer: DirectTransferClient,
    hooks: Arc<dyn UploadHooks>,
}

impl UploadController {
    pub fn new(
        registrar: MetadataRegistrar,
        transfer: DirectTransferClient,
        hooks: Arc<dyn UploadHooks>,
    ) -> Self {
        Self {
            registrar,
            transfer,
            hooks,
        }
    }

    /// Uploads one file and resolves to its signed id.
    ///
    /// Every phase change is reported through `reporter`; a failure in either
    /// step is final for this file.
    pub async fn run(
        &self,
        id: String,
        file: Arc<SelectedFile>,
        reporter: StateReporter,
    ) -> Result<String, UploadError> {
        let state = FileUploadState::pending(id, file).registering();
        reporter.report(state.clone());

        let record = match self
            .registrar
            .register(state.id(), state.file(), self.hooks.as_ref())
            .await
        {
            Ok(record) => record,
            Err(error) => {
                warn!(id = state.id(), file = %state.file().name, error = %error, "registration failed");
                reporter.report(state.failed(error.clone()));
                return Err(error);
            }
        };

        let state = state.transferring();
        reporter.report(state.clone());

        let on_progress = {
            let reporter = reporter.clone();
            let base = state.clone();
            move |percent: u8| reporter.report(base.with_progress(percent))
        };

        match self
            .transfer
            .transfer(
                state.id(),
                state.file(),
                &record.direct_upload,
                self.hooks.as_ref(),
                on_progress,
            )
            .await
        {
            Ok(()) => {
                debug!(id = state.id(), signed_id = %record.signed_id, "upload completed");
                reporter.report(state.completed(record.signed_id.clone()));
                Ok(record.signed_id)
            }
            Err(error) => {
                warn!(id = state.id(), file = %state.file().name, error = %error, "transfer failed");
                reporter.report(state.failed(error.clone()));
                Err(error)
            }
        }
    }
}
