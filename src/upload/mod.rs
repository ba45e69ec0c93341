mod barrier;
mod controller;
mod hooks;
mod orchestrator;
mod registrar;
mod submission;
mod transfer;
mod transport;
mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use barrier::{Settlement, SettlementBarrier};
pub use controller::{StateReporter, UploadController};
pub use hooks::{HeaderInjector, HookScope, NoHooks, RequestContext, UploadHooks};
pub use orchestrator::{BatchOrchestrator, SubmitHandler};
pub use registrar::{BlobRecord, DirectUploadTarget, MetadataRegistrar};
pub use submission::{build_submission_body, SubmissionClient};
pub use transfer::DirectTransferClient;
pub use transport::{
    HttpTransport, PendingRequest, ProgressCallback, RawResponse, ReqwestTransport,
    TransferProgress, TransportFuture, DEFAULT_CHUNK_SIZE,
};
pub use types::{BatchState, FileUploadState, SelectedFile, SignedIdSet, UploadPhase};
