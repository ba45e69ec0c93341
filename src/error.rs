//! Error types for the upload engine.

use std::fmt;

use crate::upload::RawResponse;

/// The HTTP exchange itself could not happen.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("network failure: {0}")]
    Network(String),
}

/// Why one protocol step failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FailureCause {
    #[error("server responded with {}", .0.status())]
    Rejected(RawResponse),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// A failure in one of the three network steps of an upload.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UploadError {
    /// The backend refused or could not create the signed blob record.
    #[error("metadata registration failed: {0}")]
    MetadataRegistration(FailureCause),

    /// The storage service refused or failed the direct transfer.
    #[error("direct transfer failed: {0}")]
    Transfer(FailureCause),

    /// The application endpoint rejected the signed-id payload.
    #[error("submission failed: {0}")]
    Submission(FailureCause),
}

impl UploadError {
    pub fn cause(&self) -> &FailureCause {
        match self {
            Self::MetadataRegistration(cause) | Self::Transfer(cause) | Self::Submission(cause) => {
                cause
            }
        }
    }

    /// The raw response behind this error, if the server answered at all.
    pub fn response(&self) -> Option<&RawResponse> {
        match self.cause() {
            FailureCause::Rejected(response) => Some(response),
            _ => None,
        }
    }
}

/// One failed file of a batch.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub id: String,
    pub filename: String,
    pub error: UploadError,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.filename, self.error)
    }
}

/// Overall failure of a batch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BatchError {
    /// At least one file failed; submission was skipped.
    #[error("{} of {total} uploads failed (first: {})", .failures.len(), first_failure(.failures))]
    UploadsFailed {
        total: usize,
        failures: Vec<FileFailure>,
    },

    #[error(transparent)]
    Submission(UploadError),

    #[error("batch interrupted after {settled} of {total} uploads settled")]
    Interrupted { settled: usize, total: usize },
}

fn first_failure(failures: &[FileFailure]) -> String {
    failures
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

impl BatchError {
    /// The first raw failing response, in input order.
    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            Self::UploadsFailed { failures, .. } => {
                failures.iter().find_map(|failure| failure.error.response())
            }
            Self::Submission(error) => error.response(),
            Self::Interrupted { .. } => None,
        }
    }

    pub fn failures(&self) -> &[FileFailure] {
        match self {
            Self::UploadsFailed { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// Configuration could not be loaded or turned into an engine.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] TransportError),
}
