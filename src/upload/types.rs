use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use derivative::Derivative;
use serde::Serialize;

use crate::error::UploadError;

/// A file chosen by the caller, held in memory.
#[derive(Derivative, Clone, PartialEq, Eq)]
#[derivative(Debug)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    #[derivative(Debug = "ignore")]
    pub data: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Reads a file from disk, guessing its content type from the extension.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid filename"))?
            .to_string();
        let data = fs::read(path)?;
        Ok(Self::new(name, content_type_for(path), data))
    }

    pub fn byte_size(&self) -> u64 {
        self.data.len() as u64
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "ico" => "image/vnd.microsoft.icon",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "json" => "application/json",
        "xml" => "application/xml",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "csv" => "text/csv",
        "md" => "text/markdown",
        "txt" => "text/plain",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

/// Lifecycle of one file. Declaration order is the order of progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum UploadPhase {
    Pending,
    RegisteringMetadata,
    Transferring,
    Completed,
    Failed,
}

impl UploadPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Live state of one file in a batch.
///
/// Only the transition methods change a state, which keeps `signed_id` set
/// exactly when the phase is `Completed` and `error` exactly when it is
/// `Failed`.
#[derive(Debug, Clone)]
pub struct FileUploadState {
    id: String,
    file: Arc<SelectedFile>,
    progress: Option<u8>,
    phase: UploadPhase,
    error: Option<UploadError>,
    signed_id: Option<String>,
}

impl FileUploadState {
    pub fn pending(id: impl Into<String>, file: Arc<SelectedFile>) -> Self {
        Self {
            id: id.into(),
            file,
            progress: None,
            phase: UploadPhase::Pending,
            error: None,
            signed_id: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file(&self) -> &SelectedFile {
        &self.file
    }

    /// `None` until the transfer starts.
    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase
    }

    pub fn error(&self) -> Option<&UploadError> {
        self.error.as_ref()
    }

    pub fn signed_id(&self) -> Option<&str> {
        self.signed_id.as_deref()
    }

    pub(crate) fn registering(mut self) -> Self {
        self.phase = UploadPhase::RegisteringMetadata;
        self
    }

    pub(crate) fn transferring(mut self) -> Self {
        self.phase = UploadPhase::Transferring;
        self.progress = Some(0);
        self
    }

    pub(crate) fn with_progress(&self, percent: u8) -> Self {
        let mut next = self.clone();
        next.progress = Some(percent.min(100));
        next
    }

    pub(crate) fn completed(mut self, signed_id: String) -> Self {
        self.phase = UploadPhase::Completed;
        self.progress = Some(100);
        self.signed_id = Some(signed_id);
        self.error = None;
        self
    }

    pub(crate) fn failed(mut self, error: UploadError) -> Self {
        self.phase = UploadPhase::Failed;
        self.error = Some(error);
        self.signed_id = None;
        self
    }
}

/// Per-file states of the active batch, plus the batch-wide `uploading` flag.
#[derive(Debug, Clone, Default)]
pub struct BatchState {
    uploading: bool,
    order: Vec<String>,
    files: HashMap<String, FileUploadState>,
}

impl BatchState {
    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    pub fn get(&self, id: &str) -> Option<&FileUploadState> {
        self.files.get(id)
    }

    /// States in the order the files were handed in.
    pub fn uploads(&self) -> impl Iterator<Item = &FileUploadState> {
        self.order.iter().filter_map(|id| self.files.get(id))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub(crate) fn begin(&mut self, states: impl IntoIterator<Item = FileUploadState>) {
        self.reset();
        self.uploading = true;
        for state in states {
            self.order.push(state.id.clone());
            self.files.insert(state.id.clone(), state);
        }
    }

    /// Merges a reported state. Returns `false` for unknown ids and for
    /// anything that would move a file backwards.
    pub(crate) fn apply(&mut self, update: FileUploadState) -> bool {
        let Some(current) = self.files.get_mut(&update.id) else {
            return false;
        };

        if current.phase.is_terminal() || update.phase < current.phase {
            return false;
        }
        if update.phase == current.phase && update.progress < current.progress {
            return false;
        }

        *current = update;
        true
    }

    pub(crate) fn reset(&mut self) {
        self.uploading = false;
        self.order.clear();
        self.files.clear();
    }
}

/// Signed ids of a fully successful batch, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignedIdSet(Vec<String>);

impl SignedIdSet {
    pub fn new(ids: Vec<String>) -> Self {
        Self(ids)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for SignedIdSet {
    fn from(ids: Vec<String>) -> Self {
        Self(ids)
    }
}
