use std::path::{Path, PathBuf};

use direct_uploader::error::BatchError;
use direct_uploader::upload::{FileUploadState, UploadPhase};
use direct_uploader::utils::file_size::format_size;
use serde_json::Value;

/// A file picked in the dialog, not read yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedEntry {
    pub path: PathBuf,
    pub size: u64,
}

impl SelectedEntry {
    pub fn from_path(path: PathBuf) -> Self {
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Self { path, size }
    }

    pub fn name(&self) -> String {
        display_name(&self.path)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// What the last batch ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Submitted(Value),
    Failed {
        message: String,
        status: Option<u16>,
        body: Option<String>,
        /// `(id, error)` for every file that failed.
        failures: Vec<(String, String)>,
        /// Every upload finished, so files not in `failures` completed.
        settled: bool,
    },
}

impl Outcome {
    pub fn from_error(error: &BatchError) -> Self {
        let response = error.response();
        Self::Failed {
            message: error.to_string(),
            status: response.map(|r| r.status().as_u16()),
            body: response.map(|r| r.text().into_owned()),
            failures: error
                .failures()
                .iter()
                .map(|f| (f.id.clone(), f.error.to_string()))
                .collect(),
            settled: !matches!(error, BatchError::Interrupted { .. }),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            status: None,
            body: None,
            failures: Vec::new(),
            settled: false,
        }
    }
}

/// One line of the progress list, detached from the engine's batch state so
/// it survives the reset at the end of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRow {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub phase: UploadPhase,
    pub progress: Option<u8>,
    pub error: Option<String>,
}

impl From<&FileUploadState> for FileRow {
    fn from(state: &FileUploadState) -> Self {
        Self {
            id: state.id().to_string(),
            name: state.file().name.clone(),
            size: state.file().byte_size(),
            phase: state.phase(),
            progress: state.progress(),
            error: state.error().map(ToString::to_string),
        }
    }
}

impl FileRow {
    fn complete(&mut self) {
        self.phase = UploadPhase::Completed;
        self.progress = Some(100);
        self.error = None;
    }

    fn fail(&mut self, error: String) {
        self.phase = UploadPhase::Failed;
        self.error = Some(error);
    }

    pub fn fraction(&self) -> f32 {
        f32::from(self.progress.unwrap_or(0)) / 100.0
    }
}

pub fn phase_label(phase: UploadPhase) -> &'static str {
    match phase {
        UploadPhase::Pending => "⏳ Waiting",
        UploadPhase::RegisteringMetadata => "📝 Registering",
        UploadPhase::Transferring => "📤 Uploading",
        UploadPhase::Completed => "✅ Done",
        UploadPhase::Failed => "❌ Failed",
    }
}

#[derive(Debug, Default)]
pub struct AppState {
    pub selected: Vec<SelectedEntry>,
    pub rows: Vec<FileRow>,
    pub outcome: Option<Outcome>,
    pub error_message: Option<String>,
    pub show_details: bool,
    pub is_uploading: bool,
}

impl AppState {
    pub fn clear(&mut self) {
        *self = AppState::default();
    }

    pub fn select(&mut self, paths: Vec<PathBuf>) {
        self.selected = paths.into_iter().map(SelectedEntry::from_path).collect();
        self.rows.clear();
        self.outcome = None;
        self.error_message = None;
    }

    pub fn begin_upload(&mut self) {
        self.is_uploading = true;
        self.rows.clear();
        self.outcome = None;
        self.error_message = None;
    }

    /// Records the outcome and settles the rows the last repaint may have
    /// missed: the engine resets its state right after reporting.
    pub fn finish(&mut self, outcome: Outcome) {
        self.is_uploading = false;
        match &outcome {
            Outcome::Submitted(_) => self.rows.iter_mut().for_each(FileRow::complete),
            Outcome::Failed {
                message,
                failures,
                settled,
                ..
            } => {
                self.error_message = Some(message.clone());
                for row in &mut self.rows {
                    match failures.iter().find(|(id, _)| *id == row.id) {
                        Some((_, error)) => row.fail(error.clone()),
                        None if *settled => row.complete(),
                        None => {}
                    }
                }
            }
        }
        self.outcome = Some(outcome);
    }

    pub fn selection_summary(&self) -> String {
        let total: u64 = self.selected.iter().map(|e| e.size).sum();
        match self.selected.len() {
            0 => "No files selected".to_string(),
            1 => format!("1 file ({})", format_size(total)),
            n => format!("{n} files ({})", format_size(total)),
        }
    }

    pub fn overall_progress(&self) -> f32 {
        if self.rows.is_empty() {
            return 0.0;
        }
        self.rows.iter().map(FileRow::fraction).sum::<f32>() / self.rows.len() as f32
    }

    pub fn status_text(&self) -> String {
        let done = self
            .rows
            .iter()
            .filter(|r| r.phase == UploadPhase::Completed)
            .count();
        let failed = self
            .rows
            .iter()
            .filter(|r| r.phase == UploadPhase::Failed)
            .count();
        format!(
            "Progress: {}/{} files | ✅ Done: {} | ❌ Failed: {}",
            done + failed,
            self.rows.len(),
            done,
            failed
        )
    }
}
