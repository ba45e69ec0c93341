mod state;
mod ui;

use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};

use direct_uploader::config::UploaderConfig;
use direct_uploader::error::BatchError;
use direct_uploader::upload::{BatchOrchestrator, BatchState, SelectedFile, SubmitHandler};
use direct_uploader::utils::file_picker::collect_files;
use eframe::{egui, App};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use state::{AppState, FileRow, Outcome};

/// Forwards batch results from the worker thread to the UI thread.
struct ChannelHandler {
    sender: Mutex<std_mpsc::Sender<Outcome>>,
}

impl ChannelHandler {
    fn send(&self, outcome: Outcome) {
        if let Ok(sender) = self.sender.lock() {
            let _ = sender.send(outcome);
        }
    }
}

impl SubmitHandler for ChannelHandler {
    fn on_submit(&self, response: &Value) {
        self.send(Outcome::Submitted(response.clone()));
    }

    fn on_error(&self, error: &BatchError) {
        self.send(Outcome::from_error(error));
    }
}

pub struct UploaderApp {
    config: UploaderConfig,
    orchestrator: Option<Arc<BatchOrchestrator>>,
    view: Option<watch::Receiver<BatchState>>,
    outcome_sender: std_mpsc::Sender<Outcome>,
    outcome_receiver: std_mpsc::Receiver<Outcome>,
    folder_path: Option<PathBuf>,
    state: AppState,
}

impl UploaderApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: UploaderConfig) -> Self {
        let (outcome_sender, outcome_receiver) = std_mpsc::channel();
        let mut state = AppState::default();

        let handler = Arc::new(ChannelHandler {
            sender: Mutex::new(outcome_sender.clone()),
        });
        let orchestrator = match config.build_orchestrator() {
            Ok(orchestrator) => Some(Arc::new(orchestrator.with_handler(handler))),
            Err(e) => {
                warn!(error = %e, "uploader is not usable with this configuration");
                state.error_message = Some(format!("Configuration error: {e}"));
                None
            }
        };
        let view = orchestrator.as_ref().map(|o| o.subscribe());

        Self {
            config,
            orchestrator,
            view,
            outcome_sender,
            outcome_receiver,
            folder_path: None,
            state,
        }
    }

    pub fn endpoint_label(&self) -> String {
        format!(
            "{} {} → {}[{}]",
            self.config.endpoint.method.to_uppercase(),
            self.config.endpoint.path,
            self.config.endpoint.model,
            self.config.endpoint.attribute
        )
    }

    pub fn pick_files(&mut self, paths: Vec<PathBuf>) {
        self.folder_path = None;
        self.state.select(paths);
    }

    pub fn pick_folder(&mut self, folder: PathBuf) {
        match collect_files(&folder, self.config.include.as_deref()) {
            Ok(paths) => {
                info!(folder = %folder.display(), files = paths.len(), "folder selected");
                self.state.select(paths);
                self.folder_path = Some(folder);
            }
            Err(e) => {
                self.state.error_message = Some(format!("Invalid include pattern: {e}"));
            }
        }
    }

    pub fn reset(&mut self) {
        self.folder_path = None;
        self.state.clear();
    }

    pub fn start_upload(&mut self) {
        let Some(orchestrator) = self.orchestrator.clone() else {
            self.state.error_message = Some("The uploader is not configured".to_string());
            return;
        };
        if self.state.selected.is_empty() {
            self.state.error_message = Some("No files selected".to_string());
            return;
        }

        self.state.begin_upload();
        let paths: Vec<PathBuf> = self.state.selected.iter().map(|e| e.path.clone()).collect();
        let sender = self.outcome_sender.clone();
        info!(files = paths.len(), "starting upload");

        std::thread::spawn(move || {
            let files = match read_files(&paths) {
                Ok(files) => files,
                Err(message) => {
                    let _ = sender.send(Outcome::failed(message));
                    return;
                }
            };

            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = sender.send(Outcome::failed(format!("Failed to start runtime: {e}")));
                    return;
                }
            };

            // the handler reports the outcome; `None` means nothing ran
            if runtime.block_on(orchestrator.submit(files)).is_none() {
                let _ = sender.send(Outcome::failed("Another upload is still running"));
            }
        });
    }

    pub fn update_state(&mut self, ctx: &egui::Context) {
        if let Some(view) = &self.view {
            let batch = view.borrow();
            if !batch.is_empty() {
                self.state.rows = batch.uploads().map(FileRow::from).collect();
            }
        }

        while let Ok(outcome) = self.outcome_receiver.try_recv() {
            match &outcome {
                Outcome::Submitted(_) => info!("upload submitted"),
                Outcome::Failed { message, .. } => warn!(error = %message, "upload failed"),
            }
            self.state.finish(outcome);
        }

        if self.state.is_uploading {
            ctx.request_repaint();
        }
    }
}

fn read_files(paths: &[PathBuf]) -> Result<Vec<SelectedFile>, String> {
    paths
        .iter()
        .map(|path| read_file(path))
        .collect()
}

fn read_file(path: &Path) -> Result<SelectedFile, String> {
    SelectedFile::from_path(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))
}

impl App for UploaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_state(ctx);
        self.render(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_files_reports_the_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.txt");
        std::fs::write(&present, "hi").unwrap();

        let files = read_files(&[present.clone()]).unwrap();
        assert_eq!(files[0].name, "present.txt");
        assert_eq!(files[0].content_type, "text/plain");

        let err = read_files(&[present, dir.path().join("gone.txt")]).unwrap_err();
        assert!(err.contains("gone.txt"), "{err}");
    }

    #[test]
    fn handler_forwards_outcomes() {
        let (sender, receiver) = std_mpsc::channel();
        let handler = ChannelHandler {
            sender: Mutex::new(sender),
        };

        handler.on_submit(&serde_json::json!({"id": 1}));
        handler.on_error(&BatchError::Interrupted { settled: 0, total: 1 });

        assert_eq!(
            receiver.try_recv().unwrap(),
            Outcome::Submitted(serde_json::json!({"id": 1}))
        );
        assert!(matches!(receiver.try_recv().unwrap(), Outcome::Failed { .. }));
    }
}
