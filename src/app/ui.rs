use super::state::{phase_label, FileRow, Outcome};
use super::UploaderApp;
use direct_uploader::upload::UploadPhase;
use direct_uploader::utils::file_size::format_size;
use eframe::egui::{self, Align, Color32, RichText};
use rfd::FileDialog;

const ACCENT: Color32 = Color32::from_rgb(161, 89, 225);
const SUCCESS: Color32 = Color32::from_rgb(0, 180, 0);
const FAILURE: Color32 = Color32::from_rgb(220, 50, 50);
const MUTED: Color32 = Color32::from_rgb(150, 150, 150);

impl UploaderApp {
    pub fn render(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let footer_height = 40.0;
            let content_height = ui.available_height() - footer_height;

            egui::ScrollArea::vertical()
                .max_height(content_height)
                .show(ui, |ui| {
                    ui.add_space(20.0);
                    ui.vertical_centered(|ui| {
                        ui.heading("Direct Uploader");
                        ui.add_space(5.0);
                        ui.label(
                            RichText::new(format!("{}  {}", self.config.host.base_url, self.endpoint_label()))
                                .color(ui.visuals().text_color().gamma_multiply(0.7)),
                        );
                    });

                    ui.add_space(20.0);
                    self.render_picker(ui);
                    ui.add_space(20.0);
                    self.render_actions(ui);
                    ui.add_space(20.0);

                    if !self.state.rows.is_empty() {
                        self.render_progress(ui);
                    }
                    if self.state.outcome.is_some() {
                        ui.add_space(10.0);
                        self.render_outcome(ui);
                    }
                    ui.add_space(20.0);
                });

            ui.with_layout(egui::Layout::bottom_up(Align::Center), |ui| {
                ui.add_space(10.0);
                self.render_footer(ui);
            });
        });
    }

    fn render_picker(&mut self, ui: &mut egui::Ui) {
        ui.label("Note: files listed in .gitignore are skipped when picking a folder");
        ui.add_space(10.0);

        ui.group(|ui| {
            ui.horizontal(|ui| {
                let enabled = !self.state.is_uploading;
                ui.add_enabled_ui(enabled, |ui| {
                    if ui.button("📄 Select Files").clicked() {
                        if let Some(paths) = FileDialog::new().pick_files() {
                            self.pick_files(paths);
                        }
                    }
                    if ui.button("📁 Select Folder").clicked() {
                        if let Some(folder) = FileDialog::new().pick_folder() {
                            self.pick_folder(folder);
                        }
                    }
                });
                ui.label(self.state.selection_summary());
            });

            if let Some(folder) = &self.folder_path {
                ui.label(format!("Folder: {}", folder.display()));
            }
            if let Some(include) = &self.config.include {
                ui.label(RichText::new(format!("Filter: {include}")).color(MUTED));
            }
            if !self.state.selected.is_empty() {
                ui.collapsing("Selected files", |ui| {
                    egui::ScrollArea::vertical()
                        .id_source("selected_files")
                        .max_height(120.0)
                        .show(ui, |ui| {
                            for entry in &self.state.selected {
                                ui.label(format!("{} ({})", entry.name(), format_size(entry.size)));
                            }
                        });
                });
            }
        });
    }

    fn render_actions(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            let can_upload = self.orchestrator.is_some()
                && !self.state.selected.is_empty()
                && !self.state.is_uploading;

            ui.add_enabled_ui(can_upload, |ui| {
                let button = egui::Button::new("📤 Upload Files").min_size(egui::vec2(200.0, 40.0));
                if ui.add(button).clicked() {
                    self.start_upload();
                }
            });

            if self.state.outcome.is_some() {
                ui.add_space(5.0);
                if ui.button("🗑 Clear All").clicked() {
                    self.reset();
                }
            }
        });
    }

    fn render_progress(&mut self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            let progress_bar = egui::ProgressBar::new(self.state.overall_progress())
                .show_percentage()
                .animate(self.state.is_uploading)
                .fill(ACCENT);
            ui.add(progress_bar);
            ui.label(self.state.status_text());

            ui.add_space(8.0);
            egui::ScrollArea::vertical()
                .id_source("file_rows")
                .max_height(220.0)
                .show(ui, |ui| {
                    for row in &self.state.rows {
                        render_row(ui, row);
                        ui.add_space(4.0);
                    }
                });
        });
    }

    fn render_outcome(&mut self, ui: &mut egui::Ui) {
        let Some(outcome) = self.state.outcome.clone() else {
            return;
        };

        match &outcome {
            Outcome::Submitted(response) => {
                ui.colored_label(SUCCESS, "✅ Submitted");
                let pretty = serde_json::to_string_pretty(response).unwrap_or_default();
                egui::ScrollArea::vertical()
                    .id_source("response")
                    .max_height(160.0)
                    .show(ui, |ui| {
                        ui.monospace(pretty);
                    });
            }
            Outcome::Failed { status, body, .. } => {
                let title = match status {
                    Some(status) => format!("❌ Failed (HTTP {status})"),
                    None => "❌ Failed".to_string(),
                };
                ui.colored_label(FAILURE, title);

                if let Some(body) = body {
                    let label = if self.state.show_details {
                        "Hide Response"
                    } else {
                        "Show Response"
                    };
                    if ui.button(label).clicked() {
                        self.state.show_details = !self.state.show_details;
                    }
                    if self.state.show_details {
                        egui::ScrollArea::vertical()
                            .id_source("error_body")
                            .max_height(160.0)
                            .show(ui, |ui| {
                                egui::Frame::none()
                                    .fill(ui.style().visuals.extreme_bg_color)
                                    .show(ui, |ui| {
                                        ui.monospace(body.as_str());
                                    });
                            });
                    }
                }
            }
        }
    }

    fn render_footer(&self, ui: &mut egui::Ui) {
        if let Some(error) = &self.state.error_message {
            ui.vertical_centered(|ui| {
                ui.colored_label(FAILURE, error);
            });
        }
    }
}

fn render_row(ui: &mut egui::Ui, row: &FileRow) {
    ui.horizontal(|ui| {
        let color = match row.phase {
            UploadPhase::Completed => SUCCESS,
            UploadPhase::Failed => FAILURE,
            _ => MUTED,
        };
        ui.colored_label(color, phase_label(row.phase));
        ui.label(format!("{} ({})", row.name, format_size(row.size)));
    });

    match (&row.error, row.progress) {
        (Some(error), _) => {
            ui.colored_label(FAILURE, error);
        }
        (None, Some(_)) => {
            ui.add(egui::ProgressBar::new(row.fraction()).show_percentage().fill(ACCENT));
        }
        (None, None) => {}
    }
}
