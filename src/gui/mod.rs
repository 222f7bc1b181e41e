//! GUI module for the application.
//!
//! A thin egui/eframe dashboard over `MonitorService`: start/stop, the
//! activity console, notes, history and settings with a region preview.

pub mod render;
pub mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui::{self, Vec2};

use crate::capture::MonitorInfo;
use crate::monitor::config::save_config;
use crate::monitor::registry::PlayerRecord;
use crate::monitor::MonitorService;

use state::{GuiState, SettingsDraft, Tab};

/// Main GUI application struct.
pub struct GuiApp {
    service: Arc<MonitorService>,
    config_path: PathBuf,
    state: GuiState,
    /// History as of the last refresh.
    history: Vec<PlayerRecord>,
    /// Monitors attached when the app started.
    monitors: Vec<MonitorInfo>,
    /// Last captured region preview.
    preview: Option<egui::TextureHandle>,
}

impl GuiApp {
    pub fn new(service: Arc<MonitorService>, config_path: PathBuf) -> Self {
        let mut state = GuiState::new(&service.config());
        let history = service.history_snapshot();
        state.reset_note_drafts(&history);
        let monitors = service.monitors();
        crate::log(&format!("GUI: {} monitors detected", monitors.len()));
        Self {
            service,
            config_path,
            state,
            history,
            monitors,
            preview: None,
        }
    }

    fn refresh_history(&mut self) {
        self.history = self.service.history_snapshot();
        self.state.reset_note_drafts(&self.history);
    }

    fn handle_start(&mut self) {
        if !self.service.start() {
            crate::log("GUI: Start ignored, monitor already running");
        }
    }

    fn handle_save_note(&mut self) {
        match self
            .service
            .add_or_update_note(&self.state.note_name, &self.state.note_text)
        {
            Ok(message) => {
                self.state.feedback = Some(message);
                self.state.note_name.clear();
                self.state.note_text.clear();
                self.refresh_history();
            }
            Err(e) => {
                self.state.feedback = Some(e.to_string());
            }
        }
    }

    fn handle_history_note(&mut self, name: &str, note: &str) {
        match self.service.add_or_update_note(name, note) {
            Ok(message) => self.state.feedback = Some(message),
            Err(e) => self.state.feedback = Some(e.to_string()),
        }
        self.refresh_history();
    }

    fn handle_clear_history(&mut self) {
        self.service.clear_history();
        self.history.clear();
        self.state.note_drafts.clear();
    }

    /// Captures the monitor with the unsaved draft applied and uploads the
    /// outlined frame as a texture.
    fn handle_preview(&mut self, ctx: &egui::Context) {
        let mut config = self.service.config();
        self.state.settings.apply_to(&mut config);

        match self.service.preview_regions(&config) {
            Ok(img) => {
                let size = [img.width() as usize, img.height() as usize];
                let pixels = img.into_raw();
                let color_image = egui::ColorImage::from_rgba_unmultiplied(size, &pixels);
                self.preview = Some(ctx.load_texture(
                    "region_preview",
                    color_image,
                    egui::TextureOptions::LINEAR,
                ));
                self.state.feedback = Some("Preview captured.".to_string());
            }
            Err(e) => {
                self.preview = None;
                self.state.feedback = Some(format!("Could not capture preview: {:#}", e));
                crate::log(&format!("GUI: Preview failed: {:#}", e));
            }
        }
    }

    fn handle_save_settings(&mut self) {
        let mut config = self.service.config();
        self.state.settings.apply_to(&mut config);

        match save_config(&self.config_path, &config) {
            Ok(()) => {
                self.state.feedback = Some("Settings saved.".to_string());
                crate::log(&format!("GUI: Saved settings to {}", self.config_path.display()));
            }
            Err(e) => {
                self.state.feedback = Some(format!("Could not save settings: {}", e));
                crate::log(&format!("GUI: Failed to save settings: {:#}", e));
            }
        }
        self.service.update_config(config);
    }
}

impl eframe::App for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // The log and pending count change in the background
        ctx.request_repaint_after(Duration::from_millis(500));

        let is_running = self.service.is_running();
        let pending = self.service.pending_lookups();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Raider Watch");
            ui.add_space(8.0);

            let (start_clicked, stop_clicked) = render::render_controls(ui, is_running, pending);
            if start_clicked {
                self.handle_start();
            }
            if stop_clicked {
                self.service.stop();
            }

            ui.add_space(8.0);
            render::render_tabs(ui, &mut self.state);

            match self.state.tab {
                Tab::Activity => {
                    render::render_log(ui, &self.service.recent_log());
                    if render::render_note_form(ui, &mut self.state) {
                        self.handle_save_note();
                    }
                }
                Tab::History => {
                    if let Some(feedback) = &self.state.feedback {
                        ui.label(feedback);
                    }
                    let (refresh_clicked, clear_clicked, committed) =
                        render::render_history(ui, &self.history, &mut self.state.note_drafts);
                    if let Some((name, note)) = committed {
                        self.handle_history_note(&name, &note);
                    }
                    if refresh_clicked {
                        self.refresh_history();
                    }
                    if clear_clicked {
                        self.handle_clear_history();
                    }
                }
                Tab::Settings => {
                    egui::ScrollArea::vertical()
                        .id_salt("settings")
                        .auto_shrink([false, true])
                        .show(ui, |ui| {
                            let (save_clicked, reset_clicked, preview_clicked) = render::render_settings(
                                ui,
                                &mut self.state.settings,
                                &self.monitors,
                                is_running,
                            );
                            if save_clicked {
                                self.handle_save_settings();
                            }
                            if reset_clicked {
                                self.state.settings = SettingsDraft::from_config(&self.service.config());
                            }
                            if preview_clicked {
                                self.handle_preview(ctx);
                            }
                            if let Some(feedback) = &self.state.feedback {
                                ui.label(feedback);
                            }
                            if let Some(texture) = &self.preview {
                                render::render_preview(ui, texture);
                            }
                        });
                }
            }
        });
    }
}

/// Run the GUI application.
/// This function blocks until the window is closed.
pub fn run_gui(service: Arc<MonitorService>, config_path: PathBuf) -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(Vec2::new(720.0, 560.0))
            .with_min_inner_size(Vec2::new(480.0, 400.0))
            .with_title("Raider Watch"),
        ..Default::default()
    };

    crate::log("GUI: Calling eframe::run_native...");

    eframe::run_native(
        "Raider Watch",
        options,
        Box::new(move |_cc| Ok(Box::new(GuiApp::new(service, config_path)))),
    )
}
