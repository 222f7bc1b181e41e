//! GUI rendering functions.
//!
//! Each function draws one section and reports what the user clicked; the
//! app acts on it afterwards.

use std::collections::HashMap;

use eframe::egui::{self, Color32, RichText, TextureHandle, Vec2};

use super::state::{changed_note, fit_to_width, monitor_label, status_rgb, GuiState, SettingsDraft, Tab};
use crate::capture::MonitorInfo;
use crate::monitor::config::ScreenRegion;
use crate::monitor::registry::PlayerRecord;

/// Render the start/stop controls and status line.
/// Returns (start_clicked, stop_clicked).
pub fn render_controls(ui: &mut egui::Ui, is_running: bool, pending: usize) -> (bool, bool) {
    let mut start_clicked = false;
    let mut stop_clicked = false;

    ui.horizontal(|ui| {
        ui.add_enabled_ui(!is_running, |ui| {
            if ui.button(RichText::new("▶ Start").size(16.0)).clicked() {
                start_clicked = true;
            }
        });

        ui.add_space(12.0);

        ui.add_enabled_ui(is_running, |ui| {
            if ui.button(RichText::new("◼ Stop").size(16.0)).clicked() {
                stop_clicked = true;
            }
        });

        ui.add_space(20.0);

        let (text, color) = if is_running {
            ("Monitoring", Color32::from_rgb(80, 180, 90))
        } else {
            ("Stopped", Color32::from_gray(140))
        };
        ui.label(RichText::new(text).color(color).strong());
        if pending > 0 {
            ui.label(format!("({} lookups pending)", pending));
        }
    });

    (start_clicked, stop_clicked)
}

pub fn render_tabs(ui: &mut egui::Ui, state: &mut GuiState) {
    ui.horizontal(|ui| {
        ui.selectable_value(&mut state.tab, Tab::Activity, "Activity");
        ui.selectable_value(&mut state.tab, Tab::History, "History");
        ui.selectable_value(&mut state.tab, Tab::Settings, "Settings");
    });
    ui.separator();
}

/// Render the activity console, newest first.
pub fn render_log(ui: &mut egui::Ui, entries: &[String]) {
    egui::ScrollArea::vertical()
        .id_salt("activity_log")
        .max_height(260.0)
        .auto_shrink([false, true])
        .show(ui, |ui| {
            if entries.is_empty() {
                ui.label(RichText::new("No activity yet.").italics());
            }
            for entry in entries {
                ui.label(RichText::new(entry).monospace());
            }
        });
}

/// Render the note form. Returns true when "Save Note" was clicked.
pub fn render_note_form(ui: &mut egui::Ui, state: &mut GuiState) -> bool {
    let mut save_clicked = false;

    ui.add_space(8.0);
    ui.label(RichText::new("Player note").strong());
    egui::Grid::new("note_form").num_columns(2).show(ui, |ui| {
        ui.label("Name:");
        ui.text_edit_singleline(&mut state.note_name);
        ui.end_row();

        ui.label("Note:");
        ui.text_edit_singleline(&mut state.note_text);
        ui.end_row();
    });

    ui.horizontal(|ui| {
        if ui.button("Save Note").clicked() {
            save_clicked = true;
        }
        if let Some(feedback) = &state.feedback {
            ui.label(feedback);
        }
    });

    save_clicked
}

/// Render the player history table. Notes are edited in place and
/// committed when their field loses focus.
/// Returns (refresh_clicked, clear_clicked, committed (name, note)).
pub fn render_history(
    ui: &mut egui::Ui,
    records: &[PlayerRecord],
    note_drafts: &mut HashMap<String, String>,
) -> (bool, bool, Option<(String, String)>) {
    let mut refresh_clicked = false;
    let mut clear_clicked = false;
    let mut committed = None;

    ui.horizontal(|ui| {
        if ui.button("Refresh").clicked() {
            refresh_clicked = true;
        }
        if ui.button("Clear History").clicked() {
            clear_clicked = true;
        }
        ui.label(format!("{} players", records.len()));
    });
    ui.add_space(4.0);

    egui::ScrollArea::vertical()
        .id_salt("history")
        .auto_shrink([false, true])
        .show(ui, |ui| {
            egui::Grid::new("history_grid")
                .num_columns(5)
                .striped(true)
                .show(ui, |ui| {
                    for header in ["Name", "Status", "Last Seen", "Details", "Note"] {
                        ui.label(RichText::new(header).strong());
                    }
                    ui.end_row();

                    for record in records {
                        let [r, g, b] = status_rgb(record.status);
                        ui.label(record.name.as_str());
                        ui.label(RichText::new(record.status.to_string()).color(Color32::from_rgb(r, g, b)));
                        ui.label(
                            record
                                .last_seen_at
                                .with_timezone(&chrono::Local)
                                .format("%H:%M:%S")
                                .to_string(),
                        );
                        ui.label(&record.details);

                        let draft = note_drafts
                            .entry(record.name.to_string())
                            .or_insert_with(|| record.note.clone());
                        let response = ui.add(
                            egui::TextEdit::singleline(draft)
                                .id_salt(("history_note", record.name.as_str()))
                                .hint_text("add note")
                                .desired_width(180.0),
                        );
                        if response.lost_focus() {
                            if let Some(note) = changed_note(record, draft) {
                                committed = Some((record.name.to_string(), note));
                            }
                        }
                        ui.end_row();
                    }
                });
        });

    (refresh_clicked, clear_clicked, committed)
}

fn region_editor(ui: &mut egui::Ui, label: &str, region: &mut ScreenRegion) {
    ui.label(label);
    ui.horizontal(|ui| {
        ui.label("x");
        ui.add(egui::DragValue::new(&mut region.x));
        ui.label("y");
        ui.add(egui::DragValue::new(&mut region.y));
        ui.label("w");
        ui.add(egui::DragValue::new(&mut region.width).range(1..=7680));
        ui.label("h");
        ui.add(egui::DragValue::new(&mut region.height).range(1..=4320));
    });
    ui.end_row();
}

/// Monitor picker. Falls back to a plain number when monitors cannot be
/// listed.
fn monitor_picker(ui: &mut egui::Ui, monitors: &[MonitorInfo], monitor_index: &mut u32) {
    if monitors.is_empty() {
        ui.add(egui::DragValue::new(monitor_index).range(1..=16));
        return;
    }
    egui::ComboBox::from_id_salt("monitor_picker")
        .selected_text(monitor_label(monitors, *monitor_index))
        .show_ui(ui, |ui| {
            for monitor in monitors {
                ui.selectable_value(monitor_index, monitor.index, monitor.label());
            }
        });
}

/// Render the settings form.
/// Returns (save_clicked, reset_clicked, preview_clicked).
pub fn render_settings(
    ui: &mut egui::Ui,
    draft: &mut SettingsDraft,
    monitors: &[MonitorInfo],
    is_running: bool,
) -> (bool, bool, bool) {
    let mut save_clicked = false;
    let mut reset_clicked = false;
    let mut preview_clicked = false;

    egui::Grid::new("settings_grid").num_columns(2).show(ui, |ui| {
        ui.label("Monitor:");
        monitor_picker(ui, monitors, &mut draft.monitor_index);
        ui.end_row();

        ui.label("Narration:");
        ui.checkbox(&mut draft.narrator_enabled, "Speak alerts");
        ui.end_row();

        ui.label("Audio device:");
        ui.add(egui::DragValue::new(&mut draft.audio_device).range(0..=64))
            .on_hover_text("Output device number passed to the speech command");
        ui.end_row();

        ui.label("Voice:");
        ui.text_edit_singleline(&mut draft.tts_voice);
        ui.end_row();

        region_editor(ui, "Proximity region:", &mut draft.proximity_region);
        region_editor(ui, "Death region:", &mut draft.death_region);

        ui.label("Icon crop:");
        ui.add(egui::DragValue::new(&mut draft.icon_crop).range(0..=1000));
        ui.end_row();
    });

    ui.add_space(8.0);
    ui.horizontal(|ui| {
        if ui.button("Save").clicked() {
            save_clicked = true;
        }
        if ui.button("Revert").clicked() {
            reset_clicked = true;
        }
        if ui.button("Preview regions").clicked() {
            preview_clicked = true;
        }
    });
    if is_running {
        ui.label(RichText::new("Region and monitor changes apply the next time monitoring starts.").italics());
    }

    (save_clicked, reset_clicked, preview_clicked)
}

/// Render the last region preview, scaled down to the panel width.
pub fn render_preview(ui: &mut egui::Ui, texture: &TextureHandle) {
    ui.add_space(8.0);
    ui.label(RichText::new("Region preview").strong());
    ui.label("Green: proximity list. Red: death overlay.");
    let [width, height] = fit_to_width(texture.size(), ui.available_width());
    ui.image((texture.id(), Vec2::new(width, height)));
}
