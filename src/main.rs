//! Raider Watch
//!
//! Watches two regions of the game screen: the proximity list, where nearby
//! players appear, and the death overlay naming whoever knocked you out.
//! Every new name is checked against the bounty board in the background and
//! the result is spoken aloud.

// Hide console window on Windows for GUI mode
#![windows_subsystem = "windows"]

mod activity;
mod capture;
mod gui;
mod lookup;
mod monitor;
mod narrator;
mod ocr;
mod paths;

use anyhow::{anyhow, Result};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use activity::ActivityLog;
use capture::ScreenCapture;
use lookup::BountyBoardLookup;
use monitor::{load_config, MonitorConfig, MonitorDeps, MonitorService, PlayerRegistry};
use narrator::CommandNarrator;
use ocr::TesseractRecognizer;

const LOG_FILE_NAME: &str = "raider_watch.log";

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join(LOG_FILE_NAME);
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.to_path_buf()))
        {
            let log_path = exe_dir.join("logs").join(LOG_FILE_NAME);
            if let Ok(mut file) = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
            {
                let _ = file.write_all(log_msg.as_bytes());
            }
        }
    }));
}

/// Finds tesseract, downloading its English data if needed. Without it the
/// monitor still runs, and every scan logs the failure.
fn build_recognizer(config: &MonitorConfig) -> TesseractRecognizer {
    if let Err(e) = ocr::ensure_tessdata() {
        log(&format!("Warning: Failed to setup tessdata: {:#}", e));
    }

    match ocr::locate_tesseract(config.tesseract_path.as_deref().map(Path::new)) {
        Ok(found) => {
            log(&format!("Using tesseract at: {}", found.executable.display()));
            TesseractRecognizer::new(found.executable, found.tessdata, config.page_segmentation)
        }
        Err(e) => {
            log(&format!("Warning: {:#}", e));
            log("OCR will fail until Tesseract is installed.");
            TesseractRecognizer::new(PathBuf::from("tesseract"), None, config.page_segmentation)
        }
    }
}

fn main() -> Result<()> {
    install_panic_hook();

    paths::ensure_directories()?;
    log("Raider Watch starting");

    let config_path = paths::get_config_path();
    let config = load_config(&config_path);

    let activity = ActivityLog::default();
    let lookup = BountyBoardLookup::from_config(&config.lookup)?;
    let deps = MonitorDeps {
        capture: Arc::new(ScreenCapture::new()),
        recognizer: Arc::new(build_recognizer(&config)),
        registry: Arc::new(PlayerRegistry::load(&paths::get_history_path())),
        narrator: Arc::new(CommandNarrator::from_config(&config, activity.clone())),
        activity,
    };
    let service = Arc::new(MonitorService::new(config, deps, Box::new(lookup)));

    log("Starting GUI application...");
    let result = gui::run_gui(Arc::clone(&service), config_path);

    log("Shutting down...");
    service.shutdown();

    match result {
        Ok(()) => {
            log("GUI application exited normally");
            Ok(())
        }
        Err(e) => {
            log(&format!("GUI error: {}", e));
            Err(anyhow!("GUI error: {}", e))
        }
    }
}
