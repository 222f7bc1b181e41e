use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::log;
use crate::paths::get_tesseract_dir;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

const COMMON_EXECUTABLES: [&str; 2] = [
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

const COMMON_TESSDATA: [&str; 4] = [
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tessdata",
];

pub struct TesseractPaths {
    pub executable: PathBuf,
    /// None lets tesseract use its compiled-in data directory
    pub tessdata: Option<PathBuf>,
}

/// Locates tesseract and its English data.
///
/// Checks the configured path first, then the local data dir, `PATH` and the
/// usual install locations.
pub fn locate_tesseract(configured: Option<&Path>) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(configured)?;
    let tessdata = find_tessdata_dir();
    match &tessdata {
        Some(dir) => log(&format!("Using tessdata at: {}", dir.display())),
        None => log("No tessdata directory found, using tesseract's default"),
    }
    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Finds the Tesseract executable
pub fn find_tesseract_executable(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        log(&format!(
            "Configured tesseract not found at {}, searching",
            path.display()
        ));
    }

    let local_exe = get_tesseract_dir().join(executable_name());
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for path in &COMMON_EXECUTABLES {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install Tesseract-OCR or set tesseract_path in config.json"
    ))
}

/// Finds a directory holding eng.traineddata
pub fn find_tessdata_dir() -> Option<PathBuf> {
    let local_tessdata = get_tesseract_dir().join("tessdata");
    if has_english_data(&local_tessdata) {
        return Some(local_tessdata);
    }

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if has_english_data(&p) {
            return Some(p);
        }
        let p = p.join("tessdata");
        if has_english_data(&p) {
            return Some(p);
        }
    }

    COMMON_TESSDATA
        .iter()
        .map(PathBuf::from)
        .find(|p| has_english_data(p))
}

/// Downloads eng.traineddata into the local data dir when no copy exists.
pub fn ensure_tessdata() -> Result<()> {
    if find_tessdata_dir().is_some() {
        return Ok(());
    }

    let tessdata_dir = get_tesseract_dir().join("tessdata");
    fs::create_dir_all(&tessdata_dir)?;
    let eng_path = tessdata_dir.join("eng.traineddata");

    log("Downloading eng.traineddata...");

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(format!("{}/eng.traineddata", TESSDATA_REPO))
        .header("User-Agent", "raider-watch")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download eng.traineddata: HTTP {}",
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&eng_path)
        .with_context(|| format!("Failed to create {}", eng_path.display()))?;
    file.write_all(&bytes)?;

    log(&format!("Downloaded eng.traineddata ({} bytes)", bytes.len()));
    Ok(())
}

fn has_english_data(dir: &Path) -> bool {
    dir.join("eng.traineddata").exists()
}

fn executable_name() -> &'static str {
    if cfg!(windows) { "tesseract.exe" } else { "tesseract" }
}
