pub mod death_screen;
pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;

pub use death_screen::{DeathScreenParser, DeathScreenVerdict};
pub use engine::{DetectionLine, TesseractRecognizer, TextRecognizer};
pub use extract::{extract_proximity_names, ProximityFilter};
pub use preprocess::{preprocess_frame, PreprocessSettings};
pub use setup::{ensure_tessdata, locate_tesseract};

use anyhow::Result;
use image::RgbaImage;

use crate::monitor::config::RegionKind;

/// High-level function: captured region → recognized lines.
pub fn read_region(
    img: &RgbaImage,
    kind: RegionKind,
    settings: &PreprocessSettings,
    recognizer: &dyn TextRecognizer,
) -> Result<Vec<DetectionLine>> {
    let binary = preprocess_frame(img, kind, settings)?;
    recognizer.recognize(&binary)
}
