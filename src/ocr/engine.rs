use anyhow::{anyhow, Result};
use image::GrayImage;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

/// One line of recognized text.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionLine {
    pub text: String,
    /// 0.0 to 1.0
    pub confidence: f32,
    /// Distance from the top of the recognized image, in pixels
    pub top: f32,
}

impl DetectionLine {
    pub fn new(text: impl Into<String>, confidence: f32, top: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            top,
        }
    }
}

/// Text recognition over a preprocessed binary image.
///
/// Returns an empty list when nothing was detected.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, img: &GrayImage) -> Result<Vec<DetectionLine>>;
}

/// Runs the Tesseract CLI with TSV output.
pub struct TesseractRecognizer {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    page_segmentation: u8,
}

impl TesseractRecognizer {
    pub fn new(executable: PathBuf, tessdata: Option<PathBuf>, page_segmentation: u8) -> Self {
        Self {
            executable,
            tessdata,
            page_segmentation,
        }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, img: &GrayImage) -> Result<Vec<DetectionLine>> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())?;

        // Tesseract appends .tsv to the output base
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut command = Command::new(&self.executable);
        command.arg(temp_input.path()).arg(&output_base);
        if let Some(tessdata) = &self.tessdata {
            command.arg("--tessdata-dir").arg(tessdata);
        }
        let output = command
            .arg("-l")
            .arg("eng")
            .arg("--psm")
            .arg(self.page_segmentation.to_string())
            .arg("tsv")
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_output(&tsv_content))
    }
}

#[derive(Default)]
struct LineAccumulator {
    words: Vec<String>,
    conf_sum: f32,
    top: Option<i32>,
}

/// Groups Tesseract TSV words into lines.
///
/// Lines are keyed by (block, paragraph, line) since line numbers restart in
/// every block. Confidence is the mean word confidence scaled to 0-1 and the
/// vertical position is the topmost word edge.
fn parse_tsv_output(tsv: &str) -> Vec<DetectionLine> {
    let mut lines: BTreeMap<(i32, i32, i32), LineAccumulator> = BTreeMap::new();

    for row in tsv.lines().skip(1) {
        // level, page_num, block_num, par_num, line_num, word_num,
        // left, top, width, height, conf, text
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // Level 5 = word
        let level: i32 = fields[0].parse().unwrap_or(-1);
        if level != 5 {
            continue;
        }

        let text = fields[11].trim();
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (
            fields[2].parse().unwrap_or(-1),
            fields[3].parse().unwrap_or(-1),
            fields[4].parse().unwrap_or(-1),
        );
        let top: i32 = fields[7].parse().unwrap_or(0);

        let line = lines.entry(key).or_default();
        line.words.push(text.to_string());
        line.conf_sum += conf;
        line.top = Some(line.top.map_or(top, |t| t.min(top)));
    }

    lines
        .into_values()
        .map(|line| DetectionLine {
            confidence: line.conf_sum / line.words.len() as f32 / 100.0,
            text: line.words.join(" "),
            top: line.top.unwrap_or(0) as f32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn word(block: i32, line: i32, word: i32, top: i32, conf: f32, text: &str) -> String {
        format!(
            "5\t1\t{}\t1\t{}\t{}\t10\t{}\t50\t20\t{}\t{}",
            block, line, word, top, conf, text
        )
    }

    #[test]
    fn test_parse_groups_words_into_lines() {
        let tsv = [
            HEADER.to_string(),
            "1\t1\t0\t0\t0\t0\t0\t0\t600\t300\t-1\t".to_string(),
            word(1, 1, 1, 42, 90.0, "Player"),
            word(1, 1, 2, 40, 80.0, "KNOCKED"),
            word(1, 2, 1, 90, 70.0, "Raider99"),
        ]
        .join("\n");

        let lines = parse_tsv_output(&tsv);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Player KNOCKED");
        assert!((lines[0].confidence - 0.85).abs() < 1e-4);
        assert_eq!(lines[0].top, 40.0);
        assert_eq!(lines[1].text, "Raider99");
        assert_eq!(lines[1].top, 90.0);
    }

    #[test]
    fn test_parse_keeps_blocks_apart() {
        let tsv = [
            HEADER.to_string(),
            word(1, 1, 1, 10, 90.0, "first"),
            word(2, 1, 1, 60, 90.0, "second"),
        ]
        .join("\n");

        let lines = parse_tsv_output(&tsv);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].text, "second");
    }

    #[test]
    fn test_parse_skips_empty_and_unscored_words() {
        let tsv = [
            HEADER.to_string(),
            word(1, 1, 1, 10, -1.0, "ghost"),
            word(1, 1, 2, 10, 95.0, "  "),
            "garbage row".to_string(),
        ]
        .join("\n");

        assert!(parse_tsv_output(&tsv).is_empty());
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_tsv_output("").is_empty());
        assert!(parse_tsv_output(HEADER).is_empty());
    }
}
