//! Tesseract OCR engine (CLI wrapper).
//!
//! The engine is only asked to read question numbers inside a masked margin
//! clip, so a subprocess per page is plenty. Output is requested as TSV,
//! which carries per-word bounding boxes:
//!
//! ```text
//! level page_num block_num par_num line_num word_num left top width height conf text
//! ```

use crate::config::TesseractConfig;
use crate::error::ExamError;
use image::DynamicImage;
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info};

/// One recognised word with its box in image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f32,
}

/// Runs the `tesseract` binary.
pub struct TesseractEngine {
    config: TesseractConfig,
}

impl TesseractEngine {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    /// Check the binary runs and return its version line.
    pub fn version(&self) -> Result<String, ExamError> {
        let output = Command::new(self.config.binary())
            .arg("--version")
            .output()
            .map_err(|e| ExamError::Ocr(format!("cannot run '{}': {e}", self.config.binary())))?;
        let text = String::from_utf8_lossy(&output.stdout);
        let text = if text.trim().is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            text.into_owned()
        };
        Ok(text.lines().next().unwrap_or("tesseract").trim().to_string())
    }

    /// Recognise words in an in-memory image.
    pub fn recognize(&self, img: &DynamicImage) -> Result<Vec<OcrWord>, ExamError> {
        let tmp = tempfile::Builder::new()
            .prefix("exam2db-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| ExamError::Ocr(format!("temp file: {e}")))?;
        img.save_with_format(tmp.path(), image::ImageFormat::Png)
            .map_err(|e| ExamError::Ocr(format!("writing OCR input: {e}")))?;
        self.recognize_file(tmp.path())
    }

    /// Recognise words in an image file.
    pub fn recognize_file(&self, image_path: &std::path::Path) -> Result<Vec<OcrWord>, ExamError> {
        let start = Instant::now();
        let mut cmd = Command::new(self.config.binary());
        cmd.args(self.args(image_path));
        if let Some(ref tessdata) = self.config.tessdata_path {
            cmd.env("TESSDATA_PREFIX", tessdata);
        }
        debug!("Running {:?}", cmd);

        let output = cmd
            .output()
            .map_err(|e| ExamError::Ocr(format!("cannot run '{}': {e}", self.config.binary())))?;
        if !output.status.success() {
            return Err(ExamError::Ocr(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let words = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        info!(
            "Tesseract: {} words in {} ms",
            words.len(),
            start.elapsed().as_millis()
        );
        Ok(words)
    }

    fn args(&self, image_path: &std::path::Path) -> Vec<String> {
        let mut args = vec![
            image_path.to_string_lossy().into_owned(),
            "stdout".to_string(),
            "--oem".to_string(),
            self.config.oem.to_string(),
            "--psm".to_string(),
            self.config.psm.to_string(),
        ];
        if let Some(ref whitelist) = self.config.char_whitelist {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_whitelist={whitelist}"));
        }
        args.push("tsv".to_string());
        args
    }
}

/// Parse tesseract TSV into word-level results.
///
/// The header row, non-word rows (level ≠ 5) and blank words are skipped.
pub fn parse_tsv(tsv: &str) -> Vec<OcrWord> {
    tsv.lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 12 || cols[0] != "5" {
                return None;
            }
            let text = cols[11].trim();
            if text.is_empty() {
                return None;
            }
            Some(OcrWord {
                text: text.to_string(),
                left: cols[6].parse().ok()?,
                top: cols[7].parse().ok()?,
                width: cols[8].parse().ok()?,
                height: cols[9].parse().ok()?,
                confidence: cols[10].parse().unwrap_or(-1.0),
            })
        })
        .collect()
}
