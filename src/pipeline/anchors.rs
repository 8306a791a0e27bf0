//! Question-anchor detection.
//!
//! An anchor is a numeral believed to start a new question. Two sources
//! feed this module:
//!
//! - **Text positions** from text-extractable PDFs: any line beginning with
//!   one or two digits and a full stop (`"7."`, `"23."`). Numbers quoted in
//!   the body of a question also match, so candidates are filtered by their
//!   x position: real question numbers share a left margin, stray ones do
//!   not.
//! - **OCR words** from image-only PDFs: digit-only words recognised inside
//!   the margin clip.

use crate::pipeline::ocr::OcrWord;
use crate::pipeline::render::TextLine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

static RE_QUESTION_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})\.").unwrap());

/// A question-number candidate found in a page's text layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorCandidate {
    /// 1-based page number.
    pub page: usize,
    /// Question number, zero-padded to two digits.
    pub number: String,
    /// Left edge in points.
    pub x: f32,
    /// Top edge in points, measured from the top of the page.
    pub y: f32,
}

/// The accepted x band after outlier filtering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XBand {
    pub mean: f32,
    pub lower: f32,
    pub upper: f32,
}

impl XBand {
    pub fn contains(&self, x: f32) -> bool {
        self.lower <= x && x <= self.upper
    }
}

/// Collect candidates from one page's text lines.
pub fn text_candidates(page: usize, lines: &[TextLine]) -> Vec<AnchorCandidate> {
    lines
        .iter()
        .filter_map(|line| {
            let caps = RE_QUESTION_NUMBER.captures(line.text.trim())?;
            Some(AnchorCandidate {
                page,
                number: format!("{:0>2}", &caps[1]),
                x: line.x,
                y: line.y,
            })
        })
        .collect()
}

/// Keep only candidates whose x lies within `tolerance` of the mean x.
///
/// With no candidates the band is empty and nothing survives.
pub fn filter_outliers(
    candidates: Vec<AnchorCandidate>,
    tolerance: f32,
) -> (Vec<AnchorCandidate>, Option<XBand>) {
    if candidates.is_empty() {
        return (candidates, None);
    }
    let mean = candidates.iter().map(|c| c.x).sum::<f32>() / candidates.len() as f32;
    let band = XBand {
        mean,
        lower: mean - tolerance,
        upper: mean + tolerance,
    };
    let before = candidates.len();
    let kept: Vec<AnchorCandidate> = candidates
        .into_iter()
        .filter(|c| band.contains(c.x))
        .collect();
    debug!(
        "Anchor x band {:.2} ± {:.2}: kept {}/{}",
        mean,
        tolerance,
        kept.len(),
        before
    );
    (kept, Some(band))
}

/// Group candidates by page, each page sorted top to bottom.
pub fn group_by_page(candidates: Vec<AnchorCandidate>) -> BTreeMap<usize, Vec<AnchorCandidate>> {
    let mut pages: BTreeMap<usize, Vec<AnchorCandidate>> = BTreeMap::new();
    for c in candidates {
        pages.entry(c.page).or_default().push(c);
    }
    for anchors in pages.values_mut() {
        anchors.sort_by(|a, b| a.y.total_cmp(&b.y));
    }
    pages
}

/// A question number read by OCR inside the margin clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcrDigit {
    pub number: u32,
    /// Top edge in clip-local pixels.
    pub top_px: u32,
}

/// Keep digit-only OCR words, sorted top to bottom.
pub fn ocr_digits(words: &[OcrWord]) -> Vec<OcrDigit> {
    let mut digits: Vec<OcrDigit> = words
        .iter()
        .filter(|w| !w.text.is_empty() && w.text.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|w| {
            Some(OcrDigit {
                number: w.text.parse().ok()?,
                top_px: w.top,
            })
        })
        .collect();
    digits.sort_by_key(|d| d.top_px);
    digits
}
