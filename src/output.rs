//! Result types returned by each stage.
//!
//! Everything here is `Serialize` so the CLI's `--json` flag can dump a
//! stage summary verbatim, and so parsed records round-trip through the
//! JSON files the stages exchange.

use crate::error::ItemError;
use crate::geometry::VerticalSpan;
use crate::pipeline::anchors::XBand;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

// ── Crop ─────────────────────────────────────────────────────────────────

/// One question image written by a crop stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CroppedQuestion {
    /// 1-based page number.
    pub page: usize,
    /// Question number, zero-padded to two digits.
    pub number: String,
    /// Rows of the full-page render that were kept.
    pub span: VerticalSpan,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CropStats {
    pub pages_scanned: usize,
    pub pages_with_anchors: usize,
    pub anchors_found: usize,
    /// Text-path candidates dropped by the x-band filter.
    pub anchors_rejected: usize,
    pub crops_written: usize,
    pub total_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropOutput {
    pub output_dir: PathBuf,
    pub crops: Vec<CroppedQuestion>,
    /// Accepted x band (text path only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_band: Option<XBand>,
    /// Slices that could not be written.
    #[serde(default)]
    pub failures: Vec<ItemError>,
    pub stats: CropStats,
}

// ── Transcription ────────────────────────────────────────────────────────

/// Result of transcribing one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResult {
    /// File name of the image (`"07.png"`).
    pub name: String,
    /// Cleaned model output. Empty on failure.
    pub output: String,
    /// Where the output went: the shared `.tex` or a per-image `.json`.
    pub output_path: Option<PathBuf>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub error: Option<ItemError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionStats {
    /// Images found in the folder before `skip`/`only`.
    pub total_images: usize,
    pub processed_images: usize,
    pub failed_images: usize,
    /// Images excluded by `skip`/`only`.
    pub skipped_images: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionOutput {
    pub images: Vec<ImageResult>,
    /// The `.tex` transcript in exam mode.
    pub transcript_path: Option<PathBuf>,
    pub stats: TranscriptionStats,
}

// ── Exam parse ───────────────────────────────────────────────────────────

/// A fully tagged exam question, as written to `<stem>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamQuestion {
    pub problem_num: String,
    /// Either a single string or, in hand-edited files, a list of lines.
    #[serde(deserialize_with = "string_or_lines")]
    pub description: String,
    pub choice: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_info: Option<String>,
}

/// A transcript block missing a required tag, kept for manual review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamException {
    /// 1-based block position in the transcript.
    pub index: usize,
    pub block: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub questions: Vec<ExamQuestion>,
    pub exceptions: Vec<ExamException>,
}

/// What `parse_exam_file` wrote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseSummary {
    pub questions_path: PathBuf,
    pub exceptions_path: PathBuf,
    pub question_count: usize,
    pub exception_count: usize,
}

// ── OX ───────────────────────────────────────────────────────────────────

/// A true/false question.
///
/// Files from the text parser carry `category` and a string `number`;
/// files from vision transcription carry `theme` and an integer `number`.
/// Both shapes deserialise into this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OxQuestion {
    #[serde(deserialize_with = "string_or_number")]
    pub number: String,
    pub question: String,
    /// `"O"` or `"X"`.
    pub answer: String,
    #[serde(default, alias = "theme")]
    pub category: String,
    #[serde(default)]
    pub explanation: String,
}

// ── Answers ──────────────────────────────────────────────────────────────

/// One item of an answer-key file. Keys follow the source material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    #[serde(rename = "번호", deserialize_with = "string_or_number")]
    pub number: String,
    #[serde(rename = "정답", default)]
    pub answer: Option<String>,
    #[serde(
        rename = "해설",
        default,
        deserialize_with = "optional_string_or_lines"
    )]
    pub explanation: Option<String>,
}

// ── Reflow ───────────────────────────────────────────────────────────────

/// A spacing fix for two tokens glued together across a line break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub joined: String,
    pub spaced: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflowOutput {
    pub text: String,
    pub corrections: Vec<Correction>,
}

// ── Load ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadSummary {
    pub subject_id: i32,
    pub problem_group_id: Option<i32>,
    pub questions: usize,
    pub choices: usize,
    pub answers: usize,
    /// Answer items with no matching question or an empty answer.
    pub answers_skipped: usize,
    pub ox_questions: usize,
}

// ── serde helpers ────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrLines {
    One(String),
    Many(Vec<String>),
}

impl StringOrLines {
    fn join(self) -> String {
        match self {
            StringOrLines::One(s) => s,
            StringOrLines::Many(lines) => lines.join("\n"),
        }
    }
}

fn string_or_lines<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    StringOrLines::deserialize(d).map(StringOrLines::join)
}

fn optional_string_or_lines<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Option::<StringOrLines>::deserialize(d).map(|v| v.map(StringOrLines::join))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Int(i64),
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match StringOrNumber::deserialize(d)? {
        StringOrNumber::Str(s) => s.trim().to_string(),
        StringOrNumber::Int(n) => n.to_string(),
    })
}
