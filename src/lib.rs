//! # exam2db
//!
//! Turn exam PDFs into structured question records in PostgreSQL.
//!
//! Scanned exam books carry no usable text layer, and the typeset ones mix
//! Korean prose, tables and formulae that plain text extraction mangles.
//! This crate cuts each page into one image per question, has a vision
//! model transcribe every image into tagged LaTeX, parses the tags into
//! JSON and loads the JSON into a relational schema.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Crop        question numbers located by OCR (crop_by_ocr) or by the
//!  │                 text layer (crop_by_text); one PNG per question
//!  ├─ 2. Transcribe  PNG → vision model → tagged LaTeX appended to <folder>.tex
//!  ├─ 3. Parse       .tex → <stem>.json + <stem>_exception.json
//!  └─ 4. Load        JSON → subjects / problem_groups / questions / choices / answers
//!
//! OX track:  .txt ─ parse_ox_file ─▶ JSON ─ load_ox ─▶ ox_questions
//! OCR track: image ─ MathpixClient ─▶ JSON ─ reflow_file ─▶ text
//! ```
//!
//! Stages exchange plain files, so each one can be re-run or hand-fixed on
//! its own.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use exam2db::{crop_by_text, parse_exam_file, transcribe_folder, TextCropConfig, TranscribeConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let crops = crop_by_text("2024_행정소송법.pdf", &TextCropConfig::default()).await?;
//!     eprintln!("{} questions cropped", crops.crops.len());
//!
//!     // Provider auto-detected from OPENAI_API_KEY / EDGEQUAKE_LLM_PROVIDER
//!     let transcript = transcribe_folder(&crops.output_dir, &TranscribeConfig::default()).await?;
//!
//!     if let Some(tex) = transcript.transcript_path {
//!         let summary = parse_exam_file(&tex, None)?;
//!         eprintln!("{} parsed, {} to review", summary.question_count, summary.exception_count);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `exam2db` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## External tools
//!
//! - **pdfium** shared library for rendering (`PDFIUM_LIB_PATH` or the system loader)
//! - **tesseract** on `PATH` for the OCR crop variant
//! - a vision-capable model through `edgequake-llm` for transcription

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod crop;
pub mod db;
pub mod error;
pub mod geometry;
pub mod latex;
pub mod mathpix;
pub mod output;
pub mod ox;
pub mod parse;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod reflow;
pub mod tags;
pub mod transcribe;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ClipRect, DbConfig, OcrCropConfig, OcrCropConfigBuilder, PageSelection, TesseractConfig, TextCropConfig,
    TextCropConfigBuilder, TranscribeConfig, TranscribeConfigBuilder, TranscriptionMode,
};
pub use crop::{crop_by_ocr, crop_by_text};
pub use db::{create_pool, initialize_schema, load_exam, load_ox, LoadRequest, OxLoadRequest};
pub use error::{ExamError, ItemError};
pub use mathpix::MathpixClient;
pub use output::{
    AnswerRecord, CropOutput, CropStats, CroppedQuestion, ExamQuestion, ImageResult, LoadSummary, OxQuestion,
    ParseSummary, ReflowOutput, TranscriptionOutput, TranscriptionStats,
};
pub use ox::{parse_ox_file, parse_ox_text};
pub use parse::{parse_exam_file, parse_exam_tex};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use reflow::{reflow, reflow_file, CommandSpacer, ParticleSpacer, Spacer};
pub use transcribe::transcribe_folder;
