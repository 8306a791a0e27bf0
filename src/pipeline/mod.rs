//! Pipeline building blocks shared by the stage entry points.
//!
//! ```text
//! crop:        input ──▶ render ──▶ (mask ──▶ ocr) | text ──▶ anchors ──▶ geometry slices
//! transcribe:  encode ──▶ llm ──▶ postprocess
//! ```
//!
//! 1. [`input`]  — resolve a path or URL to a local, magic-checked PDF
//! 2. [`render`] — pdfium rasterisation and text positions; blocking, so
//!    callers run it under `spawn_blocking`
//! 3. [`mask`]   — isolate magenta question numbers for OCR
//! 4. [`ocr`]    — tesseract CLI wrapper returning word boxes
//! 5. [`anchors`] — question-number candidates from text or OCR
//! 6. [`encode`] — base64-wrap crop files for the multimodal request
//! 7. [`llm`]    — one vision-model call per image, no retry
//! 8. [`postprocess`] — deterministic transcript cleanup

pub mod anchors;
pub mod encode;
pub mod input;
pub mod llm;
pub mod mask;
pub mod ocr;
pub mod postprocess;
pub mod render;
