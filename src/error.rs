//! Error types for the exam2db library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExamError`] — **Fatal**: the stage cannot proceed at all (bad input
//!   file, pdfium missing, database unreachable, provider not configured).
//!   Returned as `Err(ExamError)` from every top-level stage function.
//!
//! * [`ItemError`] — **Non-fatal**: a single page or image failed but the
//!   rest of the batch is fine. Stored inside
//!   [`crate::output::ImageResult`] so callers can inspect partial success
//!   instead of losing a whole folder to one bad image.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the exam2db library.
#[derive(Debug, Error)]
pub enum ExamError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// A folder that should contain question images holds none.
    #[error("No images found in '{path}'")]
    NoImages { path: PathBuf },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// No selected page exists in the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or its directory), or install\n\
pdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── OCR / spacing engines ─────────────────────────────────────────────
    /// The tesseract process could not be started or failed.
    #[error("OCR engine failed: {0}\nIs tesseract installed and on PATH?")]
    Ocr(String),

    /// The external spacing command could not be run or failed.
    #[error("Spacing engine '{command}' failed: {detail}")]
    Spacing { command: String, detail: String },

    /// The Mathpix API rejected the request.
    #[error("Mathpix API error: {0}")]
    Mathpix(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every image in the batch failed; there is nothing to write.
    #[error("All {total} images failed.\nFirst error: {first_error}")]
    AllItemsFailed { total: usize, first_error: String },

    // ── Data errors ───────────────────────────────────────────────────────
    /// A JSON file could not be parsed or written.
    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The named subject does not exist in the `subjects` table.
    #[error("Subject '{0}' not found in subjects table")]
    UnknownSubject(String),

    /// Any database failure. The surrounding transaction is rolled back.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read an input file.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page or image.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// The image could not be read or base64-encoded.
    #[error("{name}: encoding failed: {detail}")]
    EncodeFailed { name: String, detail: String },

    /// The model call failed.
    #[error("{name}: LLM call failed: {detail}")]
    LlmFailed { name: String, detail: String },

    /// A crop could not be written.
    #[error("page {page}: crop {number} could not be saved: {detail}")]
    CropFailed {
        page: usize,
        number: String,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_items_failed_display() {
        let e = ExamError::AllItemsFailed {
            total: 4,
            first_error: "boom".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 4 images"), "got: {msg}");
        assert!(msg.contains("boom"));
    }

    #[test]
    fn unknown_subject_display() {
        let e = ExamError::UnknownSubject("세법".into());
        assert!(e.to_string().contains("세법"));
    }

    #[test]
    fn item_error_round_trips_through_json() {
        let e = ItemError::LlmFailed {
            name: "07.png".into(),
            detail: "HTTP 500".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: ItemError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), e.to_string());
    }

    #[test]
    fn crop_failed_display_mentions_page_and_number() {
        let e = ItemError::CropFailed {
            page: 3,
            number: "12".into(),
            detail: "disk full".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"));
        assert!(msg.contains("crop 12"));
    }
}
