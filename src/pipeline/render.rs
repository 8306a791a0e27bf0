//! PDF rasterisation and text-position extraction via pdfium.
//!
//! pdfium keeps thread-local state and blocks for the whole render, so the
//! async entry points hand everything to `tokio::task::spawn_blocking`. The
//! synchronous helpers below are meant to be called from inside such a
//! closure, where one bound [`Pdfium`] serves every page of a document.
//!
//! Coordinates handed back to callers use a top-left origin in points:
//! pdfium reports text bounds bottom-up, so `y = page_height - top`.

use crate::error::ExamError;
use crate::geometry::scale_for_dpi;
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Env var pointing at the pdfium shared library (file or directory).
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// A text segment's position on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// Left edge, points.
    pub x: f32,
    /// Top edge, points from the top of the page.
    pub y: f32,
}

/// Bind pdfium from `PDFIUM_LIB_PATH`, falling back to the system library.
pub fn bind_pdfium() -> Result<Pdfium, ExamError> {
    if let Ok(configured) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        let configured = PathBuf::from(configured);
        let lib_path = if configured.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&configured)
        } else {
            configured
        };
        debug!("Binding pdfium from {}", lib_path.display());
        return Pdfium::bind_to_library(&lib_path)
            .map(Pdfium::new)
            .map_err(|e| ExamError::PdfiumBindingFailed(format!("{}: {e:?}", lib_path.display())));
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| ExamError::PdfiumBindingFailed(format!("{e:?}")))
}

/// Open a document, mapping pdfium's password failures onto typed errors.
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, ExamError> {
    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let detail = format!("{e:?}");
        if detail.contains("Password") || detail.contains("password") {
            if password.is_some() {
                ExamError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                ExamError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            ExamError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail,
            }
        }
    })?;
    info!(
        "PDF loaded: {} ({} pages)",
        pdf_path.display(),
        document.pages().len()
    );
    Ok(document)
}

/// Fetch a page by 0-based index.
pub fn get_page<'a>(document: &PdfDocument<'a>, index: usize) -> Result<PdfPage<'a>, ExamError> {
    let total = document.pages().len() as usize;
    if index >= total {
        return Err(ExamError::PageOutOfRange {
            page: index + 1,
            total,
        });
    }
    document
        .pages()
        .get(index as u16)
        .map_err(|e| ExamError::RasterisationFailed {
            page: index + 1,
            detail: format!("{e:?}"),
        })
}

/// Page height in points.
pub fn page_height_pt(page: &PdfPage<'_>) -> f32 {
    page.height().value
}

/// Render a page at `dpi` (scale `dpi / 72`) as an RGB image.
///
/// `page_number` is 1-based and only used for error reporting.
pub fn render_page(page: &PdfPage<'_>, dpi: u32, page_number: usize) -> Result<RgbImage, ExamError> {
    let config = PdfRenderConfig::new().scale_page_by_factor(scale_for_dpi(dpi));
    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| ExamError::RasterisationFailed {
            page: page_number,
            detail: format!("{e:?}"),
        })?;

    // Drop alpha; downstream masking and PNG crops are RGB.
    let image = bitmap.as_image().to_rgb8();
    debug!(
        "Rendered page {} at {} DPI → {}x{} px",
        page_number,
        dpi,
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Text segments of a page with top-left-origin positions.
///
/// Pages without a text layer yield an empty vector.
pub fn page_text_lines(page: &PdfPage<'_>) -> Vec<TextLine> {
    let height = page_height_pt(page);
    let Ok(text_page) = page.text() else {
        return Vec::new();
    };
    text_page
        .segments()
        .iter()
        .filter_map(|segment| {
            let text = segment.text();
            if text.trim().is_empty() {
                return None;
            }
            let bounds = segment.bounds();
            Some(TextLine {
                text,
                x: bounds.left().value,
                y: height - bounds.top().value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_to_a_missing_library_fails_cleanly() {
        std::env::set_var(PDFIUM_LIB_PATH_ENV, "/nonexistent/libpdfium.so");
        let err = bind_pdfium();
        std::env::remove_var(PDFIUM_LIB_PATH_ENV);
        match err {
            Err(ExamError::PdfiumBindingFailed(detail)) => {
                assert!(detail.contains("/nonexistent/libpdfium.so"), "{detail}");
            }
            other => panic!("expected a binding error, got {:?}", other.map(|_| ())),
        }
    }
}
