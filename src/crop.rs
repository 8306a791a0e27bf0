//! Question cropping: slice rendered pages into one image per question.
//!
//! Two variants share the slicer:
//!
//! - [`crop_by_ocr`] for image-only PDFs. A margin clip of each page is
//!   masked to its magenta numerals and read with tesseract.
//! - [`crop_by_text`] for PDFs with a text layer. Question numbers come
//!   from text positions, filtered to the dominant left margin across the
//!   whole document.
//!
//! Both render with pdfium inside `spawn_blocking` and write `NN.png`
//! files. A later question with the same number overwrites the earlier
//! file.

use crate::config::{ClipRect, OcrCropConfig, TextCropConfig};
use crate::error::{ExamError, ItemError};
use crate::geometry::{
    clip_px_to_page_pt, clip_to_pixels, page_pt_to_px, scale_for_dpi, slice_spans, VerticalSpan,
};
use crate::output::{CropOutput, CropStats, CroppedQuestion};
use crate::pipeline::anchors::{self, AnchorCandidate};
use crate::pipeline::input::{self, is_url};
use crate::pipeline::mask;
use crate::pipeline::ocr::TesseractEngine;
use crate::pipeline::render;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Crop an image-only PDF using OCR-detected question numbers.
pub async fn crop_by_ocr(input_str: &str, config: &OcrCropConfig) -> Result<CropOutput, ExamError> {
    let start = Instant::now();
    info!("Cropping by OCR: {}", input_str);
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();
    let out_dir = config
        .output_dir
        .clone()
        .unwrap_or_else(|| default_output_dir(input_str, &pdf_path));

    let config = config.clone();
    let dir = out_dir.clone();
    let mut output = tokio::task::spawn_blocking(move || crop_by_ocr_blocking(&pdf_path, &dir, &config))
        .await
        .map_err(|e| ExamError::Internal(format!("Crop task panicked: {e}")))??;

    output.stats.total_duration_ms = start.elapsed().as_millis() as u64;
    log_summary(&output);
    // `resolved` (and any downloaded temp file) lives until here.
    drop(resolved);
    Ok(output)
}

/// Crop a text-extractable PDF using question numbers from its text layer.
pub async fn crop_by_text(input_str: &str, config: &TextCropConfig) -> Result<CropOutput, ExamError> {
    let start = Instant::now();
    info!("Cropping by text positions: {}", input_str);
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();
    let out_dir = config
        .output_dir
        .clone()
        .unwrap_or_else(|| default_output_dir(input_str, &pdf_path));

    let config = config.clone();
    let dir = out_dir.clone();
    let mut output = tokio::task::spawn_blocking(move || crop_by_text_blocking(&pdf_path, &dir, &config))
        .await
        .map_err(|e| ExamError::Internal(format!("Crop task panicked: {e}")))??;

    output.stats.total_duration_ms = start.elapsed().as_millis() as u64;
    log_summary(&output);
    drop(resolved);
    Ok(output)
}

/// Default crop directory: the PDF path without its `.pdf` extension.
///
/// Downloaded PDFs get a directory named after the file in the current
/// working directory, since their own path is a temp dir.
pub fn default_output_dir(input_str: &str, resolved: &Path) -> PathBuf {
    let source = if is_url(input_str) {
        PathBuf::from(resolved.file_name().unwrap_or_default())
    } else {
        PathBuf::from(input_str)
    };
    let is_pdf = source
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        source.with_extension("")
    } else {
        let mut name = source.into_os_string();
        name.push("_questions");
        PathBuf::from(name)
    }
}

// ── Blocking cores ───────────────────────────────────────────────────────

fn crop_by_ocr_blocking(
    pdf_path: &Path,
    out_dir: &Path,
    config: &OcrCropConfig,
) -> Result<CropOutput, ExamError> {
    let pdfium = render::bind_pdfium()?;
    let document = render::open_document(&pdfium, pdf_path, config.password.as_deref())?;
    let total = document.pages().len() as usize;
    let indices = selected_pages(&config.pages, total)?;
    create_dir(out_dir)?;

    let engine = TesseractEngine::new(config.tesseract.clone());
    debug!("OCR engine: {}", engine.version()?);
    let scale = scale_for_dpi(config.dpi);

    let mut stats = CropStats::default();
    let mut crops = Vec::new();
    let mut failures = Vec::new();

    for (position, &idx) in indices.iter().enumerate() {
        let page_number = idx + 1;
        let page = render::get_page(&document, idx)?;
        let page_h = render::page_height_pt(&page);
        let image = render::render_page(&page, config.dpi, page_number)?;
        stats.pages_scanned += 1;

        let clip = config.clip_for(position);
        let rect = clip_to_pixels(&clip, scale, image.width(), image.height());
        if rect.width == 0 || rect.height == 0 {
            warn!("Page {}: clip {:?} falls outside the page", page_number, clip);
            continue;
        }
        // The clip actually rendered, after clamping to the page.
        let effective = ClipRect::new(
            rect.x as f32 / scale,
            rect.y as f32 / scale,
            (rect.x + rect.width) as f32 / scale,
            (rect.y + rect.height) as f32 / scale,
        );

        let margin = image::imageops::crop_imm(&image, rect.x, rect.y, rect.width, rect.height).to_image();
        let binary = mask::isolate_numbers(&margin);
        let words = engine.recognize(&DynamicImage::ImageLuma8(binary))?;
        let digits = anchors::ocr_digits(&words);
        if digits.is_empty() {
            info!("Page {}: no question numbers found", page_number);
            continue;
        }
        stats.pages_with_anchors += 1;
        stats.anchors_found += digits.len();

        let page_anchors: Vec<(String, u32)> = digits
            .iter()
            .map(|d| {
                let y_pt = clip_px_to_page_pt(d.top_px as f32, &effective, rect.height);
                let y_px = page_pt_to_px(y_pt, image.height(), page_h);
                debug!(
                    "Page {}: #{} at clip {}px → {:.1}pt → {}px",
                    page_number, d.number, d.top_px, y_pt, y_px
                );
                (format!("{:02}", d.number), y_px)
            })
            .collect();

        let (written, failed) =
            slice_page(page_number, &image, &page_anchors, config.top_margin_px, out_dir);
        crops.extend(written);
        failures.extend(failed);
    }

    stats.crops_written = crops.len();
    Ok(CropOutput {
        output_dir: out_dir.to_path_buf(),
        crops,
        x_band: None,
        failures,
        stats,
    })
}

fn crop_by_text_blocking(
    pdf_path: &Path,
    out_dir: &Path,
    config: &TextCropConfig,
) -> Result<CropOutput, ExamError> {
    let pdfium = render::bind_pdfium()?;
    let document = render::open_document(&pdfium, pdf_path, config.password.as_deref())?;
    let total = document.pages().len() as usize;
    let indices = selected_pages(&config.pages, total)?;

    // Pass 1: candidates from every selected page, so the x band reflects
    // the whole document.
    let mut candidates: Vec<AnchorCandidate> = Vec::new();
    for &idx in &indices {
        let page = render::get_page(&document, idx)?;
        let lines = render::page_text_lines(&page);
        candidates.extend(anchors::text_candidates(idx + 1, &lines));
    }

    let mut stats = CropStats {
        pages_scanned: indices.len(),
        anchors_found: candidates.len(),
        ..Default::default()
    };
    let (kept, x_band) = anchors::filter_outliers(candidates, config.x_tolerance_pt);
    stats.anchors_rejected = stats.anchors_found - kept.len();
    if kept.is_empty() {
        warn!("No question numbers found in the text layer of {}", pdf_path.display());
    }

    create_dir(out_dir)?;
    let mut crops = Vec::new();
    let mut failures = Vec::new();

    // Pass 2: render and slice pages that kept at least one anchor.
    for (page_number, page_anchors) in anchors::group_by_page(kept) {
        let page = render::get_page(&document, page_number - 1)?;
        let page_h = render::page_height_pt(&page);
        let image = render::render_page(&page, config.dpi, page_number)?;
        stats.pages_with_anchors += 1;

        let rows: Vec<(String, u32)> = page_anchors
            .into_iter()
            .map(|a| (a.number, page_pt_to_px(a.y, image.height(), page_h)))
            .collect();
        let (written, failed) = slice_page(page_number, &image, &rows, 0, out_dir);
        crops.extend(written);
        failures.extend(failed);
    }

    stats.crops_written = crops.len();
    Ok(CropOutput {
        output_dir: out_dir.to_path_buf(),
        crops,
        x_band,
        failures,
        stats,
    })
}

// ── Shared helpers ───────────────────────────────────────────────────────

fn selected_pages(
    selection: &crate::config::PageSelection,
    total: usize,
) -> Result<Vec<usize>, ExamError> {
    let indices = selection.to_indices(total);
    if indices.is_empty() {
        return Err(ExamError::PageOutOfRange { page: 0, total });
    }
    Ok(indices)
}

fn create_dir(dir: &Path) -> Result<(), ExamError> {
    std::fs::create_dir_all(dir).map_err(|source| ExamError::OutputWriteFailed {
        path: dir.to_path_buf(),
        source,
    })
}

/// Slice one rendered page at the given anchors (sorted by row) and write
/// a full-width PNG per surviving span.
pub(crate) fn slice_page(
    page_number: usize,
    image: &RgbImage,
    anchors: &[(String, u32)],
    top_margin: u32,
    out_dir: &Path,
) -> (Vec<CroppedQuestion>, Vec<ItemError>) {
    let ys: Vec<u32> = anchors.iter().map(|(_, y)| *y).collect();
    let mut written = Vec::new();
    let mut failed = Vec::new();

    for (i, span) in slice_spans(&ys, image.height(), top_margin) {
        let number = anchors[i].0.clone();
        let path = out_dir.join(format!("{number}.png"));
        match save_span(image, span, &path) {
            Ok(()) => {
                debug!(
                    "Page {}: saved {} ({}px ~ {}px)",
                    page_number,
                    path.display(),
                    span.top,
                    span.bottom
                );
                written.push(CroppedQuestion {
                    page: page_number,
                    number,
                    span,
                    path,
                });
            }
            Err(e) => {
                warn!("Page {}: could not save {}: {}", page_number, path.display(), e);
                failed.push(ItemError::CropFailed {
                    page: page_number,
                    number,
                    detail: e.to_string(),
                });
            }
        }
    }
    (written, failed)
}

fn save_span(image: &RgbImage, span: VerticalSpan, path: &Path) -> Result<(), image::ImageError> {
    image::imageops::crop_imm(image, 0, span.top, image.width(), span.height())
        .to_image()
        .save_with_format(path, ImageFormat::Png)
}

fn log_summary(output: &CropOutput) {
    info!(
        "Cropped {} questions from {}/{} pages into {} ({} ms)",
        output.stats.crops_written,
        output.stats.pages_with_anchors,
        output.stats.pages_scanned,
        output.output_dir.display(),
        output.stats.total_duration_ms
    );
    if !output.failures.is_empty() {
        warn!("{} crops could not be written", output.failures.len());
    }
}
