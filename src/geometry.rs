//! Coordinate-space conversion between PDF points, clip-local pixels and
//! full-page render pixels.
//!
//! Three spaces are in play when cropping a page:
//!
//! ```text
//! PDF points (72/inch, top-left origin after flipping)
//!    │  × dpi/72
//!    ▼
//! full-page render pixels ──crop clip──▶ clip-local pixels (OCR input)
//! ```
//!
//! OCR reports positions in clip-local pixels. Those are mapped back to
//! page points through the clip's own scale, then forward into the full
//! render through the page's scale. Keeping the two scales separate means
//! the clip and the full page may be rendered at different sizes.

use crate::config::ClipRect;
use tracing::warn;

/// Points per inch in PDF user space.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Render scale factor for a DPI.
pub fn scale_for_dpi(dpi: u32) -> f32 {
    dpi as f32 / POINTS_PER_INCH
}

/// Map a y position inside a rendered clip back to page points.
pub fn clip_px_to_page_pt(y_clip_px: f32, clip: &ClipRect, clip_height_px: u32) -> f32 {
    if clip_height_px == 0 {
        return clip.y0;
    }
    clip.y0 + y_clip_px * clip.height() / clip_height_px as f32
}

/// Map a y position in page points to a row of the full-page render.
pub fn page_pt_to_px(y_pt: f32, image_height_px: u32, page_height_pt: f32) -> u32 {
    if page_height_pt <= 0.0 {
        return 0;
    }
    let px = y_pt * image_height_px as f32 / page_height_pt;
    px.max(0.0).floor() as u32
}

/// A pixel rectangle: `x`, `y` are the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Convert a clip in points into a pixel rectangle of a render at `scale`,
/// clamped to the image bounds.
pub fn clip_to_pixels(clip: &ClipRect, scale: f32, image_w: u32, image_h: u32) -> PixelRect {
    let to_px = |v: f32, max: u32| ((v * scale).max(0.0).round() as u32).min(max);
    let x0 = to_px(clip.x0, image_w);
    let y0 = to_px(clip.y0, image_h);
    let x1 = to_px(clip.x1, image_w).max(x0);
    let y1 = to_px(clip.y1, image_h).max(y0);
    PixelRect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    }
}

/// A horizontal band of a page image, `top` inclusive, `bottom` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VerticalSpan {
    pub top: u32,
    pub bottom: u32,
}

impl VerticalSpan {
    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Slice a page between consecutive anchors.
///
/// `anchor_ys` must be sorted ascending. Each span starts `top_margin`
/// pixels above its anchor (saturating at the page top) and ends at the next
/// anchor, or at the bottom of the image for the last one. Degenerate spans
/// are dropped; the returned vector pairs each surviving span with the index
/// of the anchor that produced it.
pub fn slice_spans(anchor_ys: &[u32], image_height: u32, top_margin: u32) -> Vec<(usize, VerticalSpan)> {
    let mut spans = Vec::with_capacity(anchor_ys.len());
    for (i, &y) in anchor_ys.iter().enumerate() {
        let top = y.saturating_sub(top_margin).min(image_height);
        let bottom = anchor_ys
            .get(i + 1)
            .copied()
            .unwrap_or(image_height)
            .min(image_height);
        if bottom <= top {
            warn!("Dropping empty slice for anchor {} ({}px ~ {}px)", i, top, bottom);
            continue;
        }
        spans.push((i, VerticalSpan { top, bottom }));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    // A4 portrait is 595 × 842 pt; at 300 DPI it renders to 2480 × 3508 px.
    const A4_H_PT: f32 = 842.0;
    const A4_H_PX_300: u32 = 3508;

    #[test]
    fn scale_at_common_dpis() {
        assert_eq!(scale_for_dpi(72), 1.0);
        assert!((scale_for_dpi(300) - 4.1666665).abs() < 1e-5);
    }

    #[test]
    fn clip_px_maps_back_to_page_points() {
        let clip = ClipRect::new(0.0, 50.0, 300.0, 700.0);
        // The clip is 650 pt tall; at 300 DPI that is ~2708 px.
        let clip_h_px = (650.0 * scale_for_dpi(300)).round() as u32;
        assert_eq!(clip_px_to_page_pt(0.0, &clip, clip_h_px), 50.0);
        let bottom = clip_px_to_page_pt(clip_h_px as f32, &clip, clip_h_px);
        assert!((bottom - 700.0).abs() < 1e-3);
        let mid = clip_px_to_page_pt(clip_h_px as f32 / 2.0, &clip, clip_h_px);
        assert!((mid - 375.0).abs() < 1e-3);
    }

    #[test]
    fn page_points_map_to_render_rows() {
        assert_eq!(page_pt_to_px(0.0, A4_H_PX_300, A4_H_PT), 0);
        assert_eq!(page_pt_to_px(A4_H_PT, A4_H_PX_300, A4_H_PT), A4_H_PX_300);
        // 100 pt at 300 DPI ≈ 416.6 px, truncated like int() in the crop math.
        assert_eq!(page_pt_to_px(100.0, A4_H_PX_300, A4_H_PT), 416);
        assert_eq!(page_pt_to_px(-5.0, A4_H_PX_300, A4_H_PT), 0);
        assert_eq!(page_pt_to_px(10.0, A4_H_PX_300, 0.0), 0);
    }

    #[test]
    fn ocr_row_round_trips_through_both_scales() {
        // OCR sees a digit 85 px into a 300-DPI clip starting at 50 pt.
        let clip = ClipRect::new(0.0, 50.0, 300.0, 700.0);
        let scale = scale_for_dpi(300);
        let clip_h_px = (clip.height() * scale).round() as u32;
        let y_pt = clip_px_to_page_pt(85.0, &clip, clip_h_px);
        let y_px = page_pt_to_px(y_pt, A4_H_PX_300, A4_H_PT);
        // Same render scale on both sides → clip origin (208 px) + 85 px.
        let expected = (50.0 * scale) as u32 + 85;
        assert!(y_px.abs_diff(expected) <= 1, "{y_px} vs {expected}");
    }

    #[test]
    fn clip_to_pixels_clamps_to_image() {
        let rect = clip_to_pixels(&ClipRect::new(0.0, 50.0, 300.0, 700.0), 1.0, 200, 600);
        assert_eq!(
            rect,
            PixelRect {
                x: 0,
                y: 50,
                width: 200,
                height: 550
            }
        );
    }

    #[test]
    fn slices_run_between_anchors() {
        let spans = slice_spans(&[100, 400, 900], 1200, 0);
        let spans: Vec<VerticalSpan> = spans.into_iter().map(|(_, s)| s).collect();
        assert_eq!(
            spans,
            vec![
                VerticalSpan { top: 100, bottom: 400 },
                VerticalSpan { top: 400, bottom: 900 },
                VerticalSpan { top: 900, bottom: 1200 },
            ]
        );
    }

    #[test]
    fn top_margin_saturates_at_page_top() {
        let spans = slice_spans(&[10, 500], 1000, 20);
        assert_eq!(spans[0].1, VerticalSpan { top: 0, bottom: 500 });
        assert_eq!(spans[1].1, VerticalSpan { top: 480, bottom: 1000 });
    }

    #[test]
    fn degenerate_spans_are_dropped() {
        // Two anchors on the same row, and one past the bottom edge.
        let spans = slice_spans(&[300, 300, 1500], 1000, 0);
        let kept: Vec<usize> = spans.iter().map(|(i, _)| *i).collect();
        assert_eq!(kept, vec![1]);
        assert_eq!(spans[0].1.height(), 700);
    }
}
