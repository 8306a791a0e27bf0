//! Isolate magenta question numbers before OCR.
//!
//! The source workbooks print question numbers in magenta. Masking every
//! other colour away and binarising leaves white numerals on black, which
//! tesseract reads far more reliably than the raw margin with its rules,
//! page furniture and body text.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::{threshold, ThresholdType};

/// Inclusive per-channel RGB bounds of the number colour.
pub const MAGENTA_LOWER: [u8; 3] = [200, 0, 200];
pub const MAGENTA_UPPER: [u8; 3] = [255, 80, 255];

/// Gray level above which a pixel becomes white.
pub const BINARY_THRESHOLD: u8 = 100;

fn in_range(px: &Rgb<u8>, lower: [u8; 3], upper: [u8; 3]) -> bool {
    (0..3).all(|c| lower[c] <= px[c] && px[c] <= upper[c])
}

/// Zero every pixel outside the colour range.
pub fn mask_color(img: &RgbImage, lower: [u8; 3], upper: [u8; 3]) -> RgbImage {
    let mut out = img.clone();
    for px in out.pixels_mut() {
        if !in_range(px, lower, upper) {
            *px = Rgb([0, 0, 0]);
        }
    }
    out
}

/// BT.601 luma, rounded. Pure magenta must land above [`BINARY_THRESHOLD`].
fn luma_601(px: &Rgb<u8>) -> u8 {
    let [r, g, b] = px.0.map(u32::from);
    ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
}

/// Magenta mask → grayscale → binary threshold.
pub fn isolate_numbers(img: &RgbImage) -> GrayImage {
    let masked = mask_color(img, MAGENTA_LOWER, MAGENTA_UPPER);
    let gray = GrayImage::from_fn(masked.width(), masked.height(), |x, y| {
        Luma([luma_601(masked.get_pixel(x, y))])
    });
    threshold(&gray, BINARY_THRESHOLD, ThresholdType::Binary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magenta_survives_and_everything_else_goes_black() {
        let mut img = RgbImage::from_pixel(3, 1, Rgb([0, 0, 0]));
        img.put_pixel(0, 0, Rgb([230, 40, 230])); // number ink
        img.put_pixel(1, 0, Rgb([20, 20, 20])); // body text
        img.put_pixel(2, 0, Rgb([255, 255, 255])); // paper

        let bin = isolate_numbers(&img);
        assert_eq!(bin.get_pixel(0, 0)[0], 255);
        assert_eq!(bin.get_pixel(1, 0)[0], 0);
        assert_eq!(bin.get_pixel(2, 0)[0], 0);
    }

    #[test]
    fn saturated_magenta_clears_the_threshold() {
        let mut img = RgbImage::new(3, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 255]));
        img.put_pixel(1, 0, Rgb([230, 40, 230]));
        img.put_pixel(2, 0, Rgb([255, 20, 230]));

        assert_eq!(luma_601(&Rgb([255, 0, 255])), 105);
        let bin = isolate_numbers(&img);
        for x in 0..3 {
            assert_eq!(bin.get_pixel(x, 0)[0], 255, "pixel {x} should be white");
        }
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let edge = Rgb([200, 80, 255]);
        assert!(in_range(&edge, MAGENTA_LOWER, MAGENTA_UPPER));
        let green_too_high = Rgb([220, 81, 220]);
        assert!(!in_range(&green_too_high, MAGENTA_LOWER, MAGENTA_UPPER));
    }

    #[test]
    fn mask_keeps_dimensions() {
        let img = RgbImage::new(17, 9);
        let bin = isolate_numbers(&img);
        assert_eq!(bin.dimensions(), (17, 9));
    }
}
