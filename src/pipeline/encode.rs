//! Image encoding: question crop on disk → base64 `ImageData`.
//!
//! Crops are already PNG files, so the bytes are sent as-is rather than
//! decoded and re-encoded. `detail: "high"` keeps small print and table
//! rules legible to GPT-4-class models.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::path::Path;
use tracing::debug;

/// MIME type for an image path, by extension. Unknown extensions are PNG.
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// Wrap raw image bytes for the multimodal request body.
pub fn encode_image_bytes(bytes: &[u8], mime_type: &str) -> ImageData {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} bytes → {} bytes base64", bytes.len(), b64.len());
    ImageData::new(b64, mime_type).with_detail("high")
}

/// Read and encode an image file.
pub fn encode_image_file(path: &Path) -> std::io::Result<ImageData> {
    let bytes = std::fs::read(path)?;
    Ok(encode_image_bytes(&bytes, mime_for_path(path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for_path(Path::new("01.png")), "image/png");
        assert_eq!(mime_for_path(Path::new("scan.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("scan.jpeg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("noext")), "image/png");
    }

    #[test]
    fn encodes_png_file_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("07.png");
        RgbImage::from_pixel(8, 4, Rgb([255, 0, 255])).save(&path).unwrap();

        let data = encode_image_file(&path).unwrap();
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).unwrap();
        assert_eq!(decoded, std::fs::read(&path).unwrap());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(encode_image_file(Path::new("/no/such/01.png")).is_err());
    }
}
