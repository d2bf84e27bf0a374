//! Image encoding: `DynamicImage` → PNG bytes, and base64 PNG wrapped in `ImageData`.
//!
//! VLM APIs (OpenAI, Anthropic, Gemini) accept images as base64 data-URIs
//! embedded in the JSON request body. PNG is lossless, so axis labels and
//! small legend text reach the model as crisp as they were uploaded.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a chart as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode a chart as a base64 PNG ready for the VLM API.
///
/// `detail: "high"` asks GPT-4-class models for the full tile budget; tick
/// labels and legends are unreadable in the single low-detail tile.
pub fn encode_chart(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let png = encode_png(img)?;
    let b64 = STANDARD.encode(&png);
    debug!("Encoded chart → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_chart() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_chart(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert!(decoded.starts_with(b"\x89PNG"));
    }

    #[test]
    fn png_round_trips_dimensions() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(7, 3));
        let png = encode_png(&img).unwrap();
        let back = image::load_from_memory(&png).unwrap();
        assert_eq!((back.width(), back.height()), (7, 3));
    }
}
