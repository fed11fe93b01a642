//! Image Normalizer
//! Converts camera frames and uploaded files into a bounded-size JPEG
//! data-URI before they enter a draft's image sequence.

use base64::Engine;
use image::imageops::FilterType;
use image::codecs::jpeg::JpegEncoder;
use std::io::Cursor;
use thiserror::Error;

/// Longest edge after normalization. Images already within the bound keep
/// their dimensions (re-encoding only, never upscaling).
pub const MAX_LONG_EDGE: u32 = 1280;

/// Fixed JPEG quality so identical input yields identical output.
pub const JPEG_QUALITY: u8 = 80;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("not a valid data-URI")]
    InvalidDataUri,
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
}

// ========================================
// Data-URI
// ========================================

/// Self-describing image payload: MIME type plus raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Result<Self, MediaError> {
        let mime = mime.into();
        if !mime.starts_with("image/") {
            return Err(MediaError::UnsupportedMediaType(mime));
        }
        Ok(Self { mime, bytes })
    }

    /// Parse a `data:image/...;base64,...` string.
    pub fn from_data_uri(uri: &str) -> Result<Self, MediaError> {
        let rest = uri.strip_prefix("data:").ok_or(MediaError::InvalidDataUri)?;
        let (meta, payload) = rest.split_once(',').ok_or(MediaError::InvalidDataUri)?;
        let mime = meta
            .strip_suffix(";base64")
            .ok_or(MediaError::InvalidDataUri)?;
        if !mime.starts_with("image/") {
            return Err(MediaError::UnsupportedMediaType(mime.to_string()));
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|_| MediaError::InvalidDataUri)?;
        Ok(Self {
            mime: mime.to_string(),
            bytes,
        })
    }

    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

// ========================================
// Normalizer
// ========================================

/// Target dimensions for a given source size. Downscales so the longer
/// edge equals `bound`, preserving aspect ratio; never upscales.
pub fn bounded_dimensions(width: u32, height: u32, bound: u32) -> (u32, u32) {
    let long = width.max(height);
    if long <= bound {
        return (width, height);
    }
    let scale = bound as f64 / long as f64;
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    if width >= height {
        (bound, h)
    } else {
        (w, bound)
    }
}

/// Resize + re-encode one image to the transportable representation.
/// Output is always JPEG regardless of input format.
pub fn normalize(payload: &ImagePayload) -> Result<ImagePayload, MediaError> {
    let img = image::ImageReader::new(Cursor::new(&payload.bytes))
        .with_guessed_format()
        .map_err(|e| MediaError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| MediaError::Decode(e.to_string()))?;

    let (w, h) = (img.width(), img.height());
    let (tw, th) = bounded_dimensions(w, h, MAX_LONG_EDGE);
    let resized = if (tw, th) == (w, h) {
        img
    } else {
        img.resize_exact(tw, th, FilterType::Lanczos3)
    };

    // JPEG has no alpha channel
    let rgb = resized.to_rgb8();
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| MediaError::Encode(e.to_string()))?;

    Ok(ImagePayload {
        mime: "image/jpeg".to_string(),
        bytes: buf,
    })
}

/// Normalize a data-URI string end to end.
pub fn normalize_data_uri(uri: &str) -> Result<String, MediaError> {
    let payload = ImagePayload::from_data_uri(uri)?;
    Ok(normalize(&payload)?.to_data_uri())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn png_payload(width: u32, height: u32) -> ImagePayload {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([200, 30, 30]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        ImagePayload {
            mime: "image/png".to_string(),
            bytes: buf,
        }
    }

    fn decoded_dimensions(payload: &ImagePayload) -> (u32, u32) {
        let img = image::load_from_memory(&payload.bytes).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn bounded_dimensions_downscales_long_edge_to_bound() {
        assert_eq!(bounded_dimensions(4000, 2000, 1280), (1280, 640));
        assert_eq!(bounded_dimensions(2000, 4000, 1280), (640, 1280));
        // Aspect within rounding
        let (w, h) = bounded_dimensions(3001, 2000, 1280);
        assert_eq!(w, 1280);
        assert_eq!(h, 853);
    }

    #[test]
    fn bounded_dimensions_never_upscales() {
        assert_eq!(bounded_dimensions(640, 480, 1280), (640, 480));
        assert_eq!(bounded_dimensions(1280, 720, 1280), (1280, 720));
        assert_eq!(bounded_dimensions(1, 1, 1280), (1, 1));
    }

    #[test]
    fn normalize_resizes_oversized_image() {
        let out = normalize(&png_payload(2560, 1440)).unwrap();
        assert_eq!(out.mime, "image/jpeg");
        assert_eq!(decoded_dimensions(&out), (1280, 720));
    }

    #[test]
    fn normalize_keeps_small_image_dimensions() {
        let out = normalize(&png_payload(320, 240)).unwrap();
        assert_eq!(decoded_dimensions(&out), (320, 240));
    }

    #[test]
    fn normalize_is_deterministic() {
        let payload = png_payload(2000, 1000);
        let a = normalize(&payload).unwrap();
        let b = normalize(&payload).unwrap();
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn data_uri_round_trip() {
        let payload = png_payload(20, 20);
        let uri = payload.to_data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));
        let back = ImagePayload::from_data_uri(&uri).unwrap();
        assert_eq!(back.bytes, payload.bytes);
    }

    #[test]
    fn non_image_mime_is_rejected() {
        let err = ImagePayload::from_data_uri("data:text/plain;base64,aGVsbG8=").unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedMediaType(_)));
        assert!(ImagePayload::new("application/pdf", vec![]).is_err());
    }

    #[test]
    fn malformed_data_uri_is_rejected() {
        assert!(ImagePayload::from_data_uri("nonsense").is_err());
        assert!(ImagePayload::from_data_uri("data:image/png,missing-base64").is_err());
        assert!(ImagePayload::from_data_uri("data:image/png;base64,!!!").is_err());
    }
}
