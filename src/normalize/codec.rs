//! WebP transcoder.
//!
//! Decodes an uploaded image in any supported format, shrinks it to fit a
//! bounding box, and re-encodes it as lossy WebP.
//!
//! # Design Decisions
//!
//! - **Shrink only**: images already inside the bounding box keep their size.
//!   The resize is a thumbnail (fit inside), never a crop.
//!
//! - **Format sniffing**: the input format is guessed from the bytes, not the
//!   file name, so a mislabeled upload still decodes.
//!
//! - **Size-optimized encoding**: libwebp runs with method 6 (slowest, smallest
//!   output) at the configured quality.

use std::io::Cursor;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};

use super::policy::NormalizePolicy;
use crate::error::NormalizeError;

/// Default WebP quality (1-100).
pub const DEFAULT_WEBP_QUALITY: u8 = 90;

/// Minimum allowed WebP quality.
pub const MIN_WEBP_QUALITY: u8 = 1;

/// Maximum allowed WebP quality.
pub const MAX_WEBP_QUALITY: u8 = 100;

/// libwebp compression method (0 = fastest, 6 = smallest output).
const WEBP_METHOD: i32 = 6;

// =============================================================================
// Encoded Output
// =============================================================================

/// Result of a successful transcode.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// WebP bytes
    pub data: Bytes,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,
}

// =============================================================================
// Transcoder
// =============================================================================

/// Decode → bounding-box downscale → WebP encode.
///
/// # Example
///
/// ```ignore
/// use stac_media::normalize::WebpTranscoder;
///
/// let transcoder = WebpTranscoder::new(720, 1080, 90);
/// let encoded = transcoder.transcode("images/Alumni/pic1.png", &upload)?;
/// assert!(encoded.width <= 720 && encoded.height <= 1080);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebpTranscoder {
    max_width: u32,
    max_height: u32,
    quality: u8,
}

impl WebpTranscoder {
    /// Create a transcoder for the given bounding box and quality.
    ///
    /// Quality is clamped to 1-100.
    pub fn new(max_width: u32, max_height: u32, quality: u8) -> Self {
        Self {
            max_width: max_width.max(1),
            max_height: max_height.max(1),
            quality: clamp_quality(quality),
        }
    }

    /// Create a transcoder from a normalization policy.
    pub fn from_policy(policy: &NormalizePolicy) -> Self {
        let settings = policy.settings();
        Self::new(settings.max_width, settings.max_height, settings.quality)
    }

    /// Decode source bytes into an image.
    ///
    /// `path` is only used for error context.
    pub fn decode(&self, path: &str, source: &[u8]) -> Result<DynamicImage, NormalizeError> {
        let decode_error = |message: String| NormalizeError::DecodeError {
            path: path.to_string(),
            message,
        };

        let reader = ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| decode_error(e.to_string()))?;

        if reader.format().is_none() {
            return Err(decode_error("unrecognized image format".to_string()));
        }

        reader.decode().map_err(|e| decode_error(e.to_string()))
    }

    /// Decode, shrink to the bounding box, and encode as WebP.
    ///
    /// # Errors
    ///
    /// - `NormalizeError::DecodeError` if the source is not a decodable image
    /// - `NormalizeError::EncodeError` if libwebp rejects the pixels
    pub fn transcode(&self, path: &str, source: &[u8]) -> Result<EncodedImage, NormalizeError> {
        let img = self.decode(path, source)?;
        let img = self.shrink(img);
        let (width, height) = (img.width(), img.height());

        let encoded = if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            encode_webp(
                webp::Encoder::from_rgba(rgba.as_raw(), width, height),
                self.quality,
            )
        } else {
            let rgb = img.to_rgb8();
            encode_webp(
                webp::Encoder::from_rgb(rgb.as_raw(), width, height),
                self.quality,
            )
        };

        let data = encoded.map_err(|message| NormalizeError::EncodeError {
            path: path.to_string(),
            message,
        })?;

        Ok(EncodedImage {
            data: Bytes::from(data),
            width,
            height,
        })
    }

    /// Shrink an image so it fits the bounding box. Smaller images pass through.
    pub fn shrink(&self, img: DynamicImage) -> DynamicImage {
        let (width, height) = fit_within(img.width(), img.height(), self.max_width, self.max_height);
        if width == img.width() && height == img.height() {
            img
        } else {
            img.resize_exact(width, height, FilterType::CatmullRom)
        }
    }

    /// Get image dimensions without fully decoding.
    pub fn dimensions(&self, path: &str, source: &[u8]) -> Result<(u32, u32), NormalizeError> {
        ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| e.to_string())
            .and_then(|reader| reader.into_dimensions().map_err(|e| e.to_string()))
            .map_err(|message| NormalizeError::DecodeError {
                path: path.to_string(),
                message,
            })
    }
}

fn encode_webp(encoder: webp::Encoder<'_>, quality: u8) -> Result<Vec<u8>, String> {
    let mut config = webp::WebPConfig::new()
        .map_err(|_| "failed to initialise libwebp config".to_string())?;
    config.lossless = 0;
    config.quality = f32::from(quality);
    config.method = WEBP_METHOD;

    let memory = encoder
        .encode_advanced(&config)
        .map_err(|e| format!("libwebp encoding failed: {:?}", e))?;

    Ok(memory.to_vec())
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Compute the size of an image scaled down to fit inside a bounding box.
///
/// Aspect ratio is preserved within rounding; images that already fit are
/// returned unchanged. Each side is at least one pixel.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let scale = (f64::from(max_width) / f64::from(width))
        .min(f64::from(max_height) / f64::from(height));

    let new_width = (f64::from(width) * scale).round() as u32;
    let new_height = (f64::from(height) * scale).round() as u32;

    (
        new_width.clamp(1, max_width.max(1)),
        new_height.clamp(1, max_height.max(1)),
    )
}

/// Validate WebP quality parameter.
///
/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_WEBP_QUALITY..=MAX_WEBP_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_WEBP_QUALITY, MAX_WEBP_QUALITY)
}

/// Returns true if `data` starts with a RIFF/WEBP container header.
pub fn is_webp(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

// =============================================================================
// Tests
// =============================================================================
