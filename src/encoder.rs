//! Lossless PNG encoding of finished images

use crate::error::{NoBgError, Result};
use image::codecs::png::{CompressionType, FilterType, PngEncoder as ImagePngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Extension of every encoded output
pub const OUTPUT_EXTENSION: &str = "png";

/// zlib effort used for PNG output
///
/// Only affects file size and speed, never decoded pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    /// Fastest encoding, largest files
    #[default]
    Fast,
    /// Balanced
    Default,
    /// Smallest files, slowest encoding
    Best,
}

impl PngCompression {
    fn compression_type(self) -> CompressionType {
        match self {
            Self::Fast => CompressionType::Fast,
            Self::Default => CompressionType::Default,
            Self::Best => CompressionType::Best,
        }
    }
}

impl fmt::Display for PngCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fast => "fast",
            Self::Default => "default",
            Self::Best => "best",
        })
    }
}

/// PNG encoder for finished images
#[derive(Debug, Clone, Copy, Default)]
pub struct PngEncoder {
    compression: PngCompression,
}

impl PngEncoder {
    #[must_use]
    pub fn new(compression: PngCompression) -> Self {
        Self { compression }
    }

    #[must_use]
    pub fn compression(&self) -> PngCompression {
        self.compression
    }

    /// Serialize an image to PNG bytes
    ///
    /// RGB8 and RGBA8 are written as-is. Other layouts are normalized to RGBA8
    /// when they carry alpha and to RGB8 otherwise.
    pub fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let (width, height) = (image.width(), image.height());
        let mut buffer = Vec::new();
        let encoder = ImagePngEncoder::new_with_quality(
            &mut buffer,
            self.compression.compression_type(),
            FilterType::Adaptive,
        );

        let result = match image {
            DynamicImage::ImageRgb8(rgb) => {
                encoder.write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
            },
            DynamicImage::ImageRgba8(rgba) => {
                encoder.write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
            },
            other if other.color().has_alpha() => {
                log::debug!("Normalizing {:?} to RGBA8 for PNG output", other.color());
                let rgba = other.to_rgba8();
                encoder.write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
            },
            other => {
                log::debug!("Normalizing {:?} to RGB8 for PNG output", other.color());
                let rgb = other.to_rgb8();
                encoder.write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
            },
        };

        result.map_err(|e| NoBgError::encoding(format!("PNG encoding failed: {e}")))?;

        log::trace!(
            "Encoded {}x{} PNG ({} bytes, compression {})",
            width,
            height,
            buffer.len(),
            self.compression
        );
        Ok(buffer)
    }
}

/// Decode PNG bytes back into an image
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory_with_format(
        bytes,
        image::ImageFormat::Png,
    )?)
}
