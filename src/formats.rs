//! Input format allow-list
//!
//! Every input is checked here before it can reach the segmentation gateway.

use crate::error::{NoBgError, Result};
use image::ImageFormat;
use std::fmt;
use std::path::Path;

/// Extensions accepted as input, lowercase
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tiff", "tif"];

/// Raster encodings accepted as input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Jpeg,
    Png,
    WebP,
    Bmp,
    /// Multi-page; only the first page is processed
    Tiff,
}

impl InputFormat {
    /// Map a file extension (without the dot, any case) to a supported format
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "bmp" => Some(Self::Bmp),
            "tiff" | "tif" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Gate an input by name: the text after the last `.` must be allow-listed
    pub fn from_name(name: &str) -> Result<Self> {
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .ok_or_else(|| {
                NoBgError::unsupported_format(format!("'{name}' has no file extension"))
            })?;

        Self::from_extension(extension).ok_or_else(|| {
            NoBgError::unsupported_format(format!(
                ".{extension} (supported: {})",
                SUPPORTED_EXTENSIONS.join(", ")
            ))
        })
    }

    /// Gate an input by path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_name(&name)
    }

    /// Detect the format from leading magic bytes
    #[must_use]
    pub fn detect(data: &[u8]) -> Option<Self> {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.get(0..8) == Some(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.get(0..3) == Some(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.get(0..4) == Some(b"RIFF") && data.get(8..12) == Some(b"WEBP") {
            return Some(Self::WebP);
        }

        // TIFF, little and big endian
        if data.get(0..4) == Some(&[0x49, 0x49, 0x2A, 0x00])
            || data.get(0..4) == Some(&[0x4D, 0x4D, 0x00, 0x2A])
        {
            return Some(Self::Tiff);
        }

        // BMP: "BM"
        if data.len() >= 4 && data.get(0..2) == Some(b"BM") {
            return Some(Self::Bmp);
        }

        None
    }

    /// Whether a path carries an allow-listed extension
    #[must_use]
    pub fn is_supported_path<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .is_some()
    }

    #[must_use]
    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
            Self::Bmp => ImageFormat::Bmp,
            Self::Tiff => ImageFormat::Tiff,
        }
    }

    /// Canonical extension, used when naming stdin input
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::WebP => "WebP",
            Self::Bmp => "BMP",
            Self::Tiff => "TIFF",
        })
    }
}

/// Decode bytes whose format was already gated
///
/// Tries the declared format first and falls back to content sniffing, so a
/// PNG saved with a `.jpg` extension still loads.
pub fn decode_input(bytes: &[u8], declared: InputFormat) -> Result<image::DynamicImage> {
    match image::load_from_memory_with_format(bytes, declared.image_format()) {
        Ok(image) => Ok(image),
        Err(declared_err) => {
            log::debug!(
                "Decoding as {declared} failed: {declared_err}. Attempting content-based detection."
            );
            image::load_from_memory(bytes).map_err(|_| NoBgError::Image(declared_err))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_accepts_allow_list_case_insensitively() {
        assert_eq!(InputFormat::from_name("photo.JPG").unwrap(), InputFormat::Jpeg);
        assert_eq!(InputFormat::from_name("a.jpeg").unwrap(), InputFormat::Jpeg);
        assert_eq!(InputFormat::from_name("a.Png").unwrap(), InputFormat::Png);
        assert_eq!(InputFormat::from_name("a.webp").unwrap(), InputFormat::WebP);
        assert_eq!(InputFormat::from_name("a.bmp").unwrap(), InputFormat::Bmp);
        assert_eq!(InputFormat::from_name("scan.tif").unwrap(), InputFormat::Tiff);
        assert_eq!(InputFormat::from_name("my.file.tiff").unwrap(), InputFormat::Tiff);
    }

    #[test]
    fn test_from_name_rejects_others() {
        for name in ["anim.gif", "doc.pdf", "noext", "archive.png.zip"] {
            let err = InputFormat::from_name(name).unwrap_err();
            assert!(
                matches!(err, NoBgError::UnsupportedFormat(_)),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_is_supported_path() {
        assert!(InputFormat::is_supported_path(Path::new("/x/y/img.webp")));
        assert!(!InputFormat::is_supported_path(Path::new("/x/y/notes.txt")));
        assert!(!InputFormat::is_supported_path(Path::new("/x/y/README")));
    }

    #[test]
    fn test_detect_magic_bytes() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(InputFormat::detect(&png), Some(InputFormat::Png));

        assert_eq!(
            InputFormat::detect(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(InputFormat::Jpeg)
        );

        let webp = [
            0x52, 0x49, 0x46, 0x46, 0x00, 0x00, 0x00, 0x00, 0x57, 0x45, 0x42, 0x50,
        ];
        assert_eq!(InputFormat::detect(&webp), Some(InputFormat::WebP));

        assert_eq!(
            InputFormat::detect(&[0x49, 0x49, 0x2A, 0x00]),
            Some(InputFormat::Tiff)
        );
        assert_eq!(
            InputFormat::detect(&[0x4D, 0x4D, 0x00, 0x2A]),
            Some(InputFormat::Tiff)
        );
        assert_eq!(
            InputFormat::detect(&[0x42, 0x4D, 0x00, 0x00]),
            Some(InputFormat::Bmp)
        );

        // GIF is decodable by image but not allow-listed
        assert_eq!(InputFormat::detect(b"GIF89a"), None);
        assert_eq!(InputFormat::detect(&[]), None);
        assert_eq!(InputFormat::detect(&[0x89, 0x50]), None);
    }

    #[test]
    fn test_decode_input_falls_back_to_content() {
        let image = image::DynamicImage::new_rgb8(3, 2);
        let mut png = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        // Declared JPEG, actually PNG
        let decoded = decode_input(&png, InputFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));

        assert!(decode_input(b"not an image", InputFormat::Png).is_err());
    }
}
