//! Error types for the finishing pipeline

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, NoBgError>;

/// How an error propagates through a run
///
/// Configuration and resource errors abort the whole run. Per-item errors are
/// recorded against the failing item and the batch continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad input path, unsupported extension, bad color value, bad config
    Configuration,
    /// A single image failed to decode, segment, composite or encode
    PerItem,
    /// Output could not be created or written
    Resource,
}

impl ErrorCategory {
    /// Whether an error of this category ends the run
    #[must_use]
    pub fn is_fatal(self) -> bool {
        !matches!(self, Self::PerItem)
    }

    /// Process exit code the CLI reports for a run ending in this category
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Self::PerItem => 1,
            Self::Configuration => 2,
            Self::Resource => 3,
        }
    }
}

/// Error types for background finishing operations
#[derive(Error, Debug)]
pub enum NoBgError {
    /// Input/output errors (permission denied, disk full, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors from the image crate
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Archive container errors
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Input path does not exist
    #[error("Input path not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// Input encoding outside the supported allow-list
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Background color could not be parsed
    #[error("Invalid background color '{0}': expected #RRGGBB, #RGB, a color name, or 'none'")]
    InvalidColor(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two inputs map to the same output name within one batch
    #[error("Output name collision: '{name}' would be produced more than once")]
    NameCollision { name: String },

    /// Model file missing or session creation failed
    #[error("Model error: {0}")]
    Model(String),

    /// The segmentation gateway failed for one image
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    /// Compositing was asked to flatten an image without alpha
    #[error("Compositor requires an alpha-bearing input.")]
    MissingAlpha,

    /// Encoding a finished image failed
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl NoBgError {
    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new segmentation error
    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(msg.into())
    }

    /// Create a new encoding error
    pub fn encoding<S: Into<String>>(msg: S) -> Self {
        Self::Encoding(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Create model error with troubleshooting context
    pub fn model_error_with_context<P: AsRef<Path>>(
        operation: &str,
        model_path: P,
        error: &str,
        suggestions: &[&str],
    ) -> Self {
        let suggestion_text = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" Suggestions: {}", suggestions.join(", "))
        };

        Self::Model(format!(
            "Failed to {} model '{}': {}.{}",
            operation,
            model_path.as_ref().display(),
            error,
            suggestion_text
        ))
    }

    /// Propagation category of this error
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InputNotFound(_)
            | Self::UnsupportedFormat(_)
            | Self::InvalidColor(_)
            | Self::InvalidConfig(_)
            | Self::NameCollision { .. }
            | Self::Model(_) => ErrorCategory::Configuration,
            Self::Image(_) | Self::Segmentation(_) | Self::MissingAlpha | Self::Encoding(_) => {
                ErrorCategory::PerItem
            },
            Self::Io(_) | Self::Archive(_) => ErrorCategory::Resource,
        }
    }
}
