//! Configuration types for the finishing pipeline

use crate::archive::DEFAULT_ARCHIVE_NAME;
use crate::color::BackgroundColor;
use crate::encoder::PngCompression;
use crate::error::{NoBgError, Result};
use crate::models::{ModelKind, ModelLocator};
use crate::naming::{BatchNamer, DEFAULT_SUFFIX};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings shared by every item of a run
///
/// Loadable from JSON; any field may be omitted and falls back to its default.
///
/// ```json
/// { "model": "isnet-general-use", "background": "#ffffff", "compression": "best" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Segmentation model
    pub model: ModelKind,

    /// Background color applied to every output; `None` keeps transparency
    pub background: Option<BackgroundColor>,

    /// PNG compression effort
    pub compression: PngCompression,

    /// Token appended to output stems
    pub suffix: String,

    /// File name of the batch archive
    pub archive_name: String,

    /// Directory holding `<model>.onnx` files
    pub models_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::default(),
            background: None,
            compression: PngCompression::default(),
            suffix: DEFAULT_SUFFIX.to_string(),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            models_dir: None,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load and validate a JSON configuration file
    ///
    /// # Errors
    /// - File cannot be read
    /// - Invalid JSON or unknown fields
    /// - Values fail [`PipelineConfig::validate`]
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(NoBgError::InputNotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| NoBgError::file_io_error("read config", path, &e))?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            NoBgError::invalid_config(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for invalid values
    ///
    /// # Errors
    /// - Empty suffix, or a suffix containing a path separator
    /// - Archive name without a `.zip` extension or containing a path separator
    pub fn validate(&self) -> Result<()> {
        if self.suffix.is_empty() {
            return Err(NoBgError::invalid_config("suffix must not be empty"));
        }
        if self.suffix.contains(['/', '\\']) {
            return Err(NoBgError::invalid_config(format!(
                "suffix '{}' must not contain path separators",
                self.suffix
            )));
        }

        let lower = self.archive_name.to_ascii_lowercase();
        if lower.len() <= ".zip".len() || !lower.ends_with(".zip") {
            return Err(NoBgError::invalid_config(format!(
                "archive name '{}' must end in .zip",
                self.archive_name
            )));
        }
        if self.archive_name.contains(['/', '\\']) {
            return Err(NoBgError::invalid_config(format!(
                "archive name '{}' must not contain path separators",
                self.archive_name
            )));
        }

        Ok(())
    }

    #[must_use]
    pub fn namer(&self) -> BatchNamer {
        BatchNamer::new(self.suffix.clone())
    }

    /// Model directory resolved from `models_dir` and the environment
    ///
    /// # Errors
    /// - No directory could be determined
    pub fn model_locator(&self) -> Result<ModelLocator> {
        ModelLocator::resolve(self.models_dir.as_deref())
    }
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Start from an existing configuration (e.g. one loaded from a file)
    #[must_use]
    pub fn from_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn model(mut self, model: ModelKind) -> Self {
        self.config.model = model;
        self
    }

    #[must_use]
    pub fn background(mut self, background: Option<BackgroundColor>) -> Self {
        self.config.background = background;
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: PngCompression) -> Self {
        self.config.compression = compression;
        self
    }

    #[must_use]
    pub fn suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.config.suffix = suffix.into();
        self
    }

    #[must_use]
    pub fn archive_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.archive_name = name.into();
        self
    }

    #[must_use]
    pub fn models_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.models_dir = Some(dir.into());
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Any check of [`PipelineConfig::validate`] fails
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
