//! Segmentation model catalogue and model file lookup

use crate::error::{NoBgError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable overriding the model directory
pub const MODEL_HOME_ENV: &str = "U2NET_HOME";

/// Directory under `$HOME` used when nothing else is configured
pub const DEFAULT_MODEL_DIR_NAME: &str = ".u2net";

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Supported segmentation models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ModelKind {
    /// General purpose
    #[default]
    #[serde(rename = "u2net")]
    #[cfg_attr(feature = "cli", value(name = "u2net"))]
    U2Net,
    /// Lightweight general purpose
    #[serde(rename = "u2netp")]
    #[cfg_attr(feature = "cli", value(name = "u2netp"))]
    U2NetP,
    /// Portrait-optimized
    #[serde(rename = "u2net_human_seg")]
    #[cfg_attr(feature = "cli", value(name = "u2net_human_seg"))]
    U2NetHumanSeg,
    /// Alternate general purpose
    #[serde(rename = "isnet-general-use")]
    #[cfg_attr(feature = "cli", value(name = "isnet-general-use"))]
    IsNetGeneralUse,
    /// Human-optimized, fast
    #[serde(rename = "silueta")]
    #[cfg_attr(feature = "cli", value(name = "silueta"))]
    Silueta,
}

impl ModelKind {
    pub const ALL: [Self; 5] = [
        Self::U2Net,
        Self::U2NetP,
        Self::U2NetHumanSeg,
        Self::IsNetGeneralUse,
        Self::Silueta,
    ];

    /// Selection token, also the model file stem
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Self::U2Net => "u2net",
            Self::U2NetP => "u2netp",
            Self::U2NetHumanSeg => "u2net_human_seg",
            Self::IsNetGeneralUse => "isnet-general-use",
            Self::Silueta => "silueta",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::U2Net => "General purpose (default)",
            Self::U2NetP => "Lightweight general purpose",
            Self::U2NetHumanSeg => "Optimized for portraits",
            Self::IsNetGeneralUse => "Alternate general purpose",
            Self::Silueta => "Human-optimized, fast",
        }
    }

    /// Side of the square network input
    #[must_use]
    pub fn input_size(self) -> u32 {
        match self {
            Self::IsNetGeneralUse => 1024,
            _ => 320,
        }
    }

    /// Per-channel normalization mean, RGB order
    #[must_use]
    pub fn mean(self) -> [f32; 3] {
        match self {
            Self::IsNetGeneralUse => [0.5, 0.5, 0.5],
            _ => IMAGENET_MEAN,
        }
    }

    /// Per-channel normalization standard deviation, RGB order
    #[must_use]
    pub fn std(self) -> [f32; 3] {
        match self {
            Self::IsNetGeneralUse => [1.0, 1.0, 1.0],
            _ => IMAGENET_STD,
        }
    }

    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.onnx", self.token())
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ModelKind {
    type Err = NoBgError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.token() == s.trim())
            .ok_or_else(|| {
                let tokens: Vec<_> = Self::ALL.iter().map(|k| k.token()).collect();
                NoBgError::invalid_config(format!(
                    "Unknown model '{s}'. Available models: {}",
                    tokens.join(", ")
                ))
            })
    }
}

/// Resolves where model files live on disk
///
/// Precedence: explicit directory, then `U2NET_HOME`, then `$HOME/.u2net`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLocator {
    models_dir: PathBuf,
}

impl ModelLocator {
    /// Locator rooted at a fixed directory
    #[must_use]
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    /// Resolve from an optional explicit directory and the process environment
    ///
    /// # Errors
    /// - No explicit directory, no `U2NET_HOME` and no home directory
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        Self::resolve_with(
            explicit,
            std::env::var_os(MODEL_HOME_ENV).map(PathBuf::from),
            dirs::home_dir(),
        )
    }

    pub(crate) fn resolve_with(
        explicit: Option<&Path>,
        env_dir: Option<PathBuf>,
        home_dir: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(dir) = explicit {
            return Ok(Self::new(dir));
        }

        if let Some(dir) = env_dir.filter(|d| !d.as_os_str().is_empty()) {
            log::debug!("Using model directory from {MODEL_HOME_ENV}: {}", dir.display());
            return Ok(Self::new(dir));
        }

        home_dir
            .map(|home| Self::new(home.join(DEFAULT_MODEL_DIR_NAME)))
            .ok_or_else(|| {
                NoBgError::invalid_config(format!(
                    "Failed to determine model directory. Set {MODEL_HOME_ENV} or pass --models-dir."
                ))
            })
    }

    #[must_use]
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    #[must_use]
    pub fn model_path(&self, kind: ModelKind) -> PathBuf {
        self.models_dir.join(kind.file_name())
    }

    #[must_use]
    pub fn is_available(&self, kind: ModelKind) -> bool {
        self.model_path(kind).is_file()
    }

    /// Path of an existing model file
    ///
    /// # Errors
    /// - [`NoBgError::Model`] when the file is missing
    pub fn require(&self, kind: ModelKind) -> Result<PathBuf> {
        let path = self.model_path(kind);
        if path.is_file() {
            Ok(path)
        } else {
            let place = format!("place {} in {}", kind.file_name(), self.models_dir.display());
            let env = format!("set {MODEL_HOME_ENV}");
            Err(NoBgError::model_error_with_context(
                "locate",
                &path,
                "file not found",
                &[place.as_str(), env.as_str(), "pass --models-dir"],
            ))
        }
    }
}

/// Format file size in human-readable format
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS.get(unit_index).unwrap_or(&"B");
    if unit_index == 0 {
        format!("{bytes} {unit}")
    } else {
        format!("{size:.1} {unit}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tokens_round_trip() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.token().parse::<ModelKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.token()));
        }
        assert!("u2net-large".parse::<ModelKind>().is_err());
        assert_eq!(ModelKind::default(), ModelKind::U2Net);
    }

    #[test]
    fn test_model_contract() {
        assert_eq!(ModelKind::U2Net.input_size(), 320);
        assert_eq!(ModelKind::Silueta.input_size(), 320);
        assert_eq!(ModelKind::IsNetGeneralUse.input_size(), 1024);
        assert_eq!(ModelKind::U2NetP.mean(), [0.485, 0.456, 0.406]);
        assert_eq!(ModelKind::IsNetGeneralUse.std(), [1.0, 1.0, 1.0]);
        assert_eq!(ModelKind::U2NetHumanSeg.file_name(), "u2net_human_seg.onnx");
    }

    #[test]
    fn test_locator_precedence() {
        let explicit = PathBuf::from("/opt/models");
        let env = Some(PathBuf::from("/env/models"));
        let home = Some(PathBuf::from("/home/user"));

        let locator = ModelLocator::resolve_with(Some(&explicit), env.clone(), home.clone()).unwrap();
        assert_eq!(locator.models_dir(), Path::new("/opt/models"));

        let locator = ModelLocator::resolve_with(None, env, home.clone()).unwrap();
        assert_eq!(locator.models_dir(), Path::new("/env/models"));

        let locator = ModelLocator::resolve_with(None, Some(PathBuf::new()), home).unwrap();
        assert_eq!(locator.models_dir(), Path::new("/home/user/.u2net"));

        assert!(ModelLocator::resolve_with(None, None, None).is_err());
    }

    #[test]
    fn test_require_reports_missing_model() {
        let temp_dir = TempDir::new().unwrap();
        let locator = ModelLocator::new(temp_dir.path());

        assert!(!locator.is_available(ModelKind::U2Net));
        let err = locator.require(ModelKind::U2Net).unwrap_err();
        assert!(matches!(err, NoBgError::Model(_)));
        assert!(err.to_string().contains("u2net.onnx"));

        std::fs::write(locator.model_path(ModelKind::U2Net), b"onnx").unwrap();
        assert!(locator.is_available(ModelKind::U2Net));
        assert_eq!(
            locator.require(ModelKind::U2Net).unwrap(),
            temp_dir.path().join("u2net.onnx")
        );
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(176 * 1024 * 1024), "176.0 MB");
    }
}
