//! Deterministic output naming

use crate::encoder::OUTPUT_EXTENSION;

/// Suffix appended to every output stem
pub const DEFAULT_SUFFIX: &str = "_noBg";

/// Derives output names from input names
///
/// `photo.JPG` becomes `photo_noBg.png`: exactly one trailing extension is
/// stripped and the suffix plus `.png` appended. Duplicates are not resolved
/// here; the batch planner rejects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchNamer {
    suffix: String,
}

impl Default for BatchNamer {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_string(),
        }
    }
}

impl BatchNamer {
    #[must_use]
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    #[must_use]
    pub fn derive_name(&self, original_name: &str) -> String {
        let stem = original_name
            .rsplit_once('.')
            .map_or(original_name, |(stem, _)| stem);
        format!("{stem}{}.{OUTPUT_EXTENSION}", self.suffix)
    }
}

/// [`BatchNamer::derive_name`] with the default suffix
#[must_use]
pub fn derive_name(original_name: &str) -> String {
    BatchNamer::default().derive_name(original_name)
}
