//! Data types flowing through the finishing pipeline

use image::DynamicImage;
use serde::Serialize;
use std::path::PathBuf;

/// An encoded, named result ready to be written or archived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputItem {
    name: String,
    bytes: Vec<u8>,
}

impl OutputItem {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Split into name and bytes
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.name, self.bytes)
    }
}

/// Where the pixels of a batch input come from
#[derive(Debug, Clone)]
pub enum InputSource {
    /// Read and decode the file at this path
    Path(PathBuf),
    /// Decode these encoded bytes (uploads, stdin)
    Bytes(Vec<u8>),
    /// Already decoded image; skips the format gate
    Image(DynamicImage),
}

/// One entry of a batch: the identifier used for naming plus its pixel source
#[derive(Debug, Clone)]
pub struct BatchInput {
    /// Input identifier, usually the file name (`photo.jpg`)
    pub name: String,
    pub source: InputSource,
}

impl BatchInput {
    /// Input read from disk, named after the file name component of `path`
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            name,
            source: InputSource::Path(path),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            source: InputSource::Bytes(bytes),
        }
    }

    pub fn from_image(name: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            name: name.into(),
            source: InputSource::Image(image),
        }
    }
}

/// Stage of per-item processing, used to attribute failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    /// Reading and decoding the input
    Decode,
    /// Running the segmentation gateway
    Segmentation,
    /// Flattening onto the background color
    Compositing,
    /// Serializing to PNG
    Encoding,
}

impl ProcessingStage {
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Decode => "decoding input",
            Self::Segmentation => "segmenting foreground",
            Self::Compositing => "compositing background",
            Self::Encoding => "encoding PNG",
        }
    }
}

/// A recorded per-item failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// Position of the item in the batch (0-based)
    pub index: usize,
    pub name: String,
    pub stage: ProcessingStage,
    pub error: String,
}

/// End-of-run summary of a batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
    /// Output names in processing order
    pub outputs: Vec<String>,
    pub elapsed_ms: u64,
}

impl BatchReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// One-line end-of-run summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Processed {} image(s), {} failed, in {:.2}s",
            self.succeeded,
            self.failed,
            self.elapsed_ms as f64 / 1000.0
        )
    }

    pub(crate) fn record_success(&mut self, name: &str) {
        self.succeeded += 1;
        self.outputs.push(name.to_string());
    }

    pub(crate) fn record_failure(&mut self, failure: ItemFailure) {
        self.failed += 1;
        self.failures.push(failure);
    }
}
