#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # nobg
//!
//! Background removal finishing pipeline. A segmentation gateway turns each
//! input into an RGBA cutout; the pipeline then optionally flattens it onto a
//! solid color, encodes it as lossless PNG under a derived `<stem>_noBg.png`
//! name and hands it to an output sink. Finished batches can be packaged into
//! a single ZIP archive.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nobg::{BatchInput, DirectorySink, FinishingPipeline, ModelLocator, OnnxSegmenter, PipelineConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = PipelineConfig::builder()
//!     .background(Some("#ffffff".parse()?))
//!     .build()?;
//!
//! // Load the model once; the pipeline borrows it for every item
//! let mut gateway = OnnxSegmenter::load(config.model, &config.model_locator()?)?;
//! let mut pipeline = FinishingPipeline::new(&mut gateway, config)?;
//!
//! let inputs = vec![BatchInput::from_path("photo.jpg"), BatchInput::from_path("cat.png")];
//! let mut sink = DirectorySink::create("out").await?;
//! let outcome = pipeline.run(&inputs, &mut sink).await?;
//!
//! println!("{} finished, {} failed", outcome.report.succeeded, outcome.report.failed);
//! std::fs::write("out/removed_backgrounds.zip", outcome.archive()?)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime segmentation gateway for U2-Net family models
//! - `cli` (default): Command-line interface and progress bars
//! - `webp-support` (default): WebP input decoding
//! - `tracing-json`: JSON log output for the CLI
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! nobg = { version = "0.1", default-features = false, features = ["onnx"] }
//! ```
//!
//! Custom segmentation backends implement [`SegmentationGateway`].

pub mod archive;
pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod color;
pub mod compositor;
pub mod config;
pub mod encoder;
pub mod error;
pub mod formats;
pub mod models;
pub mod naming;
pub mod pipeline;
pub mod segmentation;
pub mod services;
pub mod session;
pub mod tracing_config;
pub mod types;

// Public API exports
#[cfg(feature = "onnx")]
pub use backends::OnnxSegmenter;
pub use archive::{build_archive, DEFAULT_ARCHIVE_NAME};
pub use color::{parse_background, BackgroundColor};
pub use compositor::composite;
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use encoder::{PngCompression, PngEncoder, OUTPUT_EXTENSION};
pub use error::{ErrorCategory, NoBgError, Result};
pub use formats::{InputFormat, SUPPORTED_EXTENSIONS};
pub use models::{format_size, ModelKind, ModelLocator};
pub use naming::{derive_name, BatchNamer, DEFAULT_SUFFIX};
pub use pipeline::{load_input, BatchOutcome, FinishingPipeline};
pub use segmentation::SegmentationGateway;
pub use services::{
    ConsoleProgressReporter, DirectorySink, MemorySink, NoOpProgressReporter, NullSink,
    OutputSink, ProgressReporter, StdoutSink,
};
pub use session::SessionStore;
pub use tracing_config::{TracingConfig, TracingFormat};
pub use types::{BatchInput, BatchReport, InputSource, ItemFailure, OutputItem, ProcessingStage};

/// Finish a single image read from an async reader
///
/// `name` drives both the format gate and the output name.
///
/// # Errors
/// - Reading fails, the format is not allow-listed, or any pipeline stage fails
pub async fn finish_from_reader<R: tokio::io::AsyncRead + Unpin>(
    mut reader: R,
    name: &str,
    pipeline: &mut FinishingPipeline<'_>,
) -> Result<OutputItem> {
    use tokio::io::AsyncReadExt;

    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).await?;
    pipeline.finish_one(BatchInput::from_bytes(name, bytes)).await
}
