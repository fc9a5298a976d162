//! The image finishing pipeline
//!
//! Per item: format gate, decode, segmentation gateway, compositor, PNG
//! encoder, then hand-off to an [`OutputSink`]. Items run strictly one after
//! another and a failing item never stops the batch.

use crate::archive::{build_archive, check_unique_names};
use crate::color::BackgroundColor;
use crate::compositor::composite;
use crate::config::PipelineConfig;
use crate::encoder::PngEncoder;
use crate::error::{NoBgError, Result};
use crate::formats::{decode_input, InputFormat};
use crate::models::ModelKind;
use crate::naming::BatchNamer;
use crate::segmentation::SegmentationGateway;
use crate::services::{NoOpProgressReporter, OutputSink, ProgressReporter};
use crate::tracing_config::spans;
use crate::types::{BatchInput, BatchReport, InputSource, ItemFailure, OutputItem, ProcessingStage};
use image::{DynamicImage, RgbaImage};
use instant::Instant;
use tracing::Instrument;

/// Items produced by a run together with its report
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Successful outputs in processing order
    pub items: Vec<OutputItem>,
    pub report: BatchReport,
}

impl BatchOutcome {
    /// ZIP of every successful output
    ///
    /// # Errors
    /// - Archive construction failures
    pub fn archive(&self) -> Result<Vec<u8>> {
        build_archive(&self.items)
    }
}

/// A failure attributed to the stage it happened in
type StageError = (ProcessingStage, NoBgError);

/// Runs batches through a borrowed segmentation gateway
///
/// The gateway is created once by the caller and reused for every item; the
/// pipeline never loads or reloads a model itself.
///
/// Per item the stages are decode, segmentation, compositing and encoding.
/// A failure in any of them is recorded against that item and the next item
/// starts; only planning errors and sink errors end a run early.
///
/// # Examples
///
/// ```rust,no_run
/// use nobg::{BatchInput, FinishingPipeline, MemorySink, OnnxSegmenter, PipelineConfig};
///
/// # async fn example() -> nobg::Result<()> {
/// let config = PipelineConfig::default();
/// let mut gateway = OnnxSegmenter::load(config.model, &config.model_locator()?)?;
/// let mut pipeline = FinishingPipeline::new(&mut gateway, config)?;
///
/// let mut sink = MemorySink::new();
/// let outcome = pipeline
///     .run(&[BatchInput::from_path("cat.jpg")], &mut sink)
///     .await?;
/// assert_eq!(outcome.report.total(), 1);
/// # Ok(())
/// # }
/// ```
pub struct FinishingPipeline<'g> {
    gateway: &'g mut dyn SegmentationGateway,
    config: PipelineConfig,
    namer: BatchNamer,
    encoder: PngEncoder,
    reporter: Box<dyn ProgressReporter>,
}

impl std::fmt::Debug for FinishingPipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinishingPipeline")
            .field("model", &self.gateway.model())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'g> FinishingPipeline<'g> {
    /// Create a pipeline over `gateway`
    ///
    /// # Arguments
    /// * `gateway` - Segmenter shared by every item of every run
    /// * `config` - Background, compression and naming settings
    ///
    /// # Errors
    /// - `config` fails validation
    pub fn new(gateway: &'g mut dyn SegmentationGateway, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        if gateway.model() != config.model {
            log::debug!(
                "Gateway runs {} while the configuration names {}",
                gateway.model(),
                config.model
            );
        }

        Ok(Self {
            gateway,
            namer: config.namer(),
            encoder: PngEncoder::new(config.compression),
            config,
            reporter: Box::new(NoOpProgressReporter),
        })
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn namer(&self) -> &BatchNamer {
        &self.namer
    }

    #[must_use]
    pub fn encoder(&self) -> &PngEncoder {
        &self.encoder
    }

    #[must_use]
    pub fn model(&self) -> ModelKind {
        self.gateway.model()
    }

    /// Check every input and derive every output name before any work starts
    ///
    /// Same as the free [`plan`] with this pipeline's namer.
    ///
    /// # Errors
    /// - See [`plan`]
    pub fn plan(&self, inputs: &[BatchInput]) -> Result<Vec<String>> {
        plan(inputs, &self.namer)
    }

    /// Run the segmentation gateway on one decoded image
    ///
    /// # Errors
    /// - Gateway failures
    /// - Gateway returned a cutout of different dimensions
    pub fn cutout(&mut self, image: &DynamicImage) -> Result<RgbaImage> {
        let cutout = self.gateway.segment(image)?;
        if cutout.dimensions() != (image.width(), image.height()) {
            return Err(NoBgError::segmentation(format!(
                "Gateway returned {}x{} for a {}x{} input",
                cutout.width(),
                cutout.height(),
                image.width(),
                image.height()
            )));
        }
        Ok(cutout)
    }

    /// Composite a cutout onto `color` and encode it
    ///
    /// # Arguments
    /// * `cutout` - RGBA image from [`FinishingPipeline::cutout`]
    /// * `color` - Background to flatten onto, `None` keeps transparency
    ///
    /// # Returns
    /// PNG bytes
    ///
    /// # Errors
    /// - Compositing or encoding failures
    pub fn finish_image(
        &self,
        cutout: DynamicImage,
        color: Option<BackgroundColor>,
    ) -> Result<Vec<u8>> {
        let finished = composite(cutout, color)?;
        self.encoder.encode(&finished)
    }

    /// Process one planned item to an encoded output
    async fn process_item(
        &mut self,
        input: &BatchInput,
        output_name: &str,
    ) -> std::result::Result<OutputItem, StageError> {
        let image = load_input(input)
            .await
            .map_err(|e| (ProcessingStage::Decode, e))?;
        tracing::trace!(width = image.width(), height = image.height(), "decoded");

        let cutout = self
            .cutout(&image)
            .map_err(|e| (ProcessingStage::Segmentation, e))?;

        let finished = composite(DynamicImage::ImageRgba8(cutout), self.config.background)
            .map_err(|e| (ProcessingStage::Compositing, e))?;

        let bytes = self
            .encoder
            .encode(&finished)
            .map_err(|e| (ProcessingStage::Encoding, e))?;

        Ok(OutputItem::new(output_name, bytes))
    }

    /// Process a batch, handing each finished item to `sink` as it completes
    ///
    /// Per-item failures are recorded in the report and the batch continues.
    ///
    /// # Arguments
    /// * `inputs` - The batch, processed strictly in order
    /// * `sink` - Receives each finished item before the next one starts
    ///
    /// # Returns
    /// Successful items plus the [`BatchReport`]
    ///
    /// # Errors
    /// - Any planning error (before work starts)
    /// - `sink` failures, which abort the run
    pub async fn run(
        &mut self,
        inputs: &[BatchInput],
        sink: &mut dyn OutputSink,
    ) -> Result<BatchOutcome> {
        let span = spans::run(inputs.len(), self.model().token());
        self.run_planned(inputs, sink).instrument(span).await
    }

    async fn run_planned(
        &mut self,
        inputs: &[BatchInput],
        sink: &mut dyn OutputSink,
    ) -> Result<BatchOutcome> {
        let names = self.plan(inputs)?;
        let total = inputs.len();
        let start = Instant::now();
        let mut outcome = BatchOutcome::default();

        tracing::info!(total, "starting batch");

        for (index, (input, output_name)) in inputs.iter().zip(&names).enumerate() {
            self.reporter.item_started(index, total, &input.name);
            let item_start = Instant::now();

            let result = self
                .process_item(input, output_name)
                .instrument(spans::item(index, &input.name))
                .await;

            match result {
                Ok(item) => {
                    sink.accept(&item).await?;
                    outcome.report.record_success(item.name());
                    self.reporter.item_finished(
                        index,
                        item.name(),
                        item_start.elapsed().as_millis() as u64,
                    );
                    outcome.items.push(item);
                },
                Err((stage, error)) => {
                    tracing::warn!(index, name = %input.name, ?stage, %error, "item failed");
                    let failure = ItemFailure {
                        index,
                        name: input.name.clone(),
                        stage,
                        error: error.to_string(),
                    };
                    self.reporter.item_failed(&failure);
                    outcome.report.record_failure(failure);
                },
            }
        }

        outcome.report.elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            succeeded = outcome.report.succeeded,
            failed = outcome.report.failed,
            elapsed_ms = outcome.report.elapsed_ms,
            "batch finished"
        );
        self.reporter.batch_finished(&outcome.report);
        Ok(outcome)
    }

    /// Finish a single input, returning its failure as an error
    ///
    /// # Errors
    /// - Planning errors, or the per-item error of the input
    pub async fn finish_one(&mut self, input: BatchInput) -> Result<OutputItem> {
        let names = self.plan(std::slice::from_ref(&input))?;
        let name = names
            .into_iter()
            .next()
            .ok_or_else(|| NoBgError::invalid_config("nothing to process"))?;
        self.process_item(&input, &name)
            .instrument(spans::item(0, &input.name))
            .await
            .map_err(|(_, error)| error)
    }
}

/// Check every input and derive every output name
///
/// Needs no gateway, so front-ends can reject a batch before loading a model
/// or touching the output location.
///
/// # Arguments
/// * `inputs` - The batch, in processing order
/// * `namer` - Derives output names from input names
///
/// # Returns
/// One output name per input, in input order
///
/// # Errors
/// - [`NoBgError::InputNotFound`] for a missing path
/// - [`NoBgError::UnsupportedFormat`] for an input outside the allow-list
/// - [`NoBgError::InvalidConfig`] when a derived name is not a plain file name
///   (input names such as `../x.png` or `/tmp/x.png`)
/// - [`NoBgError::NameCollision`] when two inputs derive the same name
pub fn plan(inputs: &[BatchInput], namer: &BatchNamer) -> Result<Vec<String>> {
    for input in inputs {
        match &input.source {
            InputSource::Path(path) => {
                if !path.exists() {
                    return Err(NoBgError::InputNotFound(path.clone()));
                }
                InputFormat::from_name(&input.name)?;
            },
            InputSource::Bytes(_) => {
                InputFormat::from_name(&input.name)?;
            },
            InputSource::Image(_) => {},
        }
    }

    let names: Vec<String> = inputs
        .iter()
        .map(|input| namer.derive_name(&input.name))
        .collect();
    check_unique_names(names.iter().map(String::as_str))?;
    Ok(names)
}

/// Read and decode a batch input
///
/// Path and byte inputs are decoded with the format named by their
/// extension, falling back to content sniffing when the bytes disagree.
///
/// # Errors
/// - The file cannot be read or the bytes cannot be decoded
pub async fn load_input(input: &BatchInput) -> Result<DynamicImage> {
    match &input.source {
        InputSource::Image(image) => Ok(image.clone()),
        InputSource::Bytes(bytes) => decode_input(bytes, InputFormat::from_name(&input.name)?),
        InputSource::Path(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| NoBgError::file_io_error("read image file", path, &e))?;
            decode_input(&bytes, InputFormat::from_name(&input.name)?)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockGateway;
    use crate::encoder::decode;
    use crate::services::{MemorySink, NullSink};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn encoded(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 20, 30])));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    fn png_input(name: &str) -> BatchInput {
        BatchInput::from_bytes(name, encoded(ImageFormat::Png, 4, 2))
    }

    #[tokio::test]
    async fn test_partial_failure_isolation() {
        let mut gateway = MockGateway::failing_on(&[1]);
        let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();
        let mut sink = MemorySink::new();

        let inputs = vec![png_input("a.png"), png_input("b.png"), png_input("c.png")];
        let outcome = pipeline.run(&inputs, &mut sink).await.unwrap();

        assert_eq!(outcome.report.succeeded, 2);
        assert_eq!(outcome.report.failed, 1);
        let failure = &outcome.report.failures[0];
        assert_eq!(failure.index, 1);
        assert_eq!(failure.name, "b.png");
        assert_eq!(failure.stage, ProcessingStage::Segmentation);

        let names: Vec<_> = sink.items().iter().map(OutputItem::name).collect();
        assert_eq!(names, vec!["a_noBg.png", "c_noBg.png"]);
        assert_eq!(outcome.items.len(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_format_rejected_before_gateway() {
        let mut gateway = MockGateway::new();
        let history = gateway.clone();
        {
            let pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();
            let inputs = vec![png_input("ok.png"), BatchInput::from_bytes("anim.gif", vec![0; 8])];
            let err = pipeline.plan(&inputs).unwrap_err();
            assert!(matches!(err, NoBgError::UnsupportedFormat(_)));
        }

        let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();
        let inputs = vec![png_input("ok.png"), BatchInput::from_bytes("anim.gif", vec![0; 8])];
        assert!(pipeline.run(&inputs, &mut NullSink).await.is_err());
        drop(pipeline);

        assert_eq!(gateway.call_count(), 0);
        assert!(history.call_history().is_empty());
    }

    #[tokio::test]
    async fn test_name_collision_fails_fast() {
        let mut gateway = MockGateway::new();
        let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();

        let inputs = vec![png_input("x.png"), png_input("x.jpg")];
        let err = pipeline.run(&inputs, &mut NullSink).await.unwrap_err();
        assert!(matches!(err, NoBgError::NameCollision { ref name } if name == "x_noBg.png"));
        drop(pipeline);
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_names_with_path_components_never_reach_the_sink() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let out = temp_dir.path().join("out");
        let mut sink = crate::services::DirectorySink::create(&out).await.unwrap();
        let mut gateway = MockGateway::new();
        let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();

        for name in ["../escape.png", "/tmp/abs.png", "nested\\x.png"] {
            let err = pipeline.run(&[png_input(name)], &mut sink).await.unwrap_err();
            assert!(matches!(err, NoBgError::InvalidConfig(_)), "accepted {name}");
        }
        drop(pipeline);

        assert_eq!(gateway.call_count(), 0);
        assert!(sink.written().is_empty());
        assert!(!temp_dir.path().join("escape_noBg.png").exists());
    }

    #[test]
    fn test_plan_needs_no_gateway() {
        let namer = BatchNamer::default();
        let names = plan(&[png_input("a.jpeg"), png_input("b.tif")], &namer).unwrap();
        assert_eq!(names, vec!["a_noBg.png", "b_noBg.png"]);

        let err = plan(&[png_input("photo.jpg"), png_input("photo.png")], &namer).unwrap_err();
        assert!(matches!(err, NoBgError::NameCollision { .. }));
    }

    #[tokio::test]
    async fn test_missing_path_is_configuration_error() {
        let mut gateway = MockGateway::new();
        let pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();
        let inputs = vec![BatchInput::from_path("/definitely/not/here.png")];
        let err = pipeline.plan(&inputs).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Configuration);
    }

    #[tokio::test]
    async fn test_decode_failure_is_per_item() {
        let mut gateway = MockGateway::new();
        let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();

        let inputs = vec![
            BatchInput::from_bytes("broken.jpg", b"not a jpeg".to_vec()),
            png_input("fine.png"),
        ];
        let outcome = pipeline.run(&inputs, &mut NullSink).await.unwrap();
        assert_eq!(outcome.report.succeeded, 1);
        assert_eq!(outcome.report.failures[0].stage, ProcessingStage::Decode);
        drop(pipeline);
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_background_applied_and_transparent_default() {
        let mut gateway = MockGateway::new();
        let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();
        let item = pipeline.finish_one(png_input("a.png")).await.unwrap();
        let decoded = decode(item.bytes()).unwrap();
        assert!(decoded.color().has_alpha());
        drop(pipeline);

        let config = PipelineConfig::builder()
            .background(Some(BackgroundColor::new(255, 0, 0)))
            .build()
            .unwrap();
        let mut pipeline = FinishingPipeline::new(&mut gateway, config).unwrap();
        let item = pipeline.finish_one(png_input("a.png")).await.unwrap();
        let decoded = decode(item.bytes()).unwrap();
        assert!(!decoded.color().has_alpha());
        let rgb = decoded.to_rgb8();
        // Left half is transparent in the mock mask, right half opaque
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(rgb.get_pixel(3, 0).0, [10, 20, 30]);
    }

    #[tokio::test]
    async fn test_outcome_archive_contains_successes_only() {
        let mut gateway = MockGateway::failing_on(&[0]);
        let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();
        let inputs = vec![png_input("a.png"), png_input("b.png")];
        let outcome = pipeline.run(&inputs, &mut NullSink).await.unwrap();

        let bytes = outcome.archive().unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.by_index(0).unwrap().name(), "b_noBg.png");
    }

    #[tokio::test]
    async fn test_image_sources_skip_format_gate() {
        let mut gateway = MockGateway::new();
        let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();
        let input = BatchInput::from_image("camera", DynamicImage::new_rgb8(2, 2));
        let item = pipeline.finish_one(input).await.unwrap();
        assert_eq!(item.name(), "camera_noBg.png");
    }
}
