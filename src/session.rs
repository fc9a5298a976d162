//! Per-user session state for the web front-end
//!
//! A session keeps the cutouts of its latest upload run so the background can
//! be changed per image without running segmentation again. Entries are keyed
//! by upload index and live until the next successful upload run, an explicit
//! [`SessionStore::clear`], or idle expiry.

use crate::archive::build_archive;
use crate::color::BackgroundColor;
use crate::compositor::composite;
use crate::encoder::PngEncoder;
use crate::error::{NoBgError, Result};
use crate::pipeline::{load_input, FinishingPipeline};
use crate::types::{BatchInput, BatchReport, ItemFailure, OutputItem, ProcessingStage};
use chrono::{DateTime, Duration, Utc};
use image::{DynamicImage, RgbaImage};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Idle time after which a session may be discarded
pub const DEFAULT_IDLE_TTL_MINUTES: i64 = 30;

#[derive(Debug, Clone)]
struct SessionEntry {
    output_name: String,
    original: DynamicImage,
    cutout: RgbaImage,
    background: Option<BackgroundColor>,
}

/// Results of one user's upload runs
///
/// Segmentation is the expensive step, so it runs once per upload inside
/// [`SessionStore::ingest`]. Everything afterwards (changing a background,
/// downloading one result, downloading all of them) only composites and
/// encodes the stored cutouts.
///
/// # Examples
///
/// ```rust,no_run
/// use nobg::{BackgroundColor, BatchInput, FinishingPipeline, OnnxSegmenter, PipelineConfig, SessionStore};
///
/// # async fn example(upload: Vec<u8>) -> nobg::Result<()> {
/// let config = PipelineConfig::default();
/// let mut gateway = OnnxSegmenter::load(config.model, &config.model_locator()?)?;
/// let mut pipeline = FinishingPipeline::new(&mut gateway, config)?;
///
/// let mut session = SessionStore::new();
/// session
///     .ingest(&mut pipeline, vec![BatchInput::from_bytes("cat.png", upload)])
///     .await?;
/// session.set_background(0, Some(BackgroundColor::white()))?;
/// let download = session.render(0)?;
/// assert_eq!(download.name(), "cat_noBg.png");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionStore {
    id: Uuid,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
    idle_ttl: Duration,
    entries: BTreeMap<usize, SessionEntry>,
    encoder: PngEncoder,
    archive_name: String,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create an empty session with a fresh id and the default idle TTL
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_active: now,
            idle_ttl: Duration::minutes(DEFAULT_IDLE_TTL_MINUTES),
            entries: BTreeMap::new(),
            encoder: PngEncoder::default(),
            archive_name: crate::archive::DEFAULT_ARCHIVE_NAME.to_string(),
        }
    }

    /// Override the idle time after which [`SessionStore::is_expired`] holds
    #[must_use]
    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    /// Random session identifier
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    /// Mark the session as used now
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    /// Whether the session has been idle longer than its TTL at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_active) > self.idle_ttl
    }

    /// Drop every stored result
    pub fn clear(&mut self) {
        log::debug!("Clearing session {} ({} entries)", self.id, self.entries.len());
        self.entries.clear();
        self.touch();
    }

    /// Number of stored results
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Upload indices with a stored result, ascending
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    /// Download name of the result stored for upload `index`
    #[must_use]
    pub fn output_name(&self, index: usize) -> Option<&str> {
        self.entries.get(&index).map(|e| e.output_name.as_str())
    }

    /// The decoded upload, for side-by-side display
    #[must_use]
    pub fn original(&self, index: usize) -> Option<&DynamicImage> {
        self.entries.get(&index).map(|e| &e.original)
    }

    /// Background chosen for upload `index`; `None` also for unknown indices
    #[must_use]
    pub fn background(&self, index: usize) -> Option<BackgroundColor> {
        self.entries.get(&index).and_then(|e| e.background)
    }

    /// Segment a new set of uploads through the shared gateway
    ///
    /// Format and naming problems reject the whole run. Decode and
    /// segmentation failures are reported per upload; the rest are kept.
    /// Previous results are replaced only when at least one upload succeeded.
    ///
    /// # Arguments
    /// * `pipeline` - Supplies the gateway, namer, encoder and default background
    /// * `uploads` - Client uploads; their index in this list is their key
    ///
    /// # Returns
    /// Per-upload successes and failures of this run
    ///
    /// # Errors
    /// - Planning errors from [`FinishingPipeline::plan`]
    pub async fn ingest(
        &mut self,
        pipeline: &mut FinishingPipeline<'_>,
        uploads: Vec<BatchInput>,
    ) -> Result<BatchReport> {
        let names = pipeline.plan(&uploads)?;
        let start = instant::Instant::now();
        let default_background = pipeline.config().background;
        let mut report = BatchReport::default();
        let mut entries = BTreeMap::new();

        for (index, (upload, output_name)) in uploads.into_iter().zip(names).enumerate() {
            let original = match load_input(&upload).await {
                Ok(image) => image,
                Err(e) => {
                    report.record_failure(failure(index, &upload, ProcessingStage::Decode, &e));
                    continue;
                },
            };

            match pipeline.cutout(&original) {
                Ok(cutout) => {
                    report.record_success(&output_name);
                    entries.insert(
                        index,
                        SessionEntry {
                            output_name,
                            original,
                            cutout,
                            background: default_background,
                        },
                    );
                },
                Err(e) => {
                    report.record_failure(failure(
                        index,
                        &upload,
                        ProcessingStage::Segmentation,
                        &e,
                    ));
                },
            }
        }

        report.elapsed_ms = start.elapsed().as_millis() as u64;
        if !entries.is_empty() {
            self.entries = entries;
            self.encoder = *pipeline.encoder();
            self.archive_name.clone_from(&pipeline.config().archive_name);
        }
        self.touch();

        log::info!(
            "Session {}: {} upload(s) processed, {} failed",
            self.id,
            report.succeeded,
            report.failed
        );
        Ok(report)
    }

    /// Choose the background used when rendering `index`
    ///
    /// # Arguments
    /// * `index` - Upload index from the last successful [`SessionStore::ingest`]
    /// * `color` - New background, `None` for transparent
    ///
    /// # Errors
    /// - Unknown index
    pub fn set_background(&mut self, index: usize, color: Option<BackgroundColor>) -> Result<()> {
        let entry = self.entries.get_mut(&index).ok_or_else(|| unknown_index(index))?;
        entry.background = color;
        self.touch();
        Ok(())
    }

    /// Composite and encode one stored result with its chosen background
    ///
    /// # Errors
    /// - Unknown index
    /// - Encoding failures
    pub fn render(&self, index: usize) -> Result<OutputItem> {
        let entry = self.entries.get(&index).ok_or_else(|| unknown_index(index))?;
        self.render_entry(entry)
    }

    /// Render every stored result, ascending by index
    ///
    /// # Errors
    /// - Encoding failures
    pub fn render_all(&self) -> Result<Vec<OutputItem>> {
        self.entries
            .values()
            .map(|entry| self.render_entry(entry))
            .collect()
    }

    /// Whether a "download all" archive is offered
    #[must_use]
    pub fn offers_archive(&self) -> bool {
        self.entries.len() > 1
    }

    /// ZIP of every stored result rendered with its own background
    ///
    /// # Errors
    /// - Rendering or archive failures
    pub fn archive(&self) -> Result<OutputItem> {
        let items = self.render_all()?;
        Ok(OutputItem::new(
            self.archive_name.clone(),
            build_archive(&items)?,
        ))
    }

    fn render_entry(&self, entry: &SessionEntry) -> Result<OutputItem> {
        let finished = composite(DynamicImage::ImageRgba8(entry.cutout.clone()), entry.background)?;
        let bytes = self.encoder.encode(&finished)?;
        Ok(OutputItem::new(entry.output_name.clone(), bytes))
    }
}

fn failure(index: usize, upload: &BatchInput, stage: ProcessingStage, error: &NoBgError) -> ItemFailure {
    log::warn!("Upload {} failed while {}: {}", upload.name, stage.description(), error);
    ItemFailure {
        index,
        name: upload.name.clone(),
        stage,
        error: error.to_string(),
    }
}

fn unknown_index(index: usize) -> NoBgError {
    NoBgError::invalid_config(format!("no result stored for item {index}"))
}
