//! Progress reporting service
//!
//! Keeps progress reporting out of the pipeline so each front-end can render
//! it its own way (log lines, progress bars, nothing).

use crate::types::{BatchReport, ItemFailure};

/// Receives per-item and end-of-batch notifications
pub trait ProgressReporter: Send + Sync {
    /// An item is about to be processed
    ///
    /// # Arguments
    /// * `index` - Position in the batch (0-based)
    /// * `total` - Number of items in the batch
    /// * `name` - Input identifier
    fn item_started(&self, index: usize, total: usize, name: &str);

    /// An item finished and was handed to its sink under `output_name`
    fn item_finished(&self, index: usize, output_name: &str, elapsed_ms: u64);

    /// An item failed; the batch continues
    fn item_failed(&self, failure: &ItemFailure);

    /// The batch is done
    fn batch_finished(&self, report: &BatchReport) {
        drop(report);
    }
}

/// No-op progress reporter that discards all notifications
#[derive(Debug, Default)]
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn item_started(&self, _index: usize, _total: usize, _name: &str) {}

    fn item_finished(&self, _index: usize, _output_name: &str, _elapsed_ms: u64) {}

    fn item_failed(&self, _failure: &ItemFailure) {}
}

/// Progress reporter writing through the `log` facade
#[derive(Debug)]
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    ///
    /// # Arguments
    /// * `verbose` - Also log per-item start and timing lines
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn item_started(&self, index: usize, total: usize, name: &str) {
        if self.verbose {
            log::info!("[{}/{}] Processing {}", index + 1, total, name);
        }
    }

    fn item_finished(&self, index: usize, output_name: &str, elapsed_ms: u64) {
        if self.verbose {
            log::info!("[{}] Wrote {} ({}ms)", index + 1, output_name, elapsed_ms);
        } else {
            log::info!("Wrote {output_name}");
        }
    }

    fn item_failed(&self, failure: &ItemFailure) {
        log::error!(
            "Error while {} for {}: {}",
            failure.stage.description(),
            failure.name,
            failure.error
        );
    }

    fn batch_finished(&self, report: &BatchReport) {
        log::info!("{}", report.summary());
    }
}
