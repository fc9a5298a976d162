//! Progress bar reporter for multi-file runs

use crate::services::ProgressReporter;
use crate::types::{BatchReport, ItemFailure};
use indicatif::{ProgressBar, ProgressStyle};

pub(crate) struct IndicatifProgressReporter {
    bar: ProgressBar,
}

impl IndicatifProgressReporter {
    pub(crate) fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Self { bar }
    }
}

impl ProgressReporter for IndicatifProgressReporter {
    fn item_started(&self, _index: usize, _total: usize, name: &str) {
        self.bar.set_message(format!("Processing {name}"));
    }

    fn item_finished(&self, _index: usize, _output_name: &str, _elapsed_ms: u64) {
        self.bar.inc(1);
    }

    fn item_failed(&self, failure: &ItemFailure) {
        self.bar.println(format!(
            "Failed {} while {}: {}",
            failure.name,
            failure.stage.description(),
            failure.error
        ));
        self.bar.inc(1);
    }

    fn batch_finished(&self, report: &BatchReport) {
        self.bar.finish_and_clear();
        log::info!("{}", report.summary());
    }
}
