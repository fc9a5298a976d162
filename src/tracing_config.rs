//! Tracing setup for the command-line front-end
//!
//! The library only emits events and spans. Installing a subscriber is left
//! to the binary, which builds a [`TracingConfig`] from its flags.

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// How log lines are rendered on stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum TracingFormat {
    /// Colored, compact lines for terminals
    #[default]
    Console,
    /// Same layout without colors or timestamps, for CI logs
    Compact,
    /// One JSON object per event, with the active span list
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Subscriber settings collected from the command line
#[derive(Debug, Default)]
pub struct TracingConfig {
    /// `-v` count: 0 info, 1 debug, 2+ trace
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Filter directive replacing the verbosity level when set
    pub env_filter: Option<String>,
    /// Correlation id logged once at startup
    pub run_id: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_run_id<S: Into<String>>(mut self, run_id: S) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Level directive for the configured verbosity
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Directive actually used: the explicit filter, else the verbosity level
    #[must_use]
    pub fn filter_directive(&self) -> &str {
        self.env_filter
            .as_deref()
            .unwrap_or_else(|| self.verbosity_to_filter())
    }

    /// Install the global subscriber
    ///
    /// Events go to stderr so stdout stays free for image bytes and JSON
    /// reports. `log` records are bridged into the same subscriber.
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let registry = Registry::default().with(EnvFilter::try_new(self.filter_directive())?);
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);

        match self.format {
            TracingFormat::Console => registry.with(layer.compact().with_ansi(true)).try_init()?,
            TracingFormat::Compact => registry
                .with(layer.compact().with_ansi(false).without_time())
                .try_init()?,
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => registry
                .with(layer.json().with_current_span(true).with_span_list(true))
                .try_init()?,
        }

        if let Some(run_id) = &self.run_id {
            tracing::debug!(run_id = %run_id, "run started");
        }
        Ok(())
    }
}

/// Span creation helpers for common operations
pub mod spans {
    use tracing::{Level, Span};

    /// Span covering one batch run
    pub fn run(item_count: usize, model_name: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "batch",
            item_count = %item_count,
            model_name = %model_name
        )
    }

    /// Span covering one item of a batch
    pub fn item(index: usize, name: &str) -> Span {
        tracing::span!(Level::INFO, "item", index = %index, name = %name)
    }

    /// Span for model loading operations
    pub fn model_loading(model_name: &str, path: &std::path::Path) -> Span {
        tracing::span!(
            Level::INFO,
            "model_loading",
            model_name = %model_name,
            path = %path.display()
        )
    }

    /// Span for inference operations
    pub fn inference(model_name: &str, dimensions: (u32, u32)) -> Span {
        tracing::span!(
            Level::DEBUG,
            "inference",
            model_name = %model_name,
            width = %dimensions.0,
            height = %dimensions.1
        )
    }

    /// Span for archive construction
    pub fn archive(entry_count: usize) -> Span {
        tracing::span!(Level::DEBUG, "archive", entry_count = %entry_count)
    }
}
