//! nobg command-line tool
//!
//! Removes image backgrounds in batch: one PNG per input, optionally
//! flattened onto a color, optionally bundled into a ZIP.

use super::config::{CliConfigBuilder, OutputTarget};
use super::progress::IndicatifProgressReporter;
use crate::{
    config::PipelineConfig,
    encoder::PngCompression,
    error::{ErrorCategory, NoBgError},
    formats::InputFormat,
    models::{format_size, ModelKind, ModelLocator},
    pipeline::{self, FinishingPipeline},
    segmentation::SegmentationGateway,
    services::{ConsoleProgressReporter, DirectorySink, OutputSink, ProgressReporter, StdoutSink},
    tracing_config::{TracingConfig, TracingFormat},
    types::{BatchInput, BatchReport},
};
use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::io::AsyncReadExt;

/// Background removal CLI tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "nobg")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image file or directory (use "-" for stdin)
    #[arg(short, long, value_name = "PATH", required_unless_present = "list_models")]
    pub input: Option<String>,

    /// Output directory. For a single file, a path with an extension selects its parent directory. Use "-" for stdout.
    #[arg(short, long, value_name = "PATH", required_unless_present = "list_models")]
    pub output: Option<String>,

    /// Segmentation model [default: u2net]
    #[arg(short, long, value_enum)]
    pub model: Option<ModelKind>,

    /// Background color (#RRGGBB, #RGB, a color name, or "none") [default: transparent]
    #[arg(long, value_name = "COLOR")]
    pub bg_color: Option<String>,

    /// PNG compression effort [default: fast]
    #[arg(long, value_enum)]
    pub compression: Option<PngCompression>,

    /// Also bundle all outputs into a ZIP archive
    #[arg(long)]
    pub archive: bool,

    /// Archive file name [default: removed_backgrounds.zip]
    #[arg(long, value_name = "NAME")]
    pub archive_name: Option<String>,

    /// Process directory recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Pattern for batch processing (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Directory holding <model>.onnx files [default: $U2NET_HOME or ~/.u2net]
    #[arg(long, value_name = "PATH")]
    pub models_dir: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the batch report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log filter directive, overrides -v (e.g. "nobg=debug")
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,

    /// Log output format on stderr
    #[arg(long, value_enum, default_value = "console")]
    pub log_format: TracingFormat,

    /// List supported models and whether their files are present, then exit
    #[arg(long)]
    pub list_models: bool,
}

/// Run the CLI and map the outcome to a process exit code
///
/// 0 success, 1 some items failed, 2 configuration error, 3 resource error.
pub async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli) {
        eprintln!("Error: {e:#}");
        return ExitCode::from(ErrorCategory::Configuration.exit_code());
    }

    match run(&cli).await {
        Ok(report) if report.has_failures() => ExitCode::from(ErrorCategory::PerItem.exit_code()),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            let category = error_category(&e);
            eprintln!("Error: {e:#}");
            ExitCode::from(category.exit_code())
        },
    }
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let mut config = TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(cli.log_format);
    if let Some(filter) = &cli.log_filter {
        config = config.with_env_filter(filter.clone());
    }
    config
        .with_run_id(uuid::Uuid::new_v4().to_string())
        .init()
        .context("Failed to initialize tracing subscriber")
}

/// Category of the first library error in the chain
fn error_category(error: &anyhow::Error) -> ErrorCategory {
    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<NoBgError>() {
            return e.category();
        }
        if cause.downcast_ref::<std::io::Error>().is_some()
            || cause.downcast_ref::<walkdir::Error>().is_some()
        {
            return ErrorCategory::Resource;
        }
    }
    ErrorCategory::Configuration
}

async fn run(cli: &Cli) -> Result<BatchReport> {
    let config = CliConfigBuilder::from_cli(cli).context("Invalid configuration")?;

    if cli.list_models {
        list_models(&config)?;
        return Ok(BatchReport::default());
    }

    CliConfigBuilder::validate_cli(cli).context("Invalid CLI arguments")?;

    let input = cli
        .input
        .as_deref()
        .ok_or_else(|| NoBgError::invalid_config("--input is required"))?;
    let output = cli
        .output
        .as_deref()
        .ok_or_else(|| NoBgError::invalid_config("--output is required"))?;

    let (inputs, input_is_dir) = collect_inputs(cli, input).await?;
    let target = CliConfigBuilder::resolve_output(output, input_is_dir)?;

    if inputs.is_empty() {
        warn!("No supported images found in {input}");
        return Ok(BatchReport::default());
    }
    info!("Found {} image(s) to process", inputs.len());

    // Reject the batch before touching the output location or loading a model
    pipeline::plan(&inputs, &config.namer())?;

    let mut sink: Box<dyn OutputSink> = match &target {
        OutputTarget::Stdout => Box::new(StdoutSink),
        OutputTarget::Directory(dir) => Box::new(DirectorySink::create(dir).await?),
    };

    let mut gateway = load_gateway(&config)?;
    let reporter: Box<dyn ProgressReporter> = if inputs.len() > 1 && !cli.json {
        Box::new(IndicatifProgressReporter::new(inputs.len()))
    } else {
        Box::new(ConsoleProgressReporter::new(cli.verbose > 0))
    };

    let mut pipeline = FinishingPipeline::new(gateway.as_mut(), config.clone())?
        .with_reporter(reporter);
    let outcome = pipeline.run(&inputs, sink.as_mut()).await?;

    if cli.archive {
        if let OutputTarget::Directory(dir) = &target {
            if outcome.items.is_empty() {
                warn!("No successful outputs; skipping archive");
            } else {
                let bytes = outcome.archive().context("Failed to build archive")?;
                let path = dir.join(&config.archive_name);
                tokio::fs::write(&path, &bytes)
                    .await
                    .map_err(|e| NoBgError::file_io_error("write archive", &path, &e))?;
                info!(
                    "Wrote archive {} ({} entries, {})",
                    path.display(),
                    outcome.items.len(),
                    format_size(bytes.len() as u64)
                );
            }
        }
    }

    print_failures(&outcome.report);
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome.report).context("Failed to serialize report")?
        );
    }

    Ok(outcome.report)
}

/// Gather inputs in processing order
///
/// Returns the inputs and whether `input` named a directory.
async fn collect_inputs(cli: &Cli, input: &str) -> Result<(Vec<BatchInput>, bool)> {
    if input == "-" {
        return Ok((vec![read_stdin().await?], false));
    }

    let path = PathBuf::from(input);
    if path.is_file() {
        InputFormat::from_path(&path)?;
        return Ok((vec![BatchInput::from_path(path)], false));
    }
    if path.is_dir() {
        let files = find_image_files(&path, cli.recursive, cli.pattern.as_deref())?;
        return Ok((files.into_iter().map(BatchInput::from_path).collect(), true));
    }

    Err(NoBgError::InputNotFound(path).into())
}

/// Read image data from stdin, gated on magic bytes
async fn read_stdin() -> Result<BatchInput> {
    let mut buffer = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut buffer)
        .await
        .context("Failed to read image data from stdin")?;

    if buffer.is_empty() {
        return Err(NoBgError::invalid_config("No data received from stdin").into());
    }

    let format = InputFormat::detect(&buffer).ok_or_else(|| {
        NoBgError::unsupported_format("stdin data is not a supported image encoding")
    })?;
    info!("Read {} from stdin ({} bytes)", format, buffer.len());
    Ok(BatchInput::from_bytes(format!("stdin.{}", format.extension()), buffer))
}

/// Find allow-listed image files in a directory, sorted
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(max_depth) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !InputFormat::is_supported_path(path) {
            log::debug!("Skipping unsupported file: {}", path.display());
            continue;
        }
        if matches_pattern(path, pattern) {
            files.push(path.to_path_buf());
        }
    }

    // Sort files for consistent processing order
    files.sort();
    Ok(files)
}

/// Check if the file name matches the given pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|filename| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            }),
        None => true,
    }
}

#[cfg(feature = "onnx")]
fn load_gateway(config: &PipelineConfig) -> Result<Box<dyn SegmentationGateway>> {
    use crate::backends::OnnxSegmenter;

    let locator = config.model_locator()?;
    info!(
        "Loading model {} from {}",
        config.model,
        locator.models_dir().display()
    );
    Ok(Box::new(OnnxSegmenter::load(config.model, &locator)?))
}

#[cfg(not(feature = "onnx"))]
fn load_gateway(config: &PipelineConfig) -> Result<Box<dyn SegmentationGateway>> {
    Err(NoBgError::model(format!(
        "cannot load {}: built without the 'onnx' feature",
        config.model
    ))
    .into())
}

fn list_models(config: &PipelineConfig) -> Result<()> {
    let locator: ModelLocator = config.model_locator()?;

    println!("Models in {}", locator.models_dir().display());
    for kind in ModelKind::ALL {
        let path = locator.model_path(kind);
        let status = match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => format!("present, {}", format_size(meta.len())),
            _ => "missing".to_string(),
        };
        println!(
            "  {:<18} {:<28} [{}]",
            kind.token(),
            kind.description(),
            status
        );
    }
    Ok(())
}

/// Recap of failed items; the counts line comes from the progress reporter
fn print_failures(report: &BatchReport) {
    if report.failures.is_empty() {
        return;
    }
    error!("Failed items:");
    for failure in &report.failures {
        error!(
            "  {} (while {}): {}",
            failure.name,
            failure.stage.description(),
            failure.error
        );
    }
}
