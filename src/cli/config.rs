//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::color::parse_background;
use crate::config::{PipelineConfig, PipelineConfigBuilder};
use crate::error::{NoBgError, Result};
use std::path::{Path, PathBuf};

/// Where finished items go
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OutputTarget {
    Stdout,
    Directory(PathBuf),
}

/// Convert CLI arguments to a validated `PipelineConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the configuration: `--config` file first, flags on top
    pub(crate) fn from_cli(cli: &Cli) -> Result<PipelineConfig> {
        let base = match &cli.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        let mut builder = PipelineConfigBuilder::from_config(base);
        if let Some(model) = cli.model {
            builder = builder.model(model);
        }
        if let Some(color) = &cli.bg_color {
            builder = builder.background(parse_background(color)?);
        }
        if let Some(compression) = cli.compression {
            builder = builder.compression(compression);
        }
        if let Some(name) = &cli.archive_name {
            builder = builder.archive_name(name.clone());
        }
        if let Some(dir) = &cli.models_dir {
            builder = builder.models_dir(dir.clone());
        }

        builder.build()
    }

    /// Cross-flag checks that do not depend on the file system
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if let Some(pattern) = &cli.pattern {
            glob::Pattern::new(pattern).map_err(|e| {
                NoBgError::invalid_config(format!("invalid --pattern '{pattern}': {e}"))
            })?;
        }

        if cli.output.as_deref() == Some("-") {
            if cli.archive {
                return Err(NoBgError::invalid_config(
                    "--archive cannot be combined with stdout output",
                ));
            }
            if cli.json {
                return Err(NoBgError::invalid_config(
                    "--json cannot be combined with stdout output",
                ));
            }
        }

        Ok(())
    }

    /// Resolve `--output` for an input
    ///
    /// For a single file, an output path with an extension names a file whose
    /// parent directory is used. Directory inputs need a directory output.
    pub(crate) fn resolve_output(output: &str, input_is_dir: bool) -> Result<OutputTarget> {
        if output == "-" {
            if input_is_dir {
                return Err(NoBgError::invalid_config(
                    "Cannot use stdout (-) as output when processing a directory",
                ));
            }
            return Ok(OutputTarget::Stdout);
        }

        let path = Path::new(output);
        let looks_like_file = path.extension().is_some() && !path.is_dir();

        if !looks_like_file {
            return Ok(OutputTarget::Directory(path.to_path_buf()));
        }

        if input_is_dir {
            return Err(NoBgError::invalid_config(format!(
                "Directory inputs require a directory output, got '{output}'"
            )));
        }

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Ok(OutputTarget::Directory(parent))
    }
}
