//! Output persistence service
//!
//! Finished items are handed to an [`OutputSink`] as soon as they are
//! produced, so a failure later in the batch never loses earlier results.
//!
//! Sinks provided here:
//! - [`DirectorySink`]: one file per item inside an output directory
//! - [`StdoutSink`]: raw PNG bytes on standard output (single-item runs)
//! - [`MemorySink`]: keeps items in memory, for front-ends that serve them
//! - [`NullSink`]: discards items, useful when only the report matters

use crate::archive::check_entry_name;
use crate::error::{NoBgError, Result};
use crate::types::OutputItem;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Destination for finished items
///
/// Errors returned here are resource errors and abort the run.
///
/// # Examples
///
/// ```rust,no_run
/// use nobg::{OutputItem, OutputSink, Result};
///
/// struct CountingSink(usize);
///
/// #[async_trait::async_trait]
/// impl OutputSink for CountingSink {
///     async fn accept(&mut self, _item: &OutputItem) -> Result<()> {
///         self.0 += 1;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait OutputSink: Send {
    /// Persist one finished item
    ///
    /// # Arguments
    /// * `item` - Encoded output with its derived file name
    ///
    /// # Errors
    /// - The item cannot be stored; the pipeline stops the run
    async fn accept(&mut self, item: &OutputItem) -> Result<()>;
}

/// Writes each item to `<dir>/<name>`
///
/// Names must be plain file names; anything with path components is refused
/// so an item can never be written outside `dir`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    /// Create the sink, creating `dir` (and parents) if missing
    ///
    /// # Arguments
    /// * `dir` - Output directory
    ///
    /// # Returns
    /// A sink that has written nothing yet
    ///
    /// # Errors
    /// - Directory cannot be created, or the path exists and is not a directory
    pub async fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if dir.exists() && !dir.is_dir() {
            return Err(NoBgError::file_io_error(
                "use output directory",
                &dir,
                &std::io::Error::new(std::io::ErrorKind::AlreadyExists, "not a directory"),
            ));
        }
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| NoBgError::file_io_error("create output directory", &dir, &e))?;
        Ok(Self {
            dir,
            written: Vec::new(),
        })
    }

    /// Output directory of this sink
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths written so far, in order
    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Write an arbitrary file next to the items (the batch archive)
    ///
    /// # Arguments
    /// * `name` - Plain file name inside the output directory
    /// * `bytes` - File contents
    ///
    /// # Returns
    /// The path that was written
    ///
    /// # Errors
    /// - [`NoBgError::InvalidConfig`] when `name` carries path components
    /// - File cannot be written
    pub async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        check_entry_name(name)?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| NoBgError::file_io_error("write", &path, &e))?;
        Ok(path)
    }
}

#[async_trait]
impl OutputSink for DirectorySink {
    async fn accept(&mut self, item: &OutputItem) -> Result<()> {
        let path = self.write_file(item.name(), item.bytes()).await?;
        log::debug!("Saved {} ({} bytes)", path.display(), item.len());
        self.written.push(path);
        Ok(())
    }
}

/// Streams item bytes to standard output
///
/// Bytes of consecutive items are written back to back, so this sink only
/// makes sense for single-item runs.
#[derive(Debug, Default)]
pub struct StdoutSink;

#[async_trait]
impl OutputSink for StdoutSink {
    async fn accept(&mut self, item: &OutputItem) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(item.bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

/// Keeps copies of every item in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    items: Vec<OutputItem>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Items accepted so far, in order
    #[must_use]
    pub fn items(&self) -> &[OutputItem] {
        &self.items
    }

    /// Consume the sink, returning its items
    #[must_use]
    pub fn into_items(self) -> Vec<OutputItem> {
        self.items
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn accept(&mut self, item: &OutputItem) -> Result<()> {
        self.items.push(item.clone());
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl OutputSink for NullSink {
    async fn accept(&mut self, _item: &OutputItem) -> Result<()> {
        Ok(())
    }
}
