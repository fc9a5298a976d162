//! ZIP packaging of batch outputs

use crate::error::{NoBgError, Result};
use crate::types::OutputItem;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// File name of the batch download when none is configured
pub const DEFAULT_ARCHIVE_NAME: &str = "removed_backgrounds.zip";

/// Bundle encoded outputs into one DEFLATE-compressed ZIP
///
/// Entries keep insertion order and their bytes unchanged. Duplicate names
/// are rejected before any entry is written.
///
/// # Errors
/// - [`NoBgError::InvalidConfig`] for an entry name with path components
/// - [`NoBgError::NameCollision`] on the first repeated name
/// - [`NoBgError::Archive`] / [`NoBgError::Io`] if the container cannot be built
pub fn build_archive(items: &[OutputItem]) -> Result<Vec<u8>> {
    check_unique_names(items.iter().map(OutputItem::name))?;

    let _span = crate::tracing_config::spans::archive(items.len()).entered();

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for item in items {
        writer.start_file(item.name(), options)?;
        writer.write_all(item.bytes())?;
        log::trace!("Archived {} ({} bytes)", item.name(), item.len());
    }

    let bytes = writer.finish()?.into_inner();
    log::debug!(
        "Built archive with {} entries ({} bytes)",
        items.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Reject names that are not a single plain file name
///
/// Output names become file names inside the output directory and entry
/// names inside archives, so they must not carry path components.
///
/// # Errors
/// - [`NoBgError::InvalidConfig`] for empty names, `.`/`..`, or names holding
///   `/`, `\`, `:` or NUL
///
/// # Examples
///
/// ```
/// use nobg::archive::check_entry_name;
///
/// assert!(check_entry_name("cat_noBg.png").is_ok());
/// assert!(check_entry_name("../cat_noBg.png").is_err());
/// ```
pub fn check_entry_name(name: &str) -> Result<()> {
    let has_separator = name.contains(['/', '\\', ':', '\0']);
    if name.is_empty() || name == "." || name == ".." || has_separator {
        return Err(NoBgError::invalid_config(format!(
            "'{name}' is not a plain file name"
        )));
    }
    Ok(())
}

/// Fail on the first name that is not a plain file name or is seen twice
///
/// # Errors
/// - [`NoBgError::InvalidConfig`] from [`check_entry_name`]
/// - [`NoBgError::NameCollision`] on the first repeated name
pub fn check_unique_names<'a, I>(names: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for name in names {
        check_entry_name(name)?;
        if !seen.insert(name) {
            return Err(NoBgError::NameCollision {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}
