//! Delimited style file codec.
//!
//! A style file is UTF-8 text with a byte-order mark, one header line, and
//! one row per style with exactly three fields: `name, prompt, negative_prompt`.
//!
//! The physical header is never trusted: the first line is always skipped
//! and the fixed schema is used instead, so a drifted or hand-edited header
//! heals itself on the next save. Extra columns are ignored and missing
//! trailing columns read as empty strings.

use crate::models::{Collection, StyleRecord};
use crate::{Error, Result};
use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Logical columns of a style file, in order.
pub const COLUMNS: [&str; 3] = ["name", "prompt", "negative_prompt"];

/// UTF-8 byte-order mark written at the start of every style file.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parses style file bytes into records.
///
/// Records come back in physical row order with empty `sort` and `notes`.
///
/// # Errors
///
/// Returns the underlying CSV error if a row is not valid UTF-8 or cannot be parsed.
pub fn decode(bytes: &[u8]) -> std::result::Result<Vec<StyleRecord>, csv::Error> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let field = |i: usize| row.get(i).unwrap_or_default().to_string();
        records.push(StyleRecord::new(field(0), field(1), field(2)));
    }
    Ok(records)
}

/// Serializes a collection to style file bytes.
///
/// Only `name`, `prompt` and `negative_prompt` are written. Field contents are
/// written as-is; callers restore line breaks beforehand.
///
/// # Errors
///
/// Returns an error if the CSV writer fails.
pub fn encode(collection: &Collection) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(UTF8_BOM.to_vec());

    writer
        .write_record(COLUMNS)
        .map_err(|e| Error::failed("write_style_header", e))?;

    for record in collection {
        writer
            .write_record([&record.name, &record.prompt, &record.negative_prompt])
            .map_err(|e| Error::failed("write_style_row", e))?;
    }

    writer
        .into_inner()
        .map_err(|e| Error::failed("flush_style_file", e))
}

/// Returns the temporary sibling used while replacing `path`.
#[must_use]
pub fn temp_sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Replaces `path` with `bytes` using write-to-temp, fsync, rename.
///
/// Readers of `path` observe either the old or the new contents.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be written or renamed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = temp_sibling(path, ".tmp");

    let write = || -> std::io::Result<()> {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&temp_path, path)
    };

    write().map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        Error::failed("write_style_file", format!("{}: {e}", path.display()))
    })
}
