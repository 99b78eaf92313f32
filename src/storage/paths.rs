//! Centralized path management for style files.
//!
//! Every collection is identified by a prefix. The empty prefix names the
//! default style file; any other prefix names `<partition_dir>/<prefix>.csv`.
//!
//! # Examples
//!
//! ```rust,ignore
//! use stylestore::storage::StylePaths;
//!
//! let paths = StylePaths::from_config(&config);
//! paths.ensure_dirs()?;
//! assert_eq!(paths.full_path("cat")?, config.partition_dir.join("cat.csv"));
//! assert_eq!(paths.display_name(&paths.full_path("cat.csv")?), "cat");
//! ```

use crate::config::StyleStoreConfig;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Extension of plain style and backup files.
pub const STYLE_FILE_EXTENSION: &str = "csv";

/// Resolves collection prefixes to file paths.
#[derive(Debug, Clone)]
pub struct StylePaths {
    default_style_file: PathBuf,
    partition_dir: PathBuf,
    backup_dir: PathBuf,
    notes_file: PathBuf,
}

impl StylePaths {
    /// Creates paths from configuration.
    #[must_use]
    pub fn from_config(config: &StyleStoreConfig) -> Self {
        Self {
            default_style_file: config.default_style_file.clone(),
            partition_dir: config.partition_dir.clone(),
            backup_dir: config.backup_dir.clone(),
            notes_file: config.notes_file.clone(),
        }
    }

    /// Returns the default style file.
    #[must_use]
    pub fn default_style_file(&self) -> &Path {
        &self.default_style_file
    }

    /// Returns the partition directory.
    #[must_use]
    pub fn partition_dir(&self) -> &Path {
        &self.partition_dir
    }

    /// Returns the backup directory.
    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Returns the notes sidecar path.
    #[must_use]
    pub fn notes_file(&self) -> &Path {
        &self.notes_file
    }

    /// Ensures the partition and backup directories and the default file's parent exist.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.partition_dir, &self.backup_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::failed("create_style_dir", format!("{}: {e}", dir.display()))
            })?;
        }
        Self::ensure_parent_dir(&self.default_style_file)?;
        Self::ensure_parent_dir(&self.notes_file)
    }

    /// Ensures the parent directory of a path exists.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_parent_dir(path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
                .map_err(|e| Error::failed("create_parent_dir", e)),
            _ => Ok(()),
        }
    }

    /// Returns the file backing the collection named by `name`.
    ///
    /// `name` may be a bare prefix, `prefix.csv`, or a path whose file name is
    /// used. An empty name, or the default style file itself, resolves to the
    /// default style file.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` has no usable file name component.
    pub fn full_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || Path::new(name) == self.default_style_file {
            return Ok(self.default_style_file.clone());
        }

        let file_name = Path::new(name)
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| Error::InvalidInput(format!("Not a usable style file name: {name}")))?;

        let suffix = format!(".{STYLE_FILE_EXTENSION}");
        let file_name = if file_name.ends_with(&suffix) {
            file_name.to_string()
        } else {
            format!("{file_name}{suffix}")
        };

        Ok(self.partition_dir.join(file_name))
    }

    /// Returns the prefix identifying a collection file, `""` for the default file.
    #[must_use]
    pub fn display_name(&self, path: &Path) -> String {
        if path == self.default_style_file {
            return String::new();
        }
        path.file_stem()
            .and_then(|s| s.to_str())
            .map(String::from)
            .unwrap_or_default()
    }

    /// Normalizes any accepted collection name to its prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` has no usable file name component.
    pub fn prefix_of(&self, name: &str) -> Result<String> {
        Ok(self.display_name(&self.full_path(name)?))
    }

    /// Lists partition prefixes, sorted.
    ///
    /// With `include_default`, the default collection's empty prefix comes first.
    /// A missing partition directory yields no partitions.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition directory exists but cannot be read.
    pub fn list_partitions(&self, include_default: bool) -> Result<Vec<String>> {
        let mut prefixes = Vec::new();

        if self.partition_dir.is_dir() {
            let entries = std::fs::read_dir(&self.partition_dir)
                .map_err(|e| Error::failed("list_partition_dir", e))?;

            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some(STYLE_FILE_EXTENSION)
                {
                    continue;
                }
                prefixes.push(self.display_name(&path));
            }
        }

        prefixes.sort();
        if include_default {
            prefixes.insert(0, String::new());
        }
        Ok(prefixes)
    }

    /// Creates an empty partition file if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unusable or the file cannot be created.
    pub fn create_partition_if_missing(&self, prefix: &str) -> Result<PathBuf> {
        let path = self.full_path(prefix)?;
        if !path.exists() {
            Self::ensure_parent_dir(&path)?;
            std::fs::write(&path, b"").map_err(|e| Error::failed("create_partition_file", e))?;
            tracing::debug!(path = %path.display(), "Created partition file");
        }
        Ok(path)
    }
}
