//! Collection store: one collection identity backed by one style file.
//!
//! # Load policy
//!
//! Loading never fails the caller. [`CollectionStore::try_load`] reports why a
//! file could not be read as a [`LoadError`]; [`CollectionStore::load`] logs it
//! and substitutes an empty collection.
//!
//! # Save
//!
//! Saving restores real line breaks, makes names unique, writes the three
//! persisted columns atomically, then writes notes through to the sidecar.
//! Any write failure is returned as an error.

use super::notes::NotesDictionary;
use super::paths::StylePaths;
use super::style_file;
use crate::models::Collection;
use crate::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error as ThisError;
use tracing::instrument;

/// Why a collection file could not be loaded.
#[derive(Debug, ThisError)]
pub enum LoadError {
    /// The backing file does not exist.
    #[error("style file not found: {0}")]
    Missing(PathBuf),

    /// The backing file exists but could not be read.
    #[error("cannot read style file {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The backing file could not be parsed.
    #[error("malformed style file {path}: {cause}")]
    Malformed {
        /// File that failed.
        path: PathBuf,
        /// Parser message.
        cause: String,
    },

    /// The collection name does not map to a file.
    #[error("invalid collection name: {0}")]
    InvalidName(String),
}

/// Loads and saves collections by prefix.
#[derive(Debug, Clone)]
pub struct CollectionStore {
    paths: Arc<StylePaths>,
    notes: Arc<NotesDictionary>,
}

impl CollectionStore {
    /// Creates a store over the given paths and notes dictionary.
    #[must_use]
    pub const fn new(paths: Arc<StylePaths>, notes: Arc<NotesDictionary>) -> Self {
        Self { paths, notes }
    }

    /// Returns the path configuration.
    #[must_use]
    pub fn paths(&self) -> &StylePaths {
        &self.paths
    }

    /// Returns the notes dictionary.
    #[must_use]
    pub fn notes(&self) -> &NotesDictionary {
        &self.notes
    }

    /// Loads the collection named by `prefix` (`""` for the default collection).
    ///
    /// Sort ordinals are assigned `1..=N` by row order, notes are attached
    /// from the notes dictionary, and line breaks in user fields are replaced
    /// by the display marker.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] describing why the file could not be used.
    pub fn try_load(&self, prefix: &str) -> std::result::Result<Collection, LoadError> {
        let path = self
            .paths
            .full_path(prefix)
            .map_err(|_| LoadError::InvalidName(prefix.to_string()))?;
        let identity = self.paths.display_name(&path);

        let bytes = std::fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LoadError::Missing(path.clone())
            } else {
                LoadError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        let records = style_file::decode(&bytes).map_err(|e| LoadError::Malformed {
            path: path.clone(),
            cause: e.to_string(),
        })?;

        let mut collection: Collection = records
            .into_iter()
            .map(|mut record| {
                record.notes = self.notes.lookup(&identity, &record.name);
                record
            })
            .collect();
        collection.renumber();
        collection.mark_line_breaks();
        Ok(collection)
    }

    /// Loads the collection named by `prefix`, recovering to empty on any failure.
    #[must_use]
    pub fn load(&self, prefix: &str) -> Collection {
        match self.try_load(prefix) {
            Ok(collection) => collection,
            Err(LoadError::Missing(path)) => {
                tracing::debug!(path = %path.display(), "Style file missing; using empty collection");
                Collection::new()
            },
            Err(e) => {
                tracing::warn!(prefix, error = %e, "Style file unusable; using empty collection");
                Collection::new()
            },
        }
    }

    /// Persists `data` as the collection named by `prefix`.
    ///
    /// Returns the collection as a reload would see it: names made unique,
    /// line breaks in display form, sort ordinals renumbered `1..=N`.
    ///
    /// # Errors
    ///
    /// Returns an error if the style file or the notes sidecar cannot be written.
    #[instrument(skip(self, data), fields(records = data.len()))]
    pub fn save(&self, prefix: &str, data: &Collection) -> Result<Collection> {
        let path = self.paths.full_path(prefix)?;
        let identity = self.paths.display_name(&path);

        let mut persisted = data.clone();
        persisted.restore_line_breaks();
        let renamed = persisted.dedup_names();
        if renamed > 0 {
            tracing::warn!(
                collection = %identity,
                renamed,
                "Renamed duplicate style names before saving"
            );
        }

        let bytes = style_file::encode(&persisted)?;
        StylePaths::ensure_parent_dir(&path)?;
        style_file::write_atomic(&path, &bytes)?;
        self.notes.update_and_save(&identity, &persisted)?;

        metrics::counter!("stylestore_collection_saves_total").increment(1);
        tracing::debug!(collection = %identity, path = %path.display(), "Saved collection");

        persisted.mark_line_breaks();
        persisted.renumber();
        Ok(persisted)
    }

    /// Returns `true` if the backing file for `prefix` exists.
    #[must_use]
    pub fn exists(&self, prefix: &str) -> bool {
        self.paths.full_path(prefix).is_ok_and(|p| p.exists())
    }

    /// Deletes the backing file of a partition.
    ///
    /// Returns `false` if the file did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error for the default collection, or if removal fails.
    pub fn remove(&self, prefix: &str) -> Result<bool> {
        let path = self.paths.full_path(prefix)?;
        if path == self.paths.default_style_file() {
            return Err(Error::InvalidInput(
                "The default style file cannot be removed".to_string(),
            ));
        }

        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::failed(
                "remove_partition_file",
                format!("{}: {e}", path.display()),
            )),
        }
    }
}
