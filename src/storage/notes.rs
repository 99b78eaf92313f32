//! Notes dictionary persisted as a JSON sidecar.
//!
//! Notes are not part of the three-column style file. They are kept in a
//! single JSON object mapping the qualified style name (`prefix::name`, or
//! the bare name for the default collection) to the notes text, and the whole
//! object is rewritten after every update.

use super::style_file::write_atomic;
use crate::models::{Collection, name};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-memory notes keyed by qualified style name, with write-through persistence.
#[derive(Debug)]
pub struct NotesDictionary {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl NotesDictionary {
    /// Loads the sidecar at `path`.
    ///
    /// A missing or unreadable sidecar yields an empty dictionary.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Notes sidecar is not a JSON object of strings; starting empty"
                );
                BTreeMap::new()
            }),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "No notes sidecar");
                BTreeMap::new()
            },
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Returns the sidecar path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the notes for `style` in the collection identified by `prefix`.
    #[must_use]
    pub fn lookup(&self, prefix: &str, style: &str) -> String {
        let key = name::merge(Some(prefix), style);
        self.entries().get(&key).cloned().unwrap_or_default()
    }

    /// Records the notes of every style in `collection` under `prefix`.
    pub fn update(&self, prefix: &str, collection: &Collection) {
        let mut entries = self.entries();
        for record in collection {
            entries.insert(name::merge(Some(prefix), &record.name), record.notes.clone());
        }
    }

    /// Writes the whole dictionary to the sidecar.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub fn save(&self) -> Result<()> {
        let bytes = serde_json::to_vec(&*self.entries())
            .map_err(|e| Error::failed("serialize_notes", e))?;
        write_atomic(&self.path, &bytes)
    }

    /// Updates from `collection` and immediately persists.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar cannot be written.
    pub fn update_and_save(&self, prefix: &str, collection: &Collection) -> Result<()> {
        self.update(prefix, collection);
        self.save()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StyleRecord;
    use tempfile::TempDir;

    #[test]
    fn test_missing_sidecar_is_empty() {
        let dir = TempDir::new().unwrap();
        let notes = NotesDictionary::load(dir.path().join("notes.json"));
        assert!(notes.is_empty());
        assert_eq!(notes.lookup("", "anything"), "");
    }

    #[test]
    fn test_corrupt_sidecar_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(NotesDictionary::load(&path).is_empty());
    }

    #[test]
    fn test_qualified_keys_and_write_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.json");
        let notes = NotesDictionary::load(&path);

        let partition: Collection = vec![StyleRecord::new("x", "", "").with_notes("in cat")].into();
        let default: Collection =
            vec![StyleRecord::new("plain", "", "").with_notes("top level")].into();
        notes.update_and_save("cat", &partition).unwrap();
        notes.update_and_save("", &default).unwrap();

        assert_eq!(notes.lookup("cat", "x"), "in cat");
        assert_eq!(notes.lookup("", "cat::x"), "in cat");
        assert_eq!(notes.lookup("", "plain"), "top level");

        let reloaded = NotesDictionary::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.lookup("cat", "x"), "in cat");

        let raw: BTreeMap<String, String> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw.get("cat::x").map(String::as_str), Some("in cat"));
    }
}
