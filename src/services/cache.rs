//! Collection cache: the single gate through which collections are read and written.
//!
//! Callers always receive copies. Edits become visible to other callers only
//! after an explicit [`CollectionCache::save`].

use crate::models::Collection;
use crate::storage::{CollectionStore, StylePaths};
use crate::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::instrument;

/// Host hook notified after every successful save.
pub trait StylesChanged: Send + Sync {
    /// Called once the saved collection is on disk.
    fn styles_changed(&self);
}

/// A [`StylesChanged`] hook that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStylesChanged;

impl StylesChanged for NoopStylesChanged {
    fn styles_changed(&self) {}
}

/// Registry of loaded collections keyed by prefix.
pub struct CollectionCache {
    store: CollectionStore,
    entries: Mutex<HashMap<String, Collection>>,
    on_change: Arc<dyn StylesChanged>,
}

impl std::fmt::Debug for CollectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionCache")
            .field("store", &self.store)
            .field("cached", &self.entries().len())
            .finish_non_exhaustive()
    }
}

impl CollectionCache {
    /// Creates a cache over `store` that notifies `on_change` after saves.
    #[must_use]
    pub fn new(store: CollectionStore, on_change: Arc<dyn StylesChanged>) -> Self {
        Self {
            store,
            entries: Mutex::new(HashMap::new()),
            on_change,
        }
    }

    /// Returns the path configuration.
    #[must_use]
    pub fn paths(&self) -> &StylePaths {
        self.store.paths()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Collection>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the collection named by `prefix`, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if `prefix` does not name a usable style file.
    pub fn get(&self, prefix: &str) -> Result<Collection> {
        let prefix = self.paths().prefix_of(prefix)?;
        let mut entries = self.entries();
        let collection = entries
            .entry(prefix)
            .or_insert_with_key(|prefix| self.store.load(prefix));
        Ok(collection.clone())
    }

    /// Replaces the collection named by `prefix` with `data` and persists it.
    ///
    /// Returns the collection as persisted (unique names). The cache is only
    /// updated once the write succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is unusable or the write fails.
    #[instrument(skip(self, data), fields(records = data.len()))]
    pub fn save(&self, prefix: &str, data: Collection) -> Result<Collection> {
        let prefix = self.paths().prefix_of(prefix)?;
        let saved = {
            let mut entries = self.entries();
            if !entries.contains_key(&prefix) {
                let baseline = self.store.load(&prefix);
                entries.insert(prefix.clone(), baseline);
            }
            let saved = self.store.save(&prefix, &data)?;
            entries.insert(prefix, saved.clone());
            saved
        };
        self.on_change.styles_changed();
        Ok(saved)
    }

    /// Returns `true` if the backing file for `prefix` exists.
    #[must_use]
    pub fn exists(&self, prefix: &str) -> bool {
        self.store.exists(prefix)
    }

    /// Deletes a partition file and forgets its cached collection.
    ///
    /// # Errors
    ///
    /// Returns an error for the default collection or if the file cannot be removed.
    pub fn remove_partition(&self, prefix: &str) -> Result<bool> {
        let prefix = self.paths().prefix_of(prefix)?;
        let removed = self.store.remove(&prefix)?;
        self.entries().remove(&prefix);
        Ok(removed)
    }

    /// Drops every cached collection so the next access reloads from disk.
    pub fn clear(&self) {
        let mut entries = self.entries();
        tracing::debug!(dropped = entries.len(), "Cleared collection cache");
        entries.clear();
    }

    /// Number of cached collections.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.entries().len()
    }
}
