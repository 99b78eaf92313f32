//! Partition management: moving styles between the default collection and partitions.
//!
//! A style named `prefix::name` in the default collection belongs to the
//! partition `prefix`, where it is stored under its bare `name`.
//!
//! - [`PartitionManager::extract`] pushes prefixed default records down into
//!   their partitions (add-or-replace by bare name).
//! - [`PartitionManager::merge`] rebuilds the default collection from its
//!   unprefixed records plus every partition's records, re-qualified.
//!
//! A prefix only maps to a partition when it is already the partition's
//! canonical name (`cat`, not `cat.csv`, `a/cat`, `..` or empty). Records
//! with any other prefix never leave the default collection.

use super::cache::CollectionCache;
use crate::models::{Collection, StyleRecord, name};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::instrument;

/// Extracts and merges partitions through the collection cache.
#[derive(Debug, Clone)]
pub struct PartitionManager {
    cache: Arc<CollectionCache>,
}

impl PartitionManager {
    /// Creates a partition manager over `cache`.
    #[must_use]
    pub const fn new(cache: Arc<CollectionCache>) -> Self {
        Self { cache }
    }

    /// Lists partition prefixes, sorted, optionally with the default `""` first.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition directory cannot be read.
    pub fn list(&self, include_default: bool) -> Result<Vec<String>> {
        self.cache.paths().list_partitions(include_default)
    }

    /// Returns `prefix` if it is the canonical name of a partition file.
    fn partition_for(&self, prefix: &str) -> Option<String> {
        match self.cache.paths().prefix_of(prefix) {
            Ok(canonical) if !canonical.is_empty() && canonical == prefix => Some(canonical),
            _ => None,
        }
    }

    /// Copies every prefixed record of the default collection into its partition.
    ///
    /// Records already in the partition are replaced in place; records that
    /// only exist in the partition are kept. Partition files are created as
    /// needed. Records whose prefix does not map to a partition stay in the
    /// default collection only. Returns the number of records written.
    ///
    /// # Errors
    ///
    /// Returns an error if a partition cannot be created or saved.
    #[instrument(skip(self))]
    pub fn extract(&self) -> Result<usize> {
        let default = self.cache.get("")?;
        let mut partitions: BTreeMap<String, Collection> = BTreeMap::new();
        let mut written = 0;

        for record in default {
            let (Some(prefix), bare) = name::split(&record.name) else {
                continue;
            };
            let Some(prefix) = self.partition_for(prefix) else {
                tracing::warn!(style = %record.name, "Prefix does not name a partition; keeping style in default collection");
                continue;
            };

            if !partitions.contains_key(&prefix) {
                self.cache.paths().create_partition_if_missing(&prefix)?;
                let existing = self.cache.get(&prefix)?;
                partitions.insert(prefix.clone(), existing);
            }

            let bare = bare.to_string();
            if let Some(partition) = partitions.get_mut(&prefix) {
                partition.upsert(StyleRecord { name: bare, ..record });
                written += 1;
            }
        }

        for (prefix, partition) in partitions {
            self.cache.save(&prefix, partition)?;
        }

        tracing::info!(records = written, "Extracted styles into partitions");
        Ok(written)
    }

    /// Rebuilds the default collection from its unprefixed records plus all partitions.
    ///
    /// Default records whose prefix names no existing partition are kept as
    /// they are. Partitions that are empty are deleted. Sort ordinals are
    /// renumbered `1..=N`. Returns the new default collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition directory cannot be listed or the
    /// default collection cannot be saved.
    #[instrument(skip(self))]
    pub fn merge(&self) -> Result<Collection> {
        let partitions = self.list(false)?;
        let listed: HashSet<&str> = partitions.iter().map(String::as_str).collect();
        let mut merged: Collection = self
            .cache
            .get("")?
            .into_iter()
            .filter(|r| match name::split(&r.name) {
                (Some(prefix), _) => !listed.contains(prefix),
                (None, _) => true,
            })
            .collect();

        for prefix in &partitions {
            let partition = self.cache.get(prefix)?;
            if partition.is_empty() {
                match self.cache.remove_partition(prefix) {
                    Ok(_) => {
                        metrics::counter!("stylestore_partitions_removed_total").increment(1);
                        tracing::info!(partition = %prefix, "Removed empty partition");
                    },
                    Err(e) => {
                        tracing::warn!(partition = %prefix, error = %e, "Failed to remove empty partition");
                    },
                }
                continue;
            }

            for record in partition {
                let qualified = name::merge(Some(prefix.as_str()), &record.name);
                merged.push(StyleRecord {
                    name: qualified,
                    ..record
                });
            }
        }

        merged.renumber();
        let saved = self.cache.save("", merged)?;
        tracing::info!(records = saved.len(), "Merged partitions into default collection");
        Ok(saved)
    }

    /// Removes a style from the default collection and, if prefixed, from its partition.
    ///
    /// Returns `true` if anything was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection cannot be saved.
    #[instrument(skip(self))]
    pub fn remove_style(&self, style: &str) -> Result<bool> {
        let mut removed = false;

        let mut default = self.cache.get("")?;
        if default.remove(style) > 0 {
            self.cache.save("", default)?;
            removed = true;
        }

        if let (Some(prefix), bare) = name::split(style)
            && self.cache.exists(prefix)
        {
            let mut partition = self.cache.get(prefix)?;
            if partition.remove(bare) > 0 {
                self.cache.save(prefix, partition)?;
                removed = true;
            }
        }

        Ok(removed)
    }

    /// Moves a default-collection style under `new_prefix` (`""` for unprefixed).
    ///
    /// `new_prefix` is normalised to its partition name (`dir/cat.csv` becomes
    /// `cat`) and the partition file is created before anything is saved. The
    /// record is then renamed in place in the default collection, removed from
    /// its old partition, and added to (or replaced in) the new one. Returns
    /// the new qualified name.
    ///
    /// # Errors
    ///
    /// Returns an error if the style does not exist, `new_prefix` cannot name
    /// a partition, or a collection cannot be saved. An unusable prefix
    /// leaves every collection unchanged.
    #[instrument(skip(self))]
    pub fn move_style(&self, style: &str, new_prefix: &str) -> Result<String> {
        let target = if new_prefix.is_empty() {
            String::new()
        } else {
            match self.cache.paths().prefix_of(new_prefix) {
                Ok(canonical) if !canonical.is_empty() => canonical,
                _ => {
                    return Err(Error::InvalidInput(format!(
                        "Not a usable partition name: {new_prefix}"
                    )));
                },
            }
        };

        let default = self.cache.get("")?;
        let Some(record) = default.get(style).cloned() else {
            return Err(Error::InvalidInput(format!("Style not found: {style}")));
        };

        let new_name = name::resolve(style, &target, true);
        if new_name == style {
            return Ok(new_name);
        }
        if !target.is_empty() {
            self.cache.paths().create_partition_if_missing(&target)?;
        }

        let renamed: Collection = default
            .into_iter()
            .map(|r| {
                if r.name == style {
                    StyleRecord {
                        name: new_name.clone(),
                        ..r
                    }
                } else {
                    r
                }
            })
            .collect();
        self.cache.save("", renamed)?;

        if let (Some(old_prefix), bare) = name::split(style)
            && self.cache.exists(old_prefix)
        {
            let mut partition = self.cache.get(old_prefix)?;
            if partition.remove(bare) > 0 {
                self.cache.save(old_prefix, partition)?;
            }
        }

        if !target.is_empty() {
            let mut partition = self.cache.get(&target)?;
            partition.upsert(StyleRecord {
                name: name::split(&new_name).1.to_string(),
                ..record
            });
            self.cache.save(&target, partition)?;
        }

        tracing::info!(from = %style, to = %new_name, "Moved style");
        Ok(new_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StyleStoreConfig;
    use crate::services::cache::NoopStylesChanged;
    use crate::storage::{CollectionStore, NotesDictionary, StylePaths};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn manager_in(dir: &TempDir) -> (PartitionManager, Arc<CollectionCache>) {
        let paths = StylePaths::from_config(&StyleStoreConfig::rooted_at(dir.path()));
        paths.ensure_dirs().unwrap();
        let notes = NotesDictionary::load(paths.notes_file());
        let store = CollectionStore::new(Arc::new(paths), Arc::new(notes));
        let cache = Arc::new(CollectionCache::new(store, Arc::new(NoopStylesChanged)));
        (PartitionManager::new(cache.clone()), cache)
    }

    fn name_set(c: &Collection) -> BTreeSet<String> {
        c.iter().map(|r| r.name.clone()).collect()
    }

    fn seed(cache: &CollectionCache, names: &[&str]) {
        let data: Collection = names
            .iter()
            .map(|n| StyleRecord::new(*n, format!("prompt of {n}"), ""))
            .collect();
        cache.save("", data).unwrap();
    }

    #[test]
    fn test_extract_creates_partitions() {
        let dir = TempDir::new().unwrap();
        let (manager, cache) = manager_in(&dir);
        seed(&cache, &["cat::x", "cat::y", "dog::z", "plain"]);

        assert_eq!(manager.extract().unwrap(), 3);
        assert_eq!(manager.list(false).unwrap(), vec!["cat", "dog"]);
        assert_eq!(cache.get("cat").unwrap().names(), vec!["x", "y"]);
        assert_eq!(cache.get("dog").unwrap().names(), vec!["z"]);
    }

    #[test]
    fn test_extract_upserts_in_place_and_keeps_partition_only_records() {
        let dir = TempDir::new().unwrap();
        let (manager, cache) = manager_in(&dir);
        cache
            .save(
                "cat",
                vec![
                    StyleRecord::new("manual", "kept", ""),
                    StyleRecord::new("x", "stale", ""),
                ]
                .into(),
            )
            .unwrap();
        seed(&cache, &["cat::x"]);

        manager.extract().unwrap();
        manager.extract().unwrap();

        let cat = cache.get("cat").unwrap();
        assert_eq!(cat.names(), vec!["manual", "x"]);
        assert_eq!(cat.get("x").unwrap().prompt, "prompt of cat::x");
    }

    #[test]
    fn test_extract_then_merge_is_inverse() {
        let dir = TempDir::new().unwrap();
        let (manager, cache) = manager_in(&dir);
        seed(&cache, &["cat::x", "plain", "cat::y", "other"]);

        manager.extract().unwrap();
        let merged = manager.merge().unwrap();

        let expected: BTreeSet<String> = ["cat::x", "cat::y", "plain", "other"]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(name_set(&merged), expected);
        assert_eq!(&merged.names()[..2], &["plain", "other"]);

        let sorts: Vec<&str> = merged.iter().map(|r| r.sort.as_str()).collect();
        assert_eq!(sorts, vec!["1", "2", "3", "4"]);
        assert_eq!(cache.get("cat").unwrap().names(), vec!["x", "y"]);
    }

    #[test]
    fn test_merge_removes_empty_partition() {
        let dir = TempDir::new().unwrap();
        let (manager, cache) = manager_in(&dir);
        seed(&cache, &["plain"]);
        cache.paths().create_partition_if_missing("cat").unwrap();

        let merged = manager.merge().unwrap();
        assert_eq!(merged.names(), vec!["plain"]);
        assert!(manager.list(false).unwrap().is_empty());
    }

    #[test]
    fn test_remove_style_from_both_sides() {
        let dir = TempDir::new().unwrap();
        let (manager, cache) = manager_in(&dir);
        seed(&cache, &["cat::x", "cat::y"]);
        manager.extract().unwrap();

        assert!(manager.remove_style("cat::x").unwrap());
        assert_eq!(cache.get("").unwrap().names(), vec!["cat::y"]);
        assert_eq!(cache.get("cat").unwrap().names(), vec!["y"]);
        assert!(!manager.remove_style("cat::missing").unwrap());
    }

    #[test]
    fn test_move_style_between_partitions() {
        let dir = TempDir::new().unwrap();
        let (manager, cache) = manager_in(&dir);
        seed(&cache, &["cat::x", "plain"]);
        manager.extract().unwrap();

        assert_eq!(manager.move_style("cat::x", "dog").unwrap(), "dog::x");
        assert_eq!(cache.get("").unwrap().names(), vec!["dog::x", "plain"]);
        assert!(cache.get("cat").unwrap().is_empty());
        assert_eq!(cache.get("dog").unwrap().names(), vec!["x"]);

        assert_eq!(manager.move_style("plain", "dog").unwrap(), "dog::plain");
        assert_eq!(manager.move_style("dog::plain", "").unwrap(), "plain");
        assert_eq!(cache.get("dog").unwrap().names(), vec!["x"]);
    }

    #[test]
    fn test_move_missing_style_fails() {
        let dir = TempDir::new().unwrap();
        let (manager, _cache) = manager_in(&dir);
        assert!(manager.move_style("nope", "cat").is_err());
    }

    #[test]
    fn test_unmappable_prefixes_survive_extract_and_merge() {
        let dir = TempDir::new().unwrap();
        let (manager, cache) = manager_in(&dir);
        seed(&cache, &["::empty", "..::dots", "a/b::slash", "cat.csv::ext", "plain"]);

        assert_eq!(manager.extract().unwrap(), 0);
        assert!(manager.list(false).unwrap().is_empty());

        let merged = manager.merge().unwrap();
        assert_eq!(
            merged.names(),
            vec!["::empty", "..::dots", "a/b::slash", "cat.csv::ext", "plain"]
        );
        assert_eq!(
            merged.get("a/b::slash").unwrap().prompt,
            "prompt of a/b::slash"
        );
    }

    #[test]
    fn test_merge_keeps_prefixed_style_without_partition() {
        let dir = TempDir::new().unwrap();
        let (manager, cache) = manager_in(&dir);
        seed(&cache, &["cat::x", "dog::y"]);
        manager.extract().unwrap();
        cache.remove_partition("dog").unwrap();

        let merged = manager.merge().unwrap();
        assert_eq!(merged.names(), vec!["dog::y", "cat::x"]);
    }

    #[test]
    fn test_move_to_unusable_prefix_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let (manager, cache) = manager_in(&dir);
        seed(&cache, &["x"]);
        let before = std::fs::read(cache.paths().default_style_file()).unwrap();

        assert!(matches!(
            manager.move_style("x", ".."),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(cache.get("").unwrap().names(), vec!["x"]);
        assert_eq!(
            std::fs::read(cache.paths().default_style_file()).unwrap(),
            before
        );
        assert!(manager.list(false).unwrap().is_empty());

        assert_eq!(manager.merge().unwrap().names(), vec!["x"]);
    }

    #[test]
    fn test_move_normalises_target_prefix() {
        let dir = TempDir::new().unwrap();
        let (manager, cache) = manager_in(&dir);
        seed(&cache, &["x"]);

        assert_eq!(manager.move_style("x", "a/b.csv").unwrap(), "b::x");
        assert_eq!(cache.get("").unwrap().names(), vec!["b::x"]);
        assert_eq!(cache.get("b").unwrap().names(), vec!["x"]);
        assert_eq!(manager.merge().unwrap().names(), vec!["b::x"]);
    }
}
