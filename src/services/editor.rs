//! The style service: one injected context object owning every component.
//!
//! Front ends hold a `StyleService` and never touch files directly. It tracks
//! which collection is being edited, routes reads and writes through the
//! collection cache, and marks the auto-backup task pending after each edit.

use super::backup::BackupService;
use super::cache::{CollectionCache, NoopStylesChanged, StylesChanged};
use super::commands::{CommandQueue, StyleCommand};
use super::partition::PartitionManager;
use super::scheduler::BackgroundTask;
use crate::config::{EncryptionSettings, StyleStoreConfig};
use crate::models::Collection;
use crate::storage::{CollectionStore, NotesDictionary, StylePaths};
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::instrument;

#[derive(Debug, Default)]
struct EditorState {
    current: String,
    partition_mode: bool,
    autosort: bool,
}

/// Facade over storage, partitions, backups and the auto-backup task.
#[derive(Debug)]
pub struct StyleService {
    config: StyleStoreConfig,
    cache: Arc<CollectionCache>,
    partitions: PartitionManager,
    backups: Arc<BackupService>,
    auto_backup: BackgroundTask,
    commands: CommandQueue,
    state: Mutex<EditorState>,
}

impl StyleService {
    /// Creates a service with no host notification hook.
    ///
    /// # Errors
    ///
    /// Returns an error if the style directories cannot be created.
    pub fn new(config: StyleStoreConfig) -> Result<Self> {
        Self::with_hook(config, Arc::new(NoopStylesChanged))
    }

    /// Creates a service that notifies `on_change` after every save.
    ///
    /// # Errors
    ///
    /// Returns an error if the style directories cannot be created.
    pub fn with_hook(config: StyleStoreConfig, on_change: Arc<dyn StylesChanged>) -> Result<Self> {
        let paths = Arc::new(StylePaths::from_config(&config));
        paths.ensure_dirs()?;

        let notes = Arc::new(NotesDictionary::load(paths.notes_file()));
        let store = CollectionStore::new(Arc::clone(&paths), notes);
        let cache = Arc::new(CollectionCache::new(store, on_change));
        let backups = Arc::new(BackupService::new(
            Arc::clone(&paths),
            config.backup_retention,
            config.encryption.clone(),
        ));

        let task_backups = Arc::clone(&backups);
        let auto_backup = BackgroundTask::new("stylestore-backup", config.backup_interval, move || {
            task_backups.backup().map(|_| ())
        });

        Ok(Self {
            partitions: PartitionManager::new(Arc::clone(&cache)),
            cache,
            backups,
            auto_backup,
            commands: CommandQueue::new(),
            state: Mutex::new(EditorState {
                autosort: config.autosort,
                ..EditorState::default()
            }),
            config,
        })
    }

    /// Returns the configuration the service was built with.
    #[must_use]
    pub const fn config(&self) -> &StyleStoreConfig {
        &self.config
    }

    /// Returns the resolved style paths.
    #[must_use]
    pub fn paths(&self) -> &StylePaths {
        self.cache.paths()
    }

    /// Returns the auto-backup task.
    #[must_use]
    pub const fn auto_backup(&self) -> &BackgroundTask {
        &self.auto_backup
    }

    fn state(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lists partition prefixes, optionally with the default `""` first.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition directory cannot be read.
    pub fn partitions(&self, include_default: bool) -> Result<Vec<String>> {
        self.partitions.list(include_default)
    }

    /// Prefix of the collection being edited (`""` for the default collection).
    #[must_use]
    pub fn current_prefix(&self) -> String {
        self.state().current.clone()
    }

    /// Returns `true` while partitions are edited separately.
    #[must_use]
    pub fn partition_mode(&self) -> bool {
        self.state().partition_mode
    }

    /// Makes `prefix` the collection being edited and returns its contents.
    ///
    /// # Errors
    ///
    /// Returns an error if `prefix` does not name a usable style file.
    pub fn select_partition(&self, prefix: &str) -> Result<Collection> {
        let prefix = self.paths().prefix_of(prefix)?;
        let collection = self.cache.get(&prefix)?;
        self.state().current = prefix;
        Ok(collection)
    }

    /// Switches between editing partitions separately and editing the default collection.
    ///
    /// Entering partition mode extracts prefixed styles into partitions and
    /// selects the first partition; leaving it merges them back and selects
    /// the default collection. Returns the newly selected collection.
    ///
    /// # Errors
    ///
    /// Returns an error if extract or merge fails.
    #[instrument(skip(self))]
    pub fn set_partition_mode(&self, enabled: bool) -> Result<Collection> {
        if enabled {
            self.partitions.extract()?;
            self.cache.clear();
            let current = self.current_prefix();
            let partitions = self.partitions(false)?;
            let target = if partitions.contains(&current) {
                current
            } else {
                partitions.into_iter().next().unwrap_or_default()
            };
            self.state().partition_mode = true;
            self.select_partition(&target)
        } else {
            self.partitions.merge()?;
            self.auto_backup.set_pending();
            self.cache.clear();
            self.state().partition_mode = false;
            self.select_partition("")
        }
    }

    /// Returns a copy of the collection named by `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if `prefix` does not name a usable style file.
    pub fn collection(&self, prefix: &str) -> Result<Collection> {
        self.cache.get(prefix)
    }

    /// Returns a copy of the collection being edited.
    ///
    /// # Errors
    ///
    /// Returns an error if the current prefix no longer names a usable style file.
    pub fn current_collection(&self) -> Result<Collection> {
        self.cache.get(&self.current_prefix())
    }

    /// Returns `true` if saves reorder records by their sort ordinals.
    #[must_use]
    pub fn autosort(&self) -> bool {
        self.state().autosort
    }

    /// Turns sorting by ordinal on save on or off.
    pub fn set_autosort(&self, enabled: bool) {
        self.state().autosort = enabled;
    }

    /// Replaces the collection named by `prefix` with `data`.
    ///
    /// Row order is kept as given. With [`Self::autosort`] on, records are
    /// first ordered by their numeric sort ordinals when every ordinal is
    /// numeric. Returns the collection as persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be written.
    pub fn save_collection(&self, prefix: &str, mut data: Collection) -> Result<Collection> {
        if self.autosort() && !data.autosort() {
            tracing::debug!(prefix, "Sort column not numeric; keeping row order");
        }
        let saved = self.cache.save(prefix, data)?;
        self.auto_backup.set_pending();
        Ok(saved)
    }

    /// Replaces the collection being edited with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be written.
    pub fn save_current(&self, data: Collection) -> Result<Collection> {
        self.save_collection(&self.current_prefix(), data)
    }

    /// Replaces `search` with `replace` in every text field of the current collection.
    ///
    /// Returns the number of fields changed; nothing is saved when none changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be written.
    pub fn search_and_replace(&self, search: &str, replace: &str) -> Result<usize> {
        let prefix = self.current_prefix();
        let mut collection = self.cache.get(&prefix)?;
        let changed = collection.search_and_replace(search, replace);
        if changed > 0 {
            self.save_collection(&prefix, collection)?;
        }
        Ok(changed)
    }

    /// Pushes prefixed default styles into their partitions.
    ///
    /// # Errors
    ///
    /// Returns an error if a partition cannot be written.
    pub fn extract(&self) -> Result<usize> {
        let written = self.partitions.extract()?;
        self.auto_backup.set_pending();
        Ok(written)
    }

    /// Rebuilds the default collection from partitions.
    ///
    /// # Errors
    ///
    /// Returns an error if the default collection cannot be written.
    pub fn merge(&self) -> Result<Collection> {
        let merged = self.partitions.merge()?;
        self.auto_backup.set_pending();
        Ok(merged)
    }

    /// Deletes a style from the default collection and its partition.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection cannot be written.
    pub fn delete_style(&self, style: &str) -> Result<bool> {
        let removed = self.partitions.remove_style(style)?;
        if removed {
            self.auto_backup.set_pending();
        }
        Ok(removed)
    }

    /// Moves a style under `prefix` (`""` for unprefixed). Returns its new name.
    ///
    /// # Errors
    ///
    /// Returns an error if the style does not exist or a collection cannot be written.
    pub fn move_style(&self, style: &str, prefix: &str) -> Result<String> {
        let moved = self.partitions.move_style(style, prefix)?;
        self.auto_backup.set_pending();
        Ok(moved)
    }

    /// Queues a command for [`StyleService::apply_pending_commands`].
    pub fn enqueue(&self, command: StyleCommand) {
        self.commands.enqueue(command);
    }

    /// Applies every queued command, then returns the refreshed current collection.
    ///
    /// A failing command is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the current collection cannot be read afterwards.
    #[instrument(skip(self))]
    pub fn apply_pending_commands(&self) -> Result<Collection> {
        for command in self.commands.drain() {
            let outcome = match &command {
                StyleCommand::Delete(style) => self.delete_style(style).map(|_| ()),
                StyleCommand::Move { style, prefix } => self.move_style(style, prefix).map(|_| ()),
            };
            if let Err(e) = outcome {
                tracing::warn!(?command, error = %e, "Queued style command failed");
            }
        }
        self.current_collection()
    }

    /// Replaces the backup encryption settings.
    pub fn set_encryption(&self, settings: EncryptionSettings) {
        self.backups.set_encryption(settings);
    }

    /// Backs up the default style file now.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup cannot be written.
    pub fn backup_now(&self) -> Result<Option<PathBuf>> {
        self.backups.backup()
    }

    /// Lists backups, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup directory cannot be read.
    pub fn backups(&self) -> Result<Vec<PathBuf>> {
        self.backups.list()
    }

    /// Restores the default style file from a backup.
    ///
    /// On success the cache is dropped and partitions are re-extracted from
    /// the restored collection.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Restore`] if the backup is rejected; the default
    /// style file is then unchanged.
    #[instrument(skip(self), fields(source = %source.display()))]
    pub fn restore(&self, source: &Path) -> Result<()> {
        self.backups.restore(source)?;
        self.cache.clear();
        self.partitions.extract()?;
        Ok(())
    }

    /// Starts the auto-backup task. Returns `false` if already running.
    ///
    /// # Errors
    ///
    /// Returns an error if the background thread cannot be spawned.
    pub fn start_auto_backup(&self) -> Result<bool> {
        self.auto_backup.start()
    }

    /// Stops the auto-backup task, running a final backup if one is pending.
    pub fn shutdown(&self) {
        self.auto_backup.stop();
        self.auto_backup.tick();
    }
}
