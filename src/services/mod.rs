//! Business logic services.
//!
//! Services orchestrate the storage layer and provide high-level operations:
//! the collection cache, partition extract / merge, backups, and the
//! pending-gated auto-backup task, tied together by [`StyleService`].

// Allow significant_drop_tightening - guards are scoped to the statement that needs them.
#![allow(clippy::significant_drop_tightening)]

mod backup;
mod cache;
mod commands;
mod editor;
mod partition;
mod scheduler;

pub use backup::{BACKUP_TIMESTAMP_FORMAT, BackupService, ENCRYPTED_EXTENSION};
pub use cache::{CollectionCache, NoopStylesChanged, StylesChanged};
pub use commands::{CommandQueue, StyleCommand};
pub use editor::StyleService;
pub use partition::PartitionManager;
pub use scheduler::BackgroundTask;
