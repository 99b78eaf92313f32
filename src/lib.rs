//! # Stylestore
//!
//! Storage and partition management for prompt style collections.
//!
//! A style is a named pair of prompt / negative prompt texts with free-form
//! notes. Styles live in a delimited text file (the *default collection*) and
//! may be split into named *partitions* ("additional style files") using the
//! `prefix::name` naming convention.
//!
//! ## Features
//!
//! - BOM-preserving, self-healing three-column style file codec
//! - Notes tracked out of band in a JSON sidecar, keyed by qualified name
//! - Bidirectional extract / merge between the default collection and partitions
//! - Timestamped backups with retention pruning and optional AES-256-GCM encryption
//! - Restore with rollback, and a pending-gated background backup scheduler
//!
//! ## Example
//!
//! ```rust,ignore
//! use stylestore::{StyleService, StyleStoreConfig};
//!
//! let service = StyleService::new(StyleStoreConfig::load_default())?;
//! let mut styles = service.collection("")?;
//! styles.push(StyleRecord::new("cat::portrait", "a portrait", "blurry"));
//! service.save_collection("", styles)?;
//! service.extract()?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod models;
pub mod observability;
pub mod security;
pub mod services;
pub mod storage;

pub use config::{EncryptionSettings, StyleStoreConfig};
pub use models::{Collection, StyleRecord};
pub use services::{
    BackgroundTask, BackupService, CollectionCache, CommandQueue, PartitionManager,
    StyleCommand, StyleService, StylesChanged,
};
pub use storage::{CollectionStore, LoadError, NotesDictionary, StylePaths};

/// Error type for stylestore operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Unusable partition names, malformed config values, bad key material |
/// | `OperationFailed` | Filesystem writes fail, sidecar cannot be written, cipher errors |
/// | `Restore` | A restore is rejected or rolled back |
/// | `FeatureNotEnabled` | Encryption requested without the `encryption` feature |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - A style file, partition file or notes sidecar cannot be written
    /// - A directory cannot be created or listed
    /// - A backup copy or retention prune fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A restore from backup did not complete.
    ///
    /// The live style file is left as it was before the restore started.
    #[error(transparent)]
    Restore(#[from] RestoreError),

    /// Feature not enabled (requires feature flag).
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from an operation name and any displayable cause.
    pub fn failed(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// User-visible reasons a restore was rejected.
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum RestoreError {
    /// The source file is neither a plain nor an encrypted backup.
    #[error("Can only restore from .csv or .aes file")]
    UnsupportedExtension,

    /// An encrypted backup was supplied but no passphrase is configured.
    #[error("Enter the encryption key before restoring an .aes file")]
    MissingPassphrase,

    /// The encrypted backup could not be decrypted with the configured passphrase.
    #[error("Failed to decrypt .aes file")]
    DecryptionFailed,

    /// The file swap itself failed.
    #[error("Restore failed: {0}")]
    Io(String),
}

/// Result type alias for stylestore operations.
pub type Result<T> = std::result::Result<T, Error>;
