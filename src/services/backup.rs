//! Backup and restore of the default style file.
//!
//! Backups are copies of the default style file named by local time at
//! minute resolution (`YYMMDD_HHMM.csv`), optionally encrypted
//! (`YYMMDD_HHMM.csv.aes`). After every backup only the most recently
//! modified backups are kept.
//!
//! Restore swaps the live file through a `.temp` sibling so that a failed
//! restore always leaves the original in place.

use crate::config::EncryptionSettings;
use crate::security::Encryptor;
use crate::storage::style_file::{temp_sibling, write_atomic};
use crate::storage::{STYLE_FILE_EXTENSION, StylePaths};
use crate::{Error, RestoreError, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;
use tracing::instrument;

/// `strftime` pattern of backup file stems.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%y%m%d_%H%M";

/// Extension appended to encrypted backups.
pub const ENCRYPTED_EXTENSION: &str = "aes";

/// Suffix of the sibling holding the live file during a restore.
const RESTORE_TEMP_SUFFIX: &str = ".temp";

/// Kind of restore source, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackupKind {
    Plain,
    Encrypted,
}

impl BackupKind {
    fn of(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(STYLE_FILE_EXTENSION) => Some(Self::Plain),
            Some(ENCRYPTED_EXTENSION) => Some(Self::Encrypted),
            _ => None,
        }
    }
}

/// Creates, prunes and restores backups of the default style file.
#[derive(Debug)]
pub struct BackupService {
    paths: Arc<StylePaths>,
    retention: usize,
    encryption: RwLock<EncryptionSettings>,
}

impl BackupService {
    /// Creates a backup service keeping at most `retention` backups.
    #[must_use]
    pub const fn new(paths: Arc<StylePaths>, retention: usize, encryption: EncryptionSettings) -> Self {
        Self {
            paths,
            retention,
            encryption: RwLock::new(encryption),
        }
    }

    /// Replaces the encryption settings used by later backups and restores.
    pub fn set_encryption(&self, settings: EncryptionSettings) {
        *self.encryption.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// Returns a copy of the current encryption settings.
    #[must_use]
    pub fn encryption(&self) -> EncryptionSettings {
        self.encryption
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Backs up the default style file, stamped with the current local time.
    ///
    /// # Errors
    ///
    /// See [`BackupService::backup_at`].
    pub fn backup(&self) -> Result<Option<PathBuf>> {
        self.backup_at(Local::now())
    }

    /// Backs up the default style file, stamped with `now`.
    ///
    /// Returns `None` if there is no default style file yet. A backup taken
    /// in the same minute as an earlier one replaces it.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy, the encryption, or the retention prune fails.
    #[instrument(skip(self), fields(stamp = %now.format(BACKUP_TIMESTAMP_FORMAT)))]
    pub fn backup_at(&self, now: DateTime<Local>) -> Result<Option<PathBuf>> {
        let source = self.paths.default_style_file();
        if !source.exists() {
            tracing::debug!(path = %source.display(), "No default style file; skipping backup");
            return Ok(None);
        }

        let backup_dir = self.paths.backup_dir();
        std::fs::create_dir_all(backup_dir)
            .map_err(|e| Error::failed("create_backup_dir", format!("{}: {e}", backup_dir.display())))?;

        let stem = now.format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let plain = backup_dir.join(format!("{stem}.{STYLE_FILE_EXTENSION}"));
        std::fs::copy(source, &plain)
            .map_err(|e| Error::failed("copy_backup", format!("{}: {e}", plain.display())))?;

        let settings = self.encryption();
        let written = match settings.passphrase().filter(|_| settings.enabled) {
            Some(passphrase) => self.encrypt_copy(&plain, Encryptor::new(passphrase))?,
            None => plain,
        };

        metrics::counter!("stylestore_backups_total").increment(1);
        tracing::info!(path = %written.display(), "Backed up default style file");

        self.prune()?;
        Ok(Some(written))
    }

    /// Replaces the plaintext copy at `plain` with its encrypted form.
    ///
    /// Without encryption support the plaintext copy is kept.
    fn encrypt_copy(&self, plain: &Path, encryptor: Result<Encryptor>) -> Result<PathBuf> {
        let encryptor = match encryptor {
            Ok(encryptor) => encryptor,
            Err(Error::FeatureNotEnabled(feature)) => {
                tracing::warn!(feature = %feature, "Encryption unavailable; keeping plaintext backup");
                return Ok(plain.to_path_buf());
            },
            Err(e) => return Err(e),
        };

        let bytes = std::fs::read(plain).map_err(|e| Error::failed("read_backup", e))?;
        let encrypted_path = temp_sibling(plain, &format!(".{ENCRYPTED_EXTENSION}"));
        write_atomic(&encrypted_path, &encryptor.encrypt(&bytes)?)?;

        if let Err(e) = std::fs::remove_file(plain) {
            tracing::warn!(path = %plain.display(), error = %e, "Failed to remove plaintext backup copy");
        }
        tracing::debug!(dir = %self.paths.backup_dir().display(), "Encrypted backup");
        Ok(encrypted_path)
    }

    /// Lists backup files, newest first by modification time.
    ///
    /// Backups with equal modification times are ordered by name, newest stamp first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup directory exists but cannot be read.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let dir = self.paths.backup_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(dir).map_err(|e| Error::failed("list_backups", e))?;
        let mut backups: Vec<(SystemTime, PathBuf)> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && BackupKind::of(path).is_some())
            .map(|path| {
                let modified = std::fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, path)
            })
            .collect();

        backups.sort_by(|a, b| b.cmp(a));
        Ok(backups.into_iter().map(|(_, path)| path).collect())
    }

    /// Deletes all but the most recent backups. Returns how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup directory cannot be read or a file cannot be deleted.
    pub fn prune(&self) -> Result<usize> {
        let stale: Vec<PathBuf> = self.list()?.into_iter().skip(self.retention).collect();
        for path in &stale {
            std::fs::remove_file(path)
                .map_err(|e| Error::failed("prune_backup", format!("{}: {e}", path.display())))?;
            tracing::debug!(path = %path.display(), "Pruned backup");
        }

        if !stale.is_empty() {
            metrics::counter!("stylestore_backups_pruned_total").increment(stale.len() as u64);
        }
        Ok(stale.len())
    }

    /// Replaces the default style file with the contents of `source`.
    ///
    /// `source` must be a `.csv` backup or an encrypted `.aes` backup; it is
    /// copied, never consumed. The live file is moved to a temporary sibling
    /// first and put back if anything fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Restore`] if the source is rejected or the swap fails.
    #[instrument(skip(self), fields(source = %source.display()))]
    pub fn restore(&self, source: &Path) -> Result<()> {
        let result = self.swap_in(source);
        let status = if result.is_ok() { "success" } else { "failure" };
        metrics::counter!("stylestore_restores_total", "status" => status).increment(1);
        result.map_err(Error::from)
    }

    fn swap_in(&self, source: &Path) -> std::result::Result<(), RestoreError> {
        let kind = BackupKind::of(source).ok_or(RestoreError::UnsupportedExtension)?;
        let passphrase = match kind {
            BackupKind::Plain => None,
            BackupKind::Encrypted => Some(
                self.encryption()
                    .passphrase()
                    .cloned()
                    .ok_or(RestoreError::MissingPassphrase)?,
            ),
        };

        let live = self.paths.default_style_file();
        let parked = temp_sibling(live, RESTORE_TEMP_SUFFIX);
        let had_original = live.exists();
        if had_original {
            std::fs::rename(live, &parked).map_err(|e| RestoreError::Io(e.to_string()))?;
        }

        let written = match passphrase {
            None => std::fs::copy(source, live)
                .map(|_| ())
                .map_err(|e| RestoreError::Io(e.to_string())),
            Some(passphrase) => std::fs::read(source)
                .map_err(|e| RestoreError::Io(e.to_string()))
                .and_then(|bytes| {
                    Encryptor::new(&passphrase)
                        .and_then(|encryptor| encryptor.decrypt(&bytes))
                        .map_err(|e| {
                            tracing::warn!(error = %e, "Backup decryption failed");
                            RestoreError::DecryptionFailed
                        })
                })
                .and_then(|plaintext| {
                    write_atomic(live, &plaintext).map_err(|e| RestoreError::Io(e.to_string()))
                }),
        };

        match written {
            Ok(()) => {
                if had_original && let Err(e) = std::fs::remove_file(&parked) {
                    tracing::warn!(path = %parked.display(), error = %e, "Failed to remove restore temp file");
                }
                tracing::info!(path = %live.display(), "Restored default style file");
                Ok(())
            },
            Err(err) => {
                let _ = std::fs::remove_file(live);
                if had_original && let Err(e) = std::fs::rename(&parked, live) {
                    tracing::error!(
                        parked = %parked.display(),
                        error = %e,
                        "Failed to put original style file back after restore failure"
                    );
                }
                Err(err)
            },
        }
    }
}
