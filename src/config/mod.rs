//! Configuration management.
//!
//! Configuration is layered: built-in defaults rooted at a base directory,
//! then an optional TOML file, then `STYLESTORE_*` environment variables.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the base directory.
pub const ENV_BASE_DIR: &str = "STYLESTORE_BASE_DIR";
/// Environment variable overriding the default style file.
pub const ENV_STYLES_FILE: &str = "STYLESTORE_STYLES_FILE";
/// Environment variable overriding the backup interval in seconds.
pub const ENV_BACKUP_INTERVAL: &str = "STYLESTORE_BACKUP_INTERVAL_SECS";
/// Environment variable overriding the number of backups retained.
pub const ENV_BACKUP_RETENTION: &str = "STYLESTORE_BACKUP_RETENTION";
/// Environment variable holding the backup encryption passphrase.
pub const ENV_ENCRYPTION_KEY: &str = "STYLESTORE_ENCRYPTION_KEY";

/// Seconds between checks of the auto-backup scheduler.
pub const DEFAULT_BACKUP_INTERVAL_SECS: u64 = 600;
/// Number of most recent backups kept.
pub const DEFAULT_BACKUP_RETENTION: usize = 24;

/// Main configuration for stylestore.
#[derive(Debug, Clone)]
pub struct StyleStoreConfig {
    /// Base working directory.
    pub base_dir: PathBuf,
    /// Path of the default (master) style file.
    pub default_style_file: PathBuf,
    /// Directory holding one `<prefix>.csv` per partition.
    pub partition_dir: PathBuf,
    /// Directory holding timestamped backups.
    pub backup_dir: PathBuf,
    /// JSON sidecar mapping qualified style names to notes.
    pub notes_file: PathBuf,
    /// How often the auto-backup scheduler checks for pending work.
    pub backup_interval: Duration,
    /// Maximum number of backups retained after each backup.
    pub backup_retention: usize,
    /// Reorder records by their numeric sort ordinals on save.
    pub autosort: bool,
    /// Backup encryption settings.
    pub encryption: EncryptionSettings,
}

/// Backup encryption settings.
///
/// Encryption is only active when it is enabled *and* a non-empty
/// passphrase is set.
#[derive(Debug, Clone, Default)]
pub struct EncryptionSettings {
    /// Whether backups should be encrypted.
    pub enabled: bool,
    /// Passphrase used to derive the backup key.
    pub passphrase: Option<SecretString>,
}

impl EncryptionSettings {
    /// Creates enabled settings with the given passphrase.
    #[must_use]
    pub fn with_passphrase(passphrase: impl Into<String>) -> Self {
        Self {
            enabled: true,
            passphrase: Some(SecretString::from(passphrase.into())),
        }
    }

    /// Returns the passphrase if one is set and non-empty.
    #[must_use]
    pub fn passphrase(&self) -> Option<&SecretString> {
        self.passphrase
            .as_ref()
            .filter(|p| !p.expose_secret().is_empty())
    }

    /// Returns `true` if backups should be written encrypted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && self.passphrase().is_some()
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Base directory.
    pub base_dir: Option<String>,
    /// Default style file.
    pub default_style_file: Option<String>,
    /// Partition directory.
    pub partition_dir: Option<String>,
    /// Backup directory.
    pub backup_dir: Option<String>,
    /// Notes sidecar.
    pub notes_file: Option<String>,
    /// Backup interval in seconds.
    pub backup_interval_secs: Option<u64>,
    /// Backups retained.
    pub backup_retention: Option<usize>,
    /// Sort by ordinal on save.
    pub autosort: Option<bool>,
    /// Encryption section.
    pub encryption: Option<ConfigFileEncryption>,
}

/// Encryption section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileEncryption {
    /// Encrypt backups.
    pub enabled: Option<bool>,
    /// Passphrase.
    pub passphrase: Option<String>,
}

impl Default for StyleStoreConfig {
    fn default() -> Self {
        Self::rooted_at("stylestore")
    }
}

impl StyleStoreConfig {
    /// Creates a configuration with every path under `base_dir`.
    #[must_use]
    pub fn rooted_at(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            default_style_file: base_dir.join("styles.csv"),
            partition_dir: base_dir.join("additional_style_files"),
            backup_dir: base_dir.join("backups"),
            notes_file: base_dir.join("notes.json"),
            base_dir,
            backup_interval: Duration::from_secs(DEFAULT_BACKUP_INTERVAL_SECS),
            backup_retention: DEFAULT_BACKUP_RETENTION,
            autosort: false,
            encryption: EncryptionSettings::default(),
        }
    }

    /// Returns the platform data directory for stylestore.
    ///
    /// Falls back to `./stylestore` if the platform directories cannot be resolved.
    #[must_use]
    pub fn default_base_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "stylestore")
            .map_or_else(|| PathBuf::from("stylestore"), |d| d.data_dir().to_path_buf())
    }

    /// Loads configuration from a file path, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::failed("read_config_file", e))?;

        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| crate::Error::failed("parse_config_file", e))?;

        let mut config = Self::from_config_file(file);
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from the default location.
    ///
    /// Reads `config.toml` from the platform config directory if present,
    /// otherwise uses defaults rooted at [`Self::default_base_dir`].
    /// Environment overrides are applied in both cases.
    #[must_use]
    pub fn load_default() -> Self {
        let config_path = directories::ProjectDirs::from("", "", "stylestore")
            .map(|d| d.config_dir().join("config.toml"));

        if let Some(path) = config_path.filter(|p| p.exists()) {
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Ignoring unreadable config file"
                ),
            }
        }

        let mut config = Self::rooted_at(Self::default_base_dir());
        config.apply_env_overrides();
        config
    }

    /// Converts a `ConfigFile` to `StyleStoreConfig`.
    ///
    /// Relative paths in the file are resolved against the base directory.
    #[must_use]
    pub fn from_config_file(file: ConfigFile) -> Self {
        let base_dir = file
            .base_dir
            .map_or_else(Self::default_base_dir, PathBuf::from);
        let mut config = Self::rooted_at(base_dir);

        if let Some(path) = file.default_style_file {
            config.default_style_file = config.base_dir.join(path);
        }
        if let Some(path) = file.partition_dir {
            config.partition_dir = config.base_dir.join(path);
        }
        if let Some(path) = file.backup_dir {
            config.backup_dir = config.base_dir.join(path);
        }
        if let Some(path) = file.notes_file {
            config.notes_file = config.base_dir.join(path);
        }
        if let Some(secs) = file.backup_interval_secs {
            config.backup_interval = Duration::from_secs(secs);
        }
        if let Some(retention) = file.backup_retention {
            config.backup_retention = retention;
        }
        if let Some(autosort) = file.autosort {
            config.autosort = autosort;
        }
        if let Some(encryption) = file.encryption {
            config.encryption.enabled = encryption.enabled.unwrap_or(false);
            config.encryption.passphrase = encryption.passphrase.map(SecretString::from);
        }

        config
    }

    /// Applies `STYLESTORE_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// A new base directory re-roots every derived path.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base) = lookup(ENV_BASE_DIR).filter(|v| !v.is_empty()) {
            let rerooted = Self::rooted_at(base);
            self.base_dir = rerooted.base_dir;
            self.default_style_file = rerooted.default_style_file;
            self.partition_dir = rerooted.partition_dir;
            self.backup_dir = rerooted.backup_dir;
            self.notes_file = rerooted.notes_file;
        }
        if let Some(file) = lookup(ENV_STYLES_FILE).filter(|v| !v.is_empty()) {
            self.default_style_file = PathBuf::from(file);
        }
        if let Some(secs) = lookup(ENV_BACKUP_INTERVAL).and_then(|v| v.parse::<u64>().ok()) {
            self.backup_interval = Duration::from_secs(secs);
        }
        if let Some(n) = lookup(ENV_BACKUP_RETENTION).and_then(|v| v.parse::<usize>().ok()) {
            self.backup_retention = n;
        }
        if let Some(key) = lookup(ENV_ENCRYPTION_KEY).filter(|v| !v.is_empty()) {
            self.encryption.passphrase = Some(SecretString::from(key));
        }
    }

    /// Sets the default style file.
    #[must_use]
    pub fn with_default_style_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_style_file = path.into();
        self
    }

    /// Sets the auto-backup interval.
    #[must_use]
    pub const fn with_backup_interval(mut self, interval: Duration) -> Self {
        self.backup_interval = interval;
        self
    }

    /// Sets the backup retention count.
    #[must_use]
    pub const fn with_backup_retention(mut self, retention: usize) -> Self {
        self.backup_retention = retention;
        self
    }

    /// Enables or disables sorting by ordinal on save.
    #[must_use]
    pub const fn with_autosort(mut self, autosort: bool) -> Self {
        self.autosort = autosort;
        self
    }

    /// Sets the encryption settings.
    #[must_use]
    pub fn with_encryption(mut self, encryption: EncryptionSettings) -> Self {
        self.encryption = encryption;
        self
    }
}
