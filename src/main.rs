//! Binary entry point for stylestore.
//!
//! A small CLI over [`StyleService`] for inspecting collections, moving
//! styles between partitions, and managing backups.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;
use std::time::SystemTime;
use stylestore::config::StyleStoreConfig;
use stylestore::observability::{self, LoggingConfig};
use stylestore::{Collection, StyleService};

/// Stylestore - storage and partition management for prompt styles.
#[derive(Parser)]
#[command(name = "stylestore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "STYLESTORE_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// List the default collection and every partition.
    List,

    /// Print the styles of a collection.
    Show {
        /// Partition prefix (default collection when omitted).
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Copy prefixed styles from the default collection into partitions.
    Extract,

    /// Rebuild the default collection from partitions.
    Merge,

    /// Back up the default style file.
    Backup {
        /// Encrypt the backup with the configured passphrase.
        #[arg(long)]
        encrypt: bool,
    },

    /// Restore the default style file from a backup.
    Restore {
        /// Backup file (.csv or .aes).
        file: PathBuf,
    },

    /// Delete a style everywhere it is stored.
    Delete {
        /// Qualified style name.
        name: String,
    },

    /// Move a style into another partition.
    Move {
        /// Qualified style name.
        name: String,

        /// Target partition prefix ("" for unprefixed).
        prefix: String,
    },

    /// Back up automatically whenever the default style file changes, until Ctrl-C.
    Watch,
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = observability::init(&LoggingConfig::from_env(cli.verbose)) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let service = StyleService::new(config).context("failed to open style store")?;

    match cli.command {
        Commands::List => cmd_list(&service),
        Commands::Show { prefix } => cmd_show(&service, &prefix),
        Commands::Extract => {
            let written = service.extract()?;
            println!("Extracted {written} styles into partitions");
            Ok(())
        },
        Commands::Merge => {
            let merged = service.merge()?;
            println!("Default collection now holds {} styles", merged.len());
            Ok(())
        },
        Commands::Backup { encrypt } => cmd_backup(&service, encrypt),
        Commands::Restore { file } => {
            service.restore(&file)?;
            println!("Restored {}", file.display());
            Ok(())
        },
        Commands::Delete { name } => {
            if service.delete_style(&name)? {
                println!("Deleted {name}");
            } else {
                println!("No style named {name}");
            }
            Ok(())
        },
        Commands::Move { name, prefix } => {
            let moved = service.move_style(&name, &prefix)?;
            println!("Moved {name} to {moved}");
            Ok(())
        },
        Commands::Watch => cmd_watch(&service),
    }
}

/// Loads configuration from `path`, or the default location.
fn load_config(path: Option<&Path>) -> anyhow::Result<StyleStoreConfig> {
    match path {
        Some(path) => StyleStoreConfig::load_from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(StyleStoreConfig::load_default()),
    }
}

fn display_prefix(prefix: &str) -> &str {
    if prefix.is_empty() { "(default)" } else { prefix }
}

fn cmd_list(service: &StyleService) -> anyhow::Result<()> {
    for prefix in service.partitions(true)? {
        let collection = service.collection(&prefix)?;
        println!("{:<24} {:>5} styles", display_prefix(&prefix), collection.len());
    }
    Ok(())
}

fn cmd_show(service: &StyleService, prefix: &str) -> anyhow::Result<()> {
    let collection: Collection = service.collection(prefix)?;
    println!("{} ({} styles)", display_prefix(prefix), collection.len());
    for record in &collection {
        println!("{:>4}  {}", record.sort, record.name);
        if !record.prompt.is_empty() {
            println!("      + {}", record.prompt);
        }
        if !record.negative_prompt.is_empty() {
            println!("      - {}", record.negative_prompt);
        }
        if !record.notes.is_empty() {
            println!("      # {}", record.notes);
        }
    }
    Ok(())
}

fn cmd_backup(service: &StyleService, encrypt: bool) -> anyhow::Result<()> {
    if encrypt {
        let mut settings = service.config().encryption.clone();
        if settings.passphrase().is_none() {
            bail!("--encrypt needs a passphrase (set STYLESTORE_ENCRYPTION_KEY or [encryption] passphrase)");
        }
        settings.enabled = true;
        service.set_encryption(settings);
    }

    match service.backup_now()? {
        Some(path) => println!("Backed up to {}", path.display()),
        None => println!("No default style file to back up"),
    }
    Ok(())
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn cmd_watch(service: &StyleService) -> anyhow::Result<()> {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("failed to install Ctrl-C handler")?;

    let interval = service.config().backup_interval;
    let styles_file = service.paths().default_style_file().to_path_buf();
    service.start_auto_backup()?;
    println!(
        "Watching {} (checking every {}s, Ctrl-C to stop)",
        styles_file.display(),
        interval.as_secs()
    );

    let mut last_seen = modified(&styles_file);
    while let Err(mpsc::RecvTimeoutError::Timeout) = stop_rx.recv_timeout(interval) {
        let current = modified(&styles_file);
        if current != last_seen {
            tracing::debug!(path = %styles_file.display(), "Default style file changed");
            service.auto_backup().set_pending();
            last_seen = current;
        }
    }

    service.shutdown();
    println!("Stopped");
    Ok(())
}
