//! Journal Sync CLI
//!
//! Thin wrapper around journalsync-core functions for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # Show device and journal information
//! journalsync info
//!
//! # Write a journal entry
//! journalsync entry add "Walked by the river" --mood 0.8
//!
//! # List entries
//! journalsync entry list
//!
//! # Push, pull, or both
//! journalsync push
//! journalsync pull
//! journalsync sync
//!
//! # Pair a second device that shares the same --remote
//! journalsync --data-dir ~/.other keys show           # on the new device
//! journalsync keys share <public_key>                 # on the existing device
//! journalsync --data-dir ~/.other keys enroll <sealed> # on the new device
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use journalsync_core::{EntrySnapshot, JournalEngine, RedbBlobAdapter, StoredEntry};

/// Journal Sync - Encrypted Journal Sync
#[derive(Parser)]
#[command(name = "journalsync")]
#[command(version = "0.1.0")]
#[command(about = "Journal Sync - Encrypted Journal Sync")]
#[command(
    long_about = "An offline-first journal whose entries sync between devices as end-to-end encrypted blobs."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.journalsync/data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Remote blob database shared between devices (default: <data-dir>/remote.redb)
    #[arg(short, long, global = true)]
    remote: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show device and journal information
    Info,

    /// Journal entry management
    Entry {
        #[command(subcommand)]
        action: EntryAction,
    },

    /// Upload pending local changes
    Push,

    /// Download and merge remote changes
    Pull,

    /// Push, then pull
    Sync,

    /// Key management and device pairing
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
}

#[derive(Subcommand)]
enum EntryAction {
    /// Write a new entry
    Add {
        /// Entry text
        text: String,
        /// Mood score
        #[arg(short, long)]
        mood: Option<f64>,
        /// Mark as favorite
        #[arg(short, long)]
        favorite: bool,
    },
    /// List entries, newest first
    List,
    /// Show one entry
    Show {
        /// Entry ID (ULID string)
        entry_id: String,
    },
    /// Replace the text of an entry
    Edit {
        /// Entry ID (ULID string)
        entry_id: String,
        /// New text
        text: String,
    },
    /// Delete an entry
    Delete {
        /// Entry ID (ULID string)
        entry_id: String,
    },
}

#[derive(Subcommand)]
enum KeysAction {
    /// Show this device's public key and fingerprint
    Show,
    /// Seal the journal key for another device
    Share {
        /// The other device's public key (base64)
        public_key: String,
    },
    /// Adopt a journal key shared by another device
    Enroll {
        /// Sealed key produced by `keys share`
        sealed: String,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Get the default data directory (~/.journalsync/data)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".journalsync")
        .join("data")
}

/// Format Unix milliseconds as RFC 3339
fn format_millis(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

fn print_entry(entry: &StoredEntry) {
    let star = if entry.entry.favorite == Some(true) { " *" } else { "" };
    println!("  {}{}", entry.entity_id, star);
    if let Some(created) = entry.entry.created_at {
        println!("    Created: {}", format_millis(created));
    }
    if let Some(mood) = entry.entry.mood_score {
        println!("    Mood: {}", mood);
    }
    println!("    {}", entry.entry.text.as_deref().unwrap_or(""));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let remote_path = cli.remote.unwrap_or_else(|| data_dir.join("remote.redb"));
    tracing::debug!(?data_dir, ?remote_path, "Opening journal");
    let remote = RedbBlobAdapter::open(&remote_path)
        .with_context(|| format!("Failed to open remote at {}", remote_path.display()))?;
    let engine = JournalEngine::new(&data_dir, Arc::new(remote))?;

    match cli.command {
        Commands::Info => {
            let device = engine.device_key().await?;

            println!("Journal Sync v0.1.0");
            println!();
            println!("Device:");
            println!("  Fingerprint: {}", device.fingerprint());
            println!(
                "  Content key: {}",
                if engine.has_content_key().await? {
                    "present"
                } else {
                    "not created yet"
                }
            );
            println!();
            println!("Data directory: {}", engine.data_dir().display());
            println!("Remote: {}", remote_path.display());
            println!("Entries: {}", engine.list_entries()?.len());
            println!("Pending changes: {}", engine.pending_count()?);
        }

        Commands::Entry { action } => match action {
            EntryAction::Add {
                text,
                mood,
                favorite,
            } => {
                let entry = EntrySnapshot {
                    text: Some(text),
                    mood_score: mood,
                    favorite: favorite.then_some(true),
                    ..Default::default()
                };
                let id = engine.add_entry(entry)?;
                println!("Added entry");
                println!("  ID: {}", id);
            }

            EntryAction::List => {
                let entries = engine.list_entries()?;
                if entries.is_empty() {
                    println!("No entries.");
                } else {
                    println!("Entries ({}):", entries.len());
                    println!();
                    for entry in &entries {
                        print_entry(entry);
                    }
                }
            }

            EntryAction::Show { entry_id } => match engine.storage().get_entry(&entry_id)? {
                Some(entry) if !entry.deleted => print_entry(&entry),
                _ => anyhow::bail!("Entry not found: {}", entry_id),
            },

            EntryAction::Edit { entry_id, text } => {
                let existing = engine
                    .storage()
                    .get_entry(&entry_id)?
                    .filter(|e| !e.deleted)
                    .ok_or_else(|| anyhow::anyhow!("Entry not found: {}", entry_id))?;
                let entry = EntrySnapshot {
                    text: Some(text),
                    ..existing.entry
                };
                engine.update_entry(&entry_id, entry, None)?;
                println!("Updated entry: {}", entry_id);
            }

            EntryAction::Delete { entry_id } => {
                engine
                    .delete_entry(&entry_id)
                    .with_context(|| format!("Entry not found: {}", entry_id))?;
                println!("Deleted entry: {}", entry_id);
            }
        },

        Commands::Push => {
            let report = engine.push().await?;
            println!("Pushed {} change(s)", report.pushed);
        }

        Commands::Pull => {
            let report = engine.pull().await?;
            println!(
                "Pulled {} blob(s), applied {}, conflicts {}",
                report.pulled,
                report.merge.applied,
                report.merge.conflicts.len()
            );
        }

        Commands::Sync => {
            let report = engine.sync().await?;
            println!("Pushed {} change(s)", report.push.pushed);
            println!(
                "Pulled {} blob(s), applied {}, conflicts {}",
                report.pull.pulled,
                report.pull.merge.applied,
                report.pull.merge.conflicts.len()
            );
        }

        Commands::Keys { action } => match action {
            KeysAction::Show => {
                let device = engine.device_key().await?;
                println!("Device key:");
                println!("  Public key: {}", device.public_key_base64());
                println!("  Fingerprint: {}", device.fingerprint());
            }

            KeysAction::Share { public_key } => {
                let sealed = engine.share_content_key(&public_key).await?;
                println!("{}", sealed);
            }

            KeysAction::Enroll { sealed } => {
                engine
                    .enroll_shared_key(&sealed)
                    .await
                    .context("Failed to enroll shared key")?;
                println!("Enrolled shared journal key.");
            }
        },
    }

    Ok(())
}
