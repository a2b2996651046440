use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tv-catalog")]
#[command(about = "Track subscribed TV series and file downloaded episodes into a library")]
pub struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Log every file operation
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only report what would be done
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a default settings file
    Init,

    /// Subscribe to a series found by title
    AddSeries {
        title: String,

        /// Take the most recent match without asking
        #[arg(long)]
        first: bool,
    },

    /// Unsubscribe from a series
    RemoveSeries { id: String },

    /// List subscribed series
    List,

    /// Show the status of every episode
    Status {
        #[arg(long)]
        series: Option<String>,

        /// Treat failed torrent/magnet lookups as missing instead of aborting
        #[arg(long)]
        tolerant: bool,
    },

    /// Move downloaded episodes into the library
    Catalog {
        /// A single file to catalog instead of the whole download folder
        file: Option<PathBuf>,

        #[arg(long, conflicts_with = "file")]
        series: Option<String>,
    },

    /// Start downloads for aired episodes that are available
    DownloadMissing {
        #[arg(long)]
        series: Option<String>,

        #[arg(long)]
        tolerant: bool,
    },

    /// Re-fetch episode lists of continuing series
    Refresh,

    /// Change a setting, e.g. `set dry_run true`
    Set { key: String, value: String },
}
