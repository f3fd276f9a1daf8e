//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Chronicle - turn chat logs into story chapters
#[derive(Parser, Debug)]
#[command(name = "chronicle")]
#[command(about = "Turn long chat logs into persisted story chapters", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to the layered chronicle.toml lookup)
    #[arg(long, global = true, env = "CHRONICLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding session data
    #[arg(long, global = true, env = "CHRONICLE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a JSON array of messages as a session's log
    Import {
        /// Session identifier
        #[arg(long)]
        session: String,

        /// JSON file with the messages
        file: PathBuf,

        /// Append to the existing log instead of replacing it
        #[arg(long)]
        append: bool,
    },

    /// Archive a session's messages into chapters
    ///
    /// Continues an unfinished run, or archives the messages added since the
    /// last run. Press Ctrl-C to pause after the current chunk.
    Archive {
        /// Session identifier
        #[arg(long)]
        session: String,

        /// Re-chunk the whole log from chapter 1
        #[arg(long)]
        full: bool,

        /// Chapter numbers to leave out of this run
        #[arg(long, value_delimiter = ',')]
        skip: Vec<u32>,
    },

    /// Print a session's chapters
    Chapters {
        /// Session identifier
        #[arg(long)]
        session: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Regenerate one chapter in place
    Retry {
        /// Session identifier
        #[arg(long)]
        session: String,

        /// Chapter number to regenerate
        #[arg(long)]
        chapter: u32,
    },

    /// Show run state and whether new messages are due for archiving
    Status {
        /// Session identifier
        #[arg(long)]
        session: String,
    },

    /// Discard the current run, keeping all chapters
    Reset {
        /// Session identifier
        #[arg(long)]
        session: String,
    },
}
