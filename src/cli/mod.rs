//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Outbox - offline-first record sync
#[derive(Parser, Debug)]
#[command(name = "outbox", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.outbox/data/outbox.db)
    #[arg(long, global = true, env = "OUTBOX_DB")]
    pub db: Option<PathBuf>,

    /// Remote document store URL (overrides settings)
    #[arg(long, global = true)]
    pub remote: Option<String>,

    /// Use an in-process remote instead of a network store
    #[arg(long, global = true, conflicts_with = "remote")]
    pub memory_remote: bool,

    /// Treat the network as unreachable
    #[arg(long, global = true)]
    pub offline: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// How a command should reach the remote.
#[derive(Debug, Clone, Default)]
pub struct RemoteOptions {
    pub remote: Option<String>,
    pub memory_remote: bool,
    pub offline: bool,
}

impl Cli {
    #[must_use]
    pub fn remote_options(&self) -> RemoteOptions {
        RemoteOptions {
            remote: self.remote.clone(),
            memory_remote: self.memory_remote,
            offline: self.offline,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the local store and a default settings file
    Init {
        /// Recreate an existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Submit a record (sent directly when online, queued otherwise)
    Submit {
        /// Record text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Send every queued record to the remote
    Flush,

    /// Show the rendered list (mirror plus queued records)
    List {
        /// Seconds to wait for a remote snapshot when online
        #[arg(long, default_value = "5")]
        wait: u64,
    },

    /// Show queued records
    Outbox,

    /// Show store, remote and cache status
    Status,

    /// Run the sync engine until interrupted, reading records from stdin
    Run,

    /// App-shell asset cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Fetch the manifest into the current cache generation
    Install,

    /// Delete every cache generation except the current one
    Activate,

    /// Resolve a request through the cache
    Fetch {
        /// Request path (e.g. /index.html)
        path: String,

        /// Treat as a navigation request
        #[arg(long, conflicts_with = "image")]
        navigate: bool,

        /// Treat as an image request
        #[arg(long)]
        image: bool,

        /// Write the response body to this file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// List cache generations and cached paths
    List,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
