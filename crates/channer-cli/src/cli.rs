use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "channer-sync")]
#[command(about = "Sync Channer favorites, history and settings with the cloud")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local store file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the sync config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show sync status for this device
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the document stored under a key
    Get {
        /// Domain key (e.g. favorites, threadHistory)
        key: String,
    },
    /// Store a JSON document under a key
    Put {
        /// Domain key (e.g. favorites, threadHistory)
        key: String,
        /// JSON value; read from stdin when omitted
        value: Option<String>,
    },
    /// Run a sync pass
    Sync {
        /// How conflicts are settled
        #[arg(long, value_enum, default_value_t = Strategy::Ask)]
        strategy: Strategy,
        /// Only sync these keys (all keys when omitted)
        keys: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List keys whose local and cloud copies conflict
    Conflicts,
    /// Copy local-only data into the cloud
    Migrate,
    /// Sync periodically and on change notifications read from stdin
    Watch {
        /// Seconds between passes (defaults to the config value)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
        /// How conflicts are settled
        #[arg(long, value_enum, default_value_t = Strategy::Merge)]
        strategy: Strategy,
    },
    /// Turn cloud sync on for this device
    Enable,
    /// Turn cloud sync off for this device
    Disable,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Strategy {
    /// Merge both sides
    Merge,
    /// Keep this device's copy
    Local,
    /// Take the cloud copy
    Remote,
    /// Prompt for each conflict
    Ask,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
