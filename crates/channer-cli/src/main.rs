//! channer-sync: drive Channer's cloud sync from the terminal
//!
//! Reads and writes domain documents, runs sync passes, and settles
//! conflicts between this device and the cloud.

mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::{resolve_config_path, resolve_db_path};
use crate::commands::completions::run_completions;
use crate::commands::data::{run_get, run_put};
use crate::commands::status::{run_set_enabled, run_status};
use crate::commands::sync::{run_conflicts, run_migrate, run_sync};
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "channer=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let config_path = resolve_config_path(cli.config);

    match cli.command {
        Commands::Status { json } => run_status(json, &db_path, &config_path).await?,
        Commands::Get { key } => run_get(&key, &db_path, &config_path).await?,
        Commands::Put { key, value } => {
            run_put(&key, value.as_deref(), &db_path, &config_path).await?;
        }
        Commands::Sync {
            strategy,
            keys,
            json,
        } => run_sync(strategy, &keys, json, &db_path, &config_path).await?,
        Commands::Conflicts => run_conflicts(&db_path, &config_path).await?,
        Commands::Migrate => run_migrate(&db_path, &config_path).await?,
        Commands::Watch { interval, strategy } => {
            run_watch(interval, strategy, &db_path, &config_path).await?;
        }
        Commands::Enable => run_set_enabled(true, &db_path, &config_path).await?,
        Commands::Disable => run_set_enabled(false, &db_path, &config_path).await?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
