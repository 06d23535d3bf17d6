use std::io::{self, BufRead, Write};

use channer_core::models::{ConflictResolution, SyncConflict};
use channer_core::sync::ConflictHandler;

use crate::cli::Strategy;
use crate::commands::common::format_conflict_summary;

/// Settles conflicts according to the chosen `--strategy`
#[derive(Debug, Clone, Copy)]
pub struct StrategyHandler {
    strategy: Strategy,
}

impl StrategyHandler {
    pub const fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }
}

impl ConflictHandler for StrategyHandler {
    async fn choose(&self, conflict: &SyncConflict) -> Option<ConflictResolution> {
        match self.strategy {
            Strategy::Merge => Some(ConflictResolution::Merge),
            Strategy::Local => Some(ConflictResolution::TakeLocal),
            Strategy::Remote => Some(ConflictResolution::TakeRemote),
            Strategy::Ask => {
                let summary = format_conflict_summary(conflict);
                match tokio::task::spawn_blocking(move || ask(&summary)).await {
                    Ok(Ok(choice)) => choice,
                    Ok(Err(error)) => {
                        tracing::warn!("Failed to read conflict choice: {error}");
                        None
                    }
                    Err(error) => {
                        tracing::warn!("Conflict prompt task failed: {error}");
                        None
                    }
                }
            }
        }
    }
}

fn ask(summary: &str) -> io::Result<Option<ConflictResolution>> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{summary}")?;
    write!(stdout, "[m]erge, keep [l]ocal, take [r]emote, [s]kip: ")?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(parse_choice(&line))
}

/// Map a prompt answer to a resolution; anything unrecognized skips
pub fn parse_choice(input: &str) -> Option<ConflictResolution> {
    match input.trim().to_ascii_lowercase().as_str() {
        "m" | "merge" => Some(ConflictResolution::Merge),
        "l" | "local" => Some(ConflictResolution::TakeLocal),
        "r" | "remote" => Some(ConflictResolution::TakeRemote),
        _ => None,
    }
}
