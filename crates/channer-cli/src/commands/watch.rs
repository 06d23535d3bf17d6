use std::path::Path;
use std::time::Duration;

use channer_core::sync::{
    ChangeReason, RemoteChange, RemoteChangeDebouncer, SyncEvent, SyncReport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::cli::Strategy;
use crate::commands::common::{format_report_lines, load_config, open_coordinator};
use crate::commands::prompt::StrategyHandler;
use crate::commands::sync::cancel_on_ctrl_c;
use crate::error::CliError;

/// Parse one notification line read from stdin.
///
/// `account`, `quota` and `initial <keys..>` select a reason; anything else
/// is a list of keys changed on the server.
pub fn parse_change_line(line: &str) -> Option<RemoteChange> {
    let mut words = line.split_whitespace();
    let first = words.next()?;
    let (reason, keys) = match first {
        "account" => (ChangeReason::AccountChange, Vec::new()),
        "quota" => (ChangeReason::QuotaViolation, Vec::new()),
        "initial" => (
            ChangeReason::InitialSync,
            words.map(ToString::to_string).collect(),
        ),
        key => (
            ChangeReason::ServerChange,
            std::iter::once(key)
                .chain(words)
                .map(ToString::to_string)
                .collect(),
        ),
    };
    Some(RemoteChange { reason, keys })
}

pub async fn run_watch(
    interval_secs: Option<u64>,
    strategy: Strategy,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    // Prompts and change notifications would both read stdin
    if strategy == Strategy::Ask {
        return Err(CliError::Config(
            "watch reads change notifications from stdin; use --strategy merge, local or remote"
                .to_string(),
        ));
    }
    let config = load_config(config_path)?;
    let period = interval_secs.map_or_else(|| config.auto_sync_interval(), Duration::from_secs);
    if period.is_zero() {
        return Err(CliError::Config("watch interval must be positive".to_string()));
    }

    let coordinator = open_coordinator(db_path, &config).await?;
    let handler = StrategyHandler::new(strategy);
    let cancel = cancel_on_ctrl_c();
    let (debouncer, mut batches) = RemoteChangeDebouncer::spawn(config.debounce_window());
    let mut events = coordinator.subscribe();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    tracing::info!("Watching for changes every {}s", period.as_secs());

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match coordinator.sync_all(&handler, &cancel).await {
                    Ok(report) => print_report(&report),
                    Err(error) => tracing::warn!("Periodic sync failed: {error}"),
                }
            }
            Some(keys) = batches.recv() => {
                match coordinator.sync_keys(keys.as_slice(), &handler, &cancel).await {
                    Ok(report) => print_report(&report),
                    Err(error) => tracing::warn!("Sync after remote change failed: {error}"),
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Some(change) = parse_change_line(&line) {
                        for key in coordinator.handle_remote_change(&change) {
                            debouncer.notify(key);
                        }
                    }
                }
                Ok(None) => stdin_open = false,
                Err(error) => {
                    tracing::warn!("Failed to read change notification: {error}");
                    stdin_open = false;
                }
            },
            event = events.recv() => log_event(event),
        }
    }

    println!("Stopped watching.");
    Ok(())
}

fn print_report(report: &SyncReport) {
    if report.outcomes.iter().all(|(_, outcome)| !outcome.changed_local())
        && report.failures.is_empty()
        && !report.remote_unavailable
    {
        return;
    }
    for line in format_report_lines(report) {
        println!("{line}");
    }
}

fn log_event(event: Result<SyncEvent, broadcast::error::RecvError>) {
    match event {
        Ok(SyncEvent::ConflictDetected { key, conflict_type }) => {
            tracing::info!("Conflict detected on '{key}' ({conflict_type})");
        }
        Ok(SyncEvent::SyncFailed { reason }) => tracing::warn!("Sync failed: {reason}"),
        Ok(SyncEvent::CloudUnavailableWarning) => {
            tracing::warn!("Cloud unavailable; changes are kept on this device");
        }
        Ok(SyncEvent::StatusChanged(status)) => tracing::debug!("Status: {status}"),
        Ok(event) => tracing::debug!("{event:?}"),
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            tracing::debug!("Skipped {skipped} sync events");
        }
        Err(broadcast::error::RecvError::Closed) => {}
    }
}
