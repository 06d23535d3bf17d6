use std::path::Path;

use channer_core::sync::keys::SYNCED_KEYS;
use channer_core::sync::{MigrationStatus, SyncReport};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cli::Strategy;
use crate::commands::common::{
    format_conflict_summary, format_report_lines, load_config, open_coordinator, outcome_label,
    validate_key, Coordinator,
};
use crate::commands::prompt::StrategyHandler;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct SyncReportItem {
    pub outcomes: Vec<KeyOutcomeItem>,
    pub failures: Vec<KeyOutcomeItem>,
    pub changed_keys: Vec<String>,
    pub cancelled: bool,
    pub remote_unavailable: bool,
}

#[derive(Debug, Serialize)]
pub struct KeyOutcomeItem {
    pub key: String,
    pub outcome: String,
}

impl From<&SyncReport> for SyncReportItem {
    fn from(report: &SyncReport) -> Self {
        Self {
            outcomes: report
                .outcomes
                .iter()
                .map(|(key, outcome)| KeyOutcomeItem {
                    key: key.clone(),
                    outcome: outcome_label(*outcome).to_string(),
                })
                .collect(),
            failures: report
                .failures
                .iter()
                .map(|(key, error)| KeyOutcomeItem {
                    key: key.clone(),
                    outcome: error.clone(),
                })
                .collect(),
            changed_keys: report.changed_keys(),
            cancelled: report.cancelled,
            remote_unavailable: report.remote_unavailable,
        }
    }
}

async fn open_online(db_path: &Path, config_path: &Path) -> Result<Coordinator, CliError> {
    let config = load_config(config_path)?;
    let coordinator = open_coordinator(db_path, &config).await?;
    if !coordinator.adapter().is_remote_available() {
        return Err(CliError::CloudUnavailable);
    }
    Ok(coordinator)
}

/// Cancel `token` on Ctrl-C so passes stop between keys
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted; stopping after the current key");
            child.cancel();
        }
    });
    token
}

pub async fn run_sync(
    strategy: Strategy,
    keys: &[String],
    as_json: bool,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let keys = keys
        .iter()
        .map(|key| validate_key(key).map(ToString::to_string))
        .collect::<Result<Vec<_>, _>>()?;
    let coordinator = open_online(db_path, config_path).await?;
    let handler = StrategyHandler::new(strategy);
    let cancel = cancel_on_ctrl_c();

    let report = if keys.is_empty() {
        coordinator.sync_all(&handler, &cancel).await?
    } else {
        coordinator.sync_keys(keys.as_slice(), &handler, &cancel).await?
    };

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&SyncReportItem::from(&report))?
        );
        return Ok(());
    }

    for line in format_report_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_conflicts(db_path: &Path, config_path: &Path) -> Result<(), CliError> {
    let coordinator = open_online(db_path, config_path).await?;

    let mut found = 0_usize;
    for key in SYNCED_KEYS {
        match coordinator.detect_conflict(key).await {
            Ok(Some(conflict)) => {
                found += 1;
                println!("{}", format_conflict_summary(&conflict));
            }
            Ok(None) => {}
            Err(error) => tracing::warn!("Failed to check '{key}': {error}"),
        }
    }

    if found == 0 {
        println!("No sync conflicts.");
    }
    Ok(())
}

pub async fn run_migrate(db_path: &Path, config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let coordinator = open_coordinator(db_path, &config).await?;
    let report = coordinator
        .migrate_local_data_to_cloud(&cancel_on_ctrl_c())
        .await?;

    match report.status {
        MigrationStatus::AlreadyMigrated => println!("Local data was already migrated."),
        MigrationStatus::RemoteUnavailable => return Err(CliError::CloudUnavailable),
        MigrationStatus::Cancelled => println!("Migration cancelled; run again to resume."),
        MigrationStatus::Completed => {
            println!(
                "Migrated {} keys ({} already in cloud, {} failed)",
                report.migrated.len(),
                report.existing.len(),
                report.failed.len()
            );
            for key in &report.failed {
                println!("  failed: {key}");
            }
        }
    }
    Ok(())
}
