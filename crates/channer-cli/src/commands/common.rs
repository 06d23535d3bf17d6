use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use channer_core::models::{ConflictData, ConflictOrdering, SyncConflict};
use channer_core::store::{CloudAdapter, HttpCloudStore, LibSqlStore};
use channer_core::sync::keys::SYNCED_KEYS;
use channer_core::sync::{KeySyncOutcome, SyncReport};
use channer_core::{SyncConfig, SyncCoordinator};

use crate::error::CliError;

pub type Coordinator = SyncCoordinator<HttpCloudStore, LibSqlStore>;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("CHANNER_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("channer")
        .join("sync.db")
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> PathBuf {
    cli_config_path
        .or_else(|| env::var_os("CHANNER_CONFIG").map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("channer")
        .join("sync.json")
}

/// File config with environment overrides applied
pub fn load_config(config_path: &Path) -> Result<SyncConfig, CliError> {
    Ok(SyncConfig::load_from_path(config_path)?.with_env_overrides()?)
}

pub async fn open_coordinator(db_path: &Path, config: &SyncConfig) -> Result<Coordinator, CliError> {
    let remote = match &config.cloud_url {
        Some(url) => HttpCloudStore::new(
            url.clone(),
            config.auth_token.clone(),
            Some(config.max_value_bytes),
        )?,
        None => {
            tracing::info!("No cloud URL configured; running local-only");
            HttpCloudStore::unconfigured()?
        }
    };
    let local = LibSqlStore::open(db_path).await?;
    let adapter = CloudAdapter::new(remote, local);
    Ok(SyncCoordinator::initialize(adapter, config).await?)
}

/// Accept only the stable domain keys
pub fn validate_key(key: &str) -> Result<&str, CliError> {
    let key = key.trim();
    if SYNCED_KEYS.contains(&key) {
        Ok(key)
    } else {
        Err(CliError::UnknownKey(key.to_string(), SYNCED_KEYS.join(", ")))
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}

pub const fn outcome_label(outcome: KeySyncOutcome) -> &'static str {
    match outcome {
        KeySyncOutcome::Absent => "absent",
        KeySyncOutcome::InSync => "in sync",
        KeySyncOutcome::PulledRemote => "pulled from cloud",
        KeySyncOutcome::PushedLocal => "pushed to cloud",
        KeySyncOutcome::Resolved(_) => "conflict resolved",
        KeySyncOutcome::Unresolved => "conflict skipped",
        KeySyncOutcome::Superseded => "changed during resolution, retry",
        KeySyncOutcome::Skipped => "cloud unavailable",
    }
}

pub fn format_report_lines(report: &SyncReport) -> Vec<String> {
    if report.remote_unavailable {
        return vec!["Cloud unavailable; nothing synced.".to_string()];
    }

    let mut lines = report
        .outcomes
        .iter()
        .filter(|(_, outcome)| *outcome != KeySyncOutcome::Absent)
        .map(|(key, outcome)| format!("{key:<24} {}", outcome_label(*outcome)))
        .collect::<Vec<_>>();
    lines.extend(
        report
            .failures
            .iter()
            .map(|(key, error)| format!("{key:<24} failed: {error}")),
    );
    if report.cancelled {
        lines.push("Sync cancelled.".to_string());
    }
    if lines.is_empty() {
        lines.push("Nothing to sync.".to_string());
    }
    lines
}

pub fn format_conflict_summary(conflict: &SyncConflict) -> String {
    let (local, remote) = match &conflict.data {
        ConflictData::Favorites { local, remote } | ConflictData::History { local, remote } => {
            (local.len(), remote.len())
        }
        ConflictData::Categories { local, remote } => (local.len(), remote.len()),
        ConflictData::Themes { local, remote } => (local.len(), remote.len()),
        ConflictData::Settings { local, remote } => (local.len(), remote.len()),
    };
    let ordering = match conflict.ordering {
        ConflictOrdering::LocalNewer => "this device is newer",
        ConflictOrdering::RemoteNewer => "cloud is newer",
        ConflictOrdering::Concurrent => "changed at about the same time",
    };

    format!(
        "Conflict in {} ({}): {local} entries here ({}), {remote} in cloud ({}); {ordering}",
        conflict.key,
        conflict.conflict_type(),
        format_sync_timestamp(conflict.local_timestamp),
        format_sync_timestamp(conflict.remote_timestamp),
    )
}
