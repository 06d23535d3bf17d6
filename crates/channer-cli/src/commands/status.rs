use std::path::Path;

use channer_core::SyncStatus;
use chrono::Utc;
use serde::Serialize;

use crate::commands::common::{
    format_relative_time, format_sync_timestamp, load_config, open_coordinator,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusItem {
    pub device: String,
    pub enabled: bool,
    pub status: String,
    pub last_synced_at: Option<i64>,
}

pub async fn run_status(as_json: bool, db_path: &Path, config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let coordinator = open_coordinator(db_path, &config).await?;
    let status = coordinator.status().await;

    let item = StatusItem {
        device: coordinator.device_origin().to_string(),
        enabled: coordinator.is_sync_enabled(),
        status: status.to_string(),
        last_synced_at: coordinator.last_synced_at().await,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    for line in format_status_lines(&item, &status, Utc::now().timestamp_millis()) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_status_lines(item: &StatusItem, status: &SyncStatus, now_ms: i64) -> Vec<String> {
    let mut lines = vec![
        format!("Device:  {}", item.device),
        format!("Sync:    {}", if item.enabled { "on" } else { "off" }),
    ];
    match status {
        SyncStatus::Synced { at } => lines.push(format!(
            "Status:  Synced {} ({})",
            format_relative_time(*at, now_ms),
            format_sync_timestamp(*at)
        )),
        other => lines.push(format!("Status:  {other}")),
    }
    lines
}

pub async fn run_set_enabled(
    enabled: bool,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let coordinator = open_coordinator(db_path, &config).await?;
    coordinator.set_sync_enabled(enabled).await?;

    println!("Cloud sync {}", if enabled { "enabled" } else { "disabled" });
    if enabled && config.cloud_url.is_none() {
        println!("No cloud URL configured; set CHANNER_CLOUD_URL to reach the cloud.");
    }
    Ok(())
}
