use std::path::Path;

use crate::commands::common::{load_config, open_coordinator, read_piped_stdin, validate_key};
use crate::error::CliError;

pub async fn run_get(key: &str, db_path: &Path, config_path: &Path) -> Result<(), CliError> {
    let key = validate_key(key)?;
    let config = load_config(config_path)?;
    let coordinator = open_coordinator(db_path, &config).await?;

    let value = coordinator
        .load::<serde_json::Value>(key)
        .await
        .ok_or_else(|| CliError::KeyNotFound(key.to_string()))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub async fn run_put(
    key: &str,
    value: Option<&str>,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let key = validate_key(key)?;
    let raw = match value {
        Some(value) if !value.trim().is_empty() => value.trim().to_string(),
        Some(_) => return Err(CliError::EmptyValue),
        None => read_piped_stdin()?.ok_or(CliError::EmptyValue)?,
    };
    let value = parse_value(&raw)?;

    let config = load_config(config_path)?;
    let coordinator = open_coordinator(db_path, &config).await?;
    if !coordinator.save(key, &value).await {
        return Err(CliError::SaveFailed(key.to_string()));
    }

    println!("Saved {key}");
    Ok(())
}

pub fn parse_value(raw: &str) -> Result<serde_json::Value, CliError> {
    Ok(serde_json::from_str(raw)?)
}
