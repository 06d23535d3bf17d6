//! Small helpers shared by the config and store layers

/// Longest backend message kept in an error
const MAX_ERROR_TEXT: usize = 180;

/// Trim optional text, treating blank values as missing
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Whether `value` carries an `http://` or `https://` scheme
pub fn is_http_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.starts_with(scheme))
}

/// Shorten a response body for inclusion in an error message
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(MAX_ERROR_TEXT).collect()
}

/// Wall-clock Unix time in milliseconds
pub fn unix_timestamp_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
