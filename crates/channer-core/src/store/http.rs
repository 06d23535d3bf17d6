//! HTTP cloud key-value store client

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;

use super::{check_value_size, KeyValueStore, StoreError, StoreResult};
use crate::error::{Error, Result};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Remote store reached over HTTP.
///
/// Values live at `{endpoint}/v1/kv/{key}`: `PUT` writes the raw bytes and
/// `GET` returns them, with 404 meaning the key was never written.
#[derive(Clone)]
pub struct HttpCloudStore {
    endpoint: Option<String>,
    token: Option<String>,
    client: reqwest::Client,
    max_value_bytes: Option<usize>,
}

impl std::fmt::Debug for HttpCloudStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpCloudStore")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("max_value_bytes", &self.max_value_bytes)
            .finish()
    }
}

impl HttpCloudStore {
    /// Create a client for the store at `endpoint`
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
        max_value_bytes: Option<usize>,
    ) -> Result<Self> {
        let endpoint = normalize_endpoint(endpoint.into())?;
        Ok(Self {
            endpoint: Some(endpoint),
            token: normalize_text_option(token),
            client: build_client()?,
            max_value_bytes,
        })
    }

    /// A store with no endpoint; always reports unavailable
    pub fn unconfigured() -> Result<Self> {
        Ok(Self {
            endpoint: None,
            token: None,
            client: build_client()?,
            max_value_bytes: None,
        })
    }

    fn key_url(&self, key: &str) -> StoreResult<String> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("cloud endpoint not configured".to_string()))?;
        Ok(format!("{endpoint}/v1/kv/{}", urlencoding::encode(key)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl KeyValueStore for HttpCloudStore {
    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        check_value_size(key, value.len(), self.max_value_bytes)?;
        let url = self.key_url(key)?;

        let response = self
            .authorize(self.client.put(&url))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(value.to_vec())
            .send()
            .await
            .map_err(|error| request_error(&error))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body, key, value.len(), self.max_value_bytes))
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let url = self.key_url(key)?;

        let response = self
            .authorize(self.client.get(&url))
            .header(ACCEPT, "application/octet-stream")
            .send()
            .await
            .map_err(|error| request_error(&error))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body, key, 0, self.max_value_bytes));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| request_error(&error))?;
        Ok(Some(bytes.to_vec()))
    }

    fn is_available(&self) -> bool {
        self.endpoint.is_some()
    }

    fn max_value_bytes(&self) -> Option<usize> {
        self.max_value_bytes
    }
}

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))
}

fn request_error(error: &reqwest::Error) -> StoreError {
    if error.is_connect() || error.is_timeout() {
        StoreError::Unavailable(error.to_string())
    } else {
        StoreError::Backend(error.to_string())
    }
}

fn status_error(
    status: StatusCode,
    body: &str,
    key: &str,
    size: usize,
    limit: Option<usize>,
) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::SERVICE_UNAVAILABLE => {
            StoreError::Unavailable(parse_api_error(status, body))
        }
        StatusCode::PAYLOAD_TOO_LARGE => StoreError::PayloadTooLarge {
            key: key.to_string(),
            size,
            limit: limit.unwrap_or(size),
        },
        _ => StoreError::Backend(parse_api_error(status, body)),
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> Result<String> {
    let endpoint = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config("cloud endpoint must not be empty".to_string()))?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(
            "cloud endpoint must include http:// or https://".to_string(),
        ))
    }
}
