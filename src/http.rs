//! Shared request plumbing for the HTTP embedding and LLM providers.
//!
//! A call either yields the response JSON or a classified
//! [`ServiceError`]:
//! - HTTP 429 or 5xx → transient
//! - other non-success statuses → permanent
//! - network errors and timeouts → transient
//! - requests that cannot be built (bad URL, bad header) → permanent
//! - an unparseable success body → permanent

use std::time::Duration;

use anyhow::Result;
use repodoc_core::error::ServiceError;

pub fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Read the API key from the environment variable `var`.
pub fn api_key(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| anyhow::anyhow!("{} environment variable not set", var))
}

/// Send `request` and decode a JSON success body. `service` names the
/// endpoint in error messages.
pub async fn send_json(
    request: reqwest::RequestBuilder,
    service: &str,
) -> std::result::Result<serde_json::Value, ServiceError> {
    let response = request
        .header("Content-Type", "application/json")
        .send()
        .await
        .map_err(|e| send_error(service, e))?;

    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| ServiceError::permanent(format!("{} returned invalid JSON: {}", service, e)));
    }

    let body_text = response.text().await.unwrap_or_default();
    let message = format!("{} API error {}: {}", service, status, body_text.trim());
    if status.as_u16() == 429 || status.is_server_error() {
        Err(ServiceError::transient(message))
    } else {
        Err(ServiceError::permanent(message))
    }
}

fn send_error(service: &str, e: reqwest::Error) -> ServiceError {
    if e.is_builder() {
        ServiceError::permanent(format!("{} request is invalid: {}", service, e))
    } else {
        ServiceError::transient(format!("{} connection error: {}", service, e))
    }
}

/// Decode a JSON array of numbers into a vector.
pub fn json_to_vec(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()
        .map(|arr| arr.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
}
