//! Shared HTTP plumbing for the embedding and completion providers.
//!
//! # Retry Strategy
//!
//! Retries are off unless `max_retries > 0` in the provider's config. When
//! enabled, transient errors back off exponentially:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use std::time::Duration;
use tracing::warn;

/// Build a client whose every request is bounded by `timeout_secs`.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// A JSON POST endpoint plus the headers it needs.
pub struct JsonRequest<'a> {
    /// Provider name used in error messages (e.g. `"OpenAI"`).
    pub label: &'a str,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: serde_json::Value,
}

/// POST `req.body` and parse the JSON response, retrying per the module docs.
pub async fn post_json(
    client: &reqwest::Client,
    req: &JsonRequest<'_>,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            warn!(
                provider = req.label,
                attempt,
                delay_secs = delay.as_secs(),
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }

        let mut builder = client
            .post(&req.url)
            .header("Content-Type", "application/json")
            .json(&req.body);
        for (name, value) in &req.headers {
            builder = builder.header(*name, value);
        }

        match builder.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        req.label,
                        status,
                        body_text
                    ));
                    continue;
                }

                bail!("{} API error {}: {}", req.label, status, body_text);
            }
            Err(e) => {
                let msg = if e.is_timeout() {
                    format!("{} request timed out: {}", req.label, e)
                } else {
                    format!("{} connection error: {}", req.label, e)
                };
                last_err = Some(anyhow::anyhow!(msg));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", req.label)))
}

/// Reads a required API key from the environment.
pub fn api_key_from_env(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!("{} environment variable not set", var),
    }
}

/// Gemini model names may be given with or without the `models/` prefix.
pub fn gemini_model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_model_prefix_is_normalized() {
        assert_eq!(gemini_model_path("embedding-001"), "models/embedding-001");
        assert_eq!(
            gemini_model_path("models/embedding-001"),
            "models/embedding-001"
        );
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = api_key_from_env("PDFQA_TEST_KEY_THAT_IS_NEVER_SET").unwrap_err();
        assert!(err.to_string().contains("not set"));
    }

    #[tokio::test]
    async fn unreachable_host_reports_connection_error() {
        let client = build_client(2).unwrap();
        let req = JsonRequest {
            label: "Test",
            // Port 9 (discard) on localhost is closed on any sane test host.
            url: "http://127.0.0.1:9/never".to_string(),
            headers: Vec::new(),
            body: serde_json::json!({}),
        };
        let err = post_json(&client, &req, 0).await.unwrap_err();
        assert!(err.to_string().starts_with("Test"));
    }
}
