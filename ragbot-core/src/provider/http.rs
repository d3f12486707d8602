//! JSON-over-HTTP transport shared by the provider clients.
//!
//! Each call is bounded by the configured timeout. Transient failures
//! (connection errors, 5xx) are retried up to `max_retries` times; client
//! errors, timeouts and undecodable bodies fail immediately.

use super::types::{ProviderError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Bodies longer than this are cut before landing in an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    provider: &'static str,
    client: reqwest::Client,
    api_key: Option<String>,
    timeout: Duration,
    max_retries: u32,
}

impl HttpTransport {
    pub(crate) fn new(
        provider: &'static str,
        api_key: Option<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            provider,
            client: reqwest::Client::new(),
            api_key,
            timeout,
            max_retries,
        }
    }

    /// POSTs `body` as JSON and decodes the answer into `R`.
    pub(crate) async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let mut attempt = 0;
        loop {
            match self.post_once(url, body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(provider = self.provider, url, attempt, error = %e, "Retrying provider call");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        debug!(provider = self.provider, url, "Sending provider request");

        let mut request = self.client.post(url).timeout(self.timeout).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: self.provider.to_string(),
                status: status.as_u16(),
                message: truncate(&text),
            });
        }

        serde_json::from_str(&text).map_err(|e| ProviderError::schema(self.provider, e.to_string()))
    }

    fn classify(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout {
                provider: self.provider.to_string(),
                timeout: self.timeout,
            }
        } else {
            ProviderError::Transport {
                provider: self.provider.to_string(),
                message: error.to_string(),
            }
        }
    }
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

/// Joins a base URL and an endpoint path without doubling slashes.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
