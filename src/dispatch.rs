//! Delivery of finished payloads to the chat API.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{NotifyError, Result};

/// Response body of the chat API: `{"ok": true}` or `{"ok": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DispatchOutcome {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Something that can deliver a serialized payload.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sends one payload. Transport failures are errors; an API-level
    /// rejection comes back as `ok: false`.
    async fn send(&self, payload: &str) -> Result<DispatchOutcome>;
}

/// Posts payloads to `chat.postMessage` with a bot token.
pub struct SlackApiDispatcher {
    api_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl SlackApiDispatcher {
    pub fn new(api_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            access_token: access_token.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl Dispatcher for SlackApiDispatcher {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, payload: &str) -> Result<DispatchOutcome> {
        debug!(url = %self.api_url, bytes = payload.len(), "Posting message");

        let response = self
            .client
            .post(&self.api_url)
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(payload.to_string())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(status = %status, body = %body, "Chat API request failed");
            return Err(NotifyError::DispatchError(format!(
                "Chat API returned {}: {}",
                status, body
            )));
        }

        let outcome: DispatchOutcome = serde_json::from_str(&body).map_err(|e| {
            NotifyError::DispatchError(format!("Unexpected chat API response '{}': {}", body, e))
        })?;
        debug!(ok = outcome.ok, error = ?outcome.error, "Chat API responded");
        Ok(outcome)
    }
}
