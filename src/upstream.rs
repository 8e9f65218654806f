//! Upstream chat-completion client
//!
//! One POST per attempt, guarded by a 45 s transfer timeout on the client
//! and a 40 s hard attempt timeout in front of it. The cancellation token
//! replaces the original polling watchdog: an abort tears down the
//! in-flight request immediately instead of at the next poll tick.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::api::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::config::AppConfig;

/// Whole-transfer timeout on the HTTP client.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(45);
/// Hard per-attempt timeout; fires even while the transfer timer still runs.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(40);

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(StatusCode),

    #[error("request timed out")]
    Timeout,

    #[error("request aborted")]
    Aborted,

    #[error("response body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// HTTP client for the OpenAI-compatible upstream.
pub struct UpstreamClient {
    http: reqwest::Client,
}

impl UpstreamClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(TRANSFER_TIMEOUT)
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self { http })
    }

    /// Execute one chat-completion attempt against the configured upstream.
    ///
    /// Returns as soon as the token is cancelled or the attempt timeout
    /// fires; the in-flight request is dropped either way.
    pub async fn chat_completion(
        &self,
        config: &AppConfig,
        api_key: &str,
        messages: Vec<ChatMessage>,
        cancel: &CancellationToken,
    ) -> Result<ChatCompletionResponse, UpstreamError> {
        let url = format!(
            "{}/chat/completions",
            config.api_base.trim_end_matches('/')
        );
        let payload = ChatCompletionRequest {
            model: config.model.clone(),
            temperature: config.temperature,
            messages,
        };

        let exchange = async {
            let response = self
                .http
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .bearer_auth(api_key)
                .json(&payload)
                .send()
                .await?;

            let status = response.status();
            let body = response.bytes().await?.to_vec();
            Ok::<(StatusCode, Vec<u8>), UpstreamError>((status, body))
        };

        let (status, body) = tokio::select! {
            _ = cancel.cancelled() => return Err(UpstreamError::Aborted),
            _ = tokio::time::sleep(ATTEMPT_TIMEOUT) => return Err(UpstreamError::Timeout),
            result = exchange => result?,
        };

        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        Ok(serde_json::from_slice(&body)?)
    }
}
