//! OpenAI-compatible chat-completions adapter.
//!
//! Implements the `CompletionBackend` port against any endpoint speaking the
//! `POST {base}/chat/completions` protocol, mapping HTTP outcomes into the
//! closed `CompletionError` taxonomy the dispatcher branches on.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use vakil_core::completion::port::CompletionBackend;
use vakil_core::completion::types::{CompletionError, CompletionRequest};

#[derive(Clone, Debug)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, vakil_core::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| vakil_core::Error::External(format!("http client build: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: trim_trailing_slash(base_url.into()),
            http,
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn complete(
        &self,
        model: &str,
        req: &CompletionRequest,
    ) -> Result<String, CompletionError> {
        let body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": req.system_prompt },
                { "role": "user", "content": req.user_text },
            ],
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
        });

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            // Connection errors and timeouts are expected to resolve on retry.
            .map_err(|e| CompletionError::Transient(format!("request error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(%status, %model, "completion backend returned non-success");
            return Err(classify_status(status.as_u16(), &body));
        }

        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CompletionError::Unknown(format!("response json: {e}")))?;

        let text = v
            .pointer("/choices/0/message/content")
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(CompletionError::Unknown("empty completion text".to_string()));
        }

        Ok(text)
    }
}

/// Map a non-2xx response into the closed taxonomy.
///
/// 404 and the OpenAI `model_not_found` code both mean the candidate itself
/// is bad; other 4xx mean the request is bad for this model; 5xx and 429 are
/// worth retrying.
fn classify_status(status: u16, body: &str) -> CompletionError {
    match status {
        429 => CompletionError::RateLimited,
        404 => CompletionError::InvalidModel,
        400..=499 => {
            if body.contains("model_not_found") || body.contains("does not exist") {
                CompletionError::InvalidModel
            } else {
                CompletionError::BadRequest(snippet(body))
            }
        }
        500..=599 => CompletionError::Transient(format!("http {status}: {}", snippet(body))),
        other => CompletionError::Unknown(format!("http {other}: {}", snippet(body))),
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}

fn trim_trailing_slash(mut s: String) -> String {
    while s.ends_with('/') {
        s.pop();
    }
    s
}
