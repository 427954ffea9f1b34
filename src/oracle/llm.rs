//! Chat-completions oracle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;
use crate::diff::DiffBundle;
use crate::error::{truncate_str, Result, SkipReviewError};
use crate::policy::rubric::build_user_message;
use crate::policy::Oracle;

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Sends one chat-completions request per PR: the rubric as the system
/// message, the diff bundle as the user message, JSON-object response format.
pub struct LlmOracle {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    system_prompt: String,
}

impl LlmOracle {
    pub fn new(config: &Config, system_prompt: String) -> Result<Self> {
        let api_key = config.oracle_api_key()?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SkipReviewError::OracleIo(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: chat_endpoint(&config.api_base),
            model: config.model.clone(),
            api_key,
            system_prompt,
        })
    }

    fn payload(&self, bundle: &DiffBundle) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": build_user_message(bundle) },
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0,
        })
    }
}

#[async_trait]
impl Oracle for LlmOracle {
    fn name(&self) -> &str {
        &self.model
    }

    async fn judge(&self, bundle: &DiffBundle) -> Result<String> {
        debug!(endpoint = %self.endpoint, model = %self.model, "llm: sending request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(bundle))
            .send()
            .await
            .map_err(|e| SkipReviewError::OracleIo(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SkipReviewError::OracleIo(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(SkipReviewError::OracleIo(format!(
                "{} returned {}: {}",
                self.endpoint,
                status,
                truncate_str(&body, 320)
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| SkipReviewError::schema(format!("invalid completion envelope: {e}"), &body))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(extract_text)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| SkipReviewError::schema("completion has no message content", &body))?;

        debug!(chars = content.len(), "llm: received answer");
        Ok(content)
    }
}

/// `{base}/chat/completions`, unless the base already names the route.
fn chat_endpoint(api_base: &str) -> String {
    let base = api_base.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/chat/completions")
    }
}

/// Message content is a string, or an array of `{type: "text", text}` parts.
fn extract_text(content: Value) -> String {
    match content {
        Value::String(s) => s,
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}
