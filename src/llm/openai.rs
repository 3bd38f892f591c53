//! OpenAI-compatible chat-completions client.
//!
//! Works against api.openai.com or any server exposing the same
//! `/chat/completions` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ToolError, ToolResult};
use crate::llm::{LlmClient, Message, ModelConfig};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Maximum number of retry attempts for transient errors.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Request fields owned by the client; `completion_params` cannot override them.
const RESERVED_FIELDS: [&str; 3] = ["model", "messages", "stream"];

/// OpenAI client configuration.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    /// Optional for local servers that do not authenticate.
    pub api_key: Option<String>,
    /// Used when the request does not name a model.
    pub default_model: String,
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    pub fn new(base_url: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            default_model: default_model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_MODEL)
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "****"))
            .field("default_model", &self.default_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// OpenAI-compatible LLM client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> ToolResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ToolError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Build the request body, merging `completion_params` over the defaults.
    fn build_request(&self, model: &ModelConfig, messages: &[Message]) -> Map<String, JsonValue> {
        let mut body = Map::new();
        body.insert(
            "model".to_string(),
            JsonValue::String(
                model
                    .model
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| self.config.default_model.clone()),
            ),
        );
        body.insert(
            "messages".to_string(),
            serde_json::to_value(
                messages
                    .iter()
                    .map(|m| OpenAiMessage {
                        role: m.role.as_str().to_string(),
                        content: Some(m.content.clone()),
                    })
                    .collect::<Vec<_>>(),
            )
            .unwrap_or(JsonValue::Array(Vec::new())),
        );
        body.insert("stream".to_string(), JsonValue::Bool(false));

        for (key, value) in &model.completion_params {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                warn!(param = %key, "Ignoring reserved completion parameter");
                continue;
            }
            body.insert(key.clone(), value.clone());
        }
        body
    }

    /// Parses an API error response and returns (error, is_retryable).
    fn parse_error(status: reqwest::StatusCode, body: &str) -> (ToolError, bool) {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return (
                ToolError::llm("Authentication failed. Check the LLM API key."),
                false,
            );
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return (ToolError::llm("Rate limited. Please wait and try again."), true);
        }

        // 5xx errors are generally retryable
        let is_retryable = status.is_server_error();

        if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            return (
                ToolError::llm(format!("LLM API error: {}", error_response.error.message)),
                is_retryable,
            );
        }

        (
            ToolError::llm(format!("LLM API error ({}): {}", status, body)),
            is_retryable,
        )
    }

    fn is_retryable_request_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, model: &ModelConfig, messages: &[Message]) -> ToolResult<String> {
        if let Some(mode) = model.mode.as_deref().filter(|m| !m.eq_ignore_ascii_case("chat")) {
            warn!(mode = %mode, "Unsupported completion mode, using chat");
        }

        let request = self.build_request(model, messages);
        let endpoint = self.config.endpoint();

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!(
                attempt,
                max_attempts = MAX_RETRY_ATTEMPTS,
                model = ?request.get("model"),
                "LLM API request"
            );

            let mut builder = self.client.post(&endpoint).json(&request);
            if let Some(api_key) = &self.config.api_key {
                builder = builder.bearer_auth(api_key);
            }

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .map_err(|e| ToolError::llm(format!("Failed to read response: {}", e)))?;

                    if status.is_success() {
                        let response: OpenAiResponse = serde_json::from_str(&body).map_err(|e| {
                            ToolError::llm(format!("Failed to parse response: {}", e))
                        })?;

                        return response
                            .choices
                            .into_iter()
                            .next()
                            .map(|c| c.message.content.unwrap_or_default())
                            .ok_or_else(|| ToolError::llm("No completion returned by the LLM"));
                    }

                    let (error, is_retryable) = Self::parse_error(status, &body);
                    last_error = Some(error);

                    if !is_retryable || attempt >= MAX_RETRY_ATTEMPTS {
                        break;
                    }

                    warn!(attempt, delay = ?delay, status = %status, "LLM API request failed, retrying");
                }
                Err(e) => {
                    let is_retryable = Self::is_retryable_request_error(&e);
                    let error = if e.is_timeout() {
                        ToolError::llm("Request timed out. Try again.")
                    } else if e.is_connect() {
                        ToolError::llm("Failed to connect to the LLM API. Check the base URL.")
                    } else {
                        ToolError::llm(format!("Request failed: {}", e))
                    };
                    last_error = Some(error);

                    if !is_retryable || attempt >= MAX_RETRY_ATTEMPTS {
                        break;
                    }

                    warn!(attempt, delay = ?delay, "LLM API request failed, retrying");
                }
            }

            tokio::time::sleep(delay).await;
            delay *= 2;
        }

        Err(last_error.unwrap_or_else(|| ToolError::llm("No LLM request was attempted")))
    }
}

// OpenAI API types

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> OpenAiClient {
        OpenAiClient::new(OpenAiConfig::default().with_api_key("sk-test")).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = OpenAiConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_endpoint_handles_trailing_slash() {
        let config = OpenAiConfig::new("http://localhost:11434/v1/", "llama3");
        assert_eq!(config.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_debug_masks_api_key() {
        let debug = format!("{:?}", OpenAiConfig::default().with_api_key("sk-secret"));
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn test_build_request_merges_completion_params() {
        let mut model = ModelConfig {
            model: Some("gpt-4o".into()),
            ..Default::default()
        };
        model.completion_params.insert("temperature".into(), json!(0.2));
        model.completion_params.insert("stream".into(), json!(true));

        let body = client().build_request(
            &model,
            &[Message::system("rules"), Message::user("question")],
        );
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0], json!({ "role": "system", "content": "rules" }));
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn test_build_request_falls_back_to_default_model() {
        let body = client().build_request(&ModelConfig::default(), &[]);
        assert_eq!(body["model"], DEFAULT_MODEL);
    }

    #[test]
    fn test_null_content_parses() {
        let response: OpenAiResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
                .unwrap();
        assert_eq!(response.choices[0].message.content, None);
    }

    #[test]
    fn test_parse_error_unauthorized() {
        let (error, is_retryable) =
            OpenAiClient::parse_error(reqwest::StatusCode::UNAUTHORIZED, "");
        assert!(error.to_string().contains("Authentication failed"));
        assert!(!is_retryable);
    }

    #[test]
    fn test_parse_error_rate_limited() {
        let (error, is_retryable) =
            OpenAiClient::parse_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert!(error.to_string().contains("Rate limited"));
        assert!(is_retryable);
    }

    #[test]
    fn test_parse_error_with_message() {
        let body = r#"{"error":{"message":"Invalid API key"}}"#;
        let (error, _) = OpenAiClient::parse_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert!(error.to_string().contains("Invalid API key"));
    }

    #[test]
    fn test_parse_error_server_error_is_retryable() {
        let (_, is_retryable) =
            OpenAiClient::parse_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "");
        assert!(is_retryable);
    }
}
