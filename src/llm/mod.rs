//! LLM integration for SQL generation.
//!
//! Provides the [`LlmClient`] trait, an OpenAI-compatible implementation and
//! a scripted mock.

pub mod mock;
pub mod openai;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, OpenAiConfig};

use crate::error::ToolResult;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

impl Role {
    /// Returns the role as a string for API requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Model selection passed by the host with each generation request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct ModelConfig {
    /// Provider name, informational (e.g. "openai")
    #[serde(default)]
    pub provider: Option<String>,
    /// Model name; the server default is used when absent
    #[serde(default)]
    pub model: Option<String>,
    /// Completion mode; only "chat" is supported
    #[serde(default)]
    pub mode: Option<String>,
    /// Extra request fields such as temperature or max_tokens
    #[serde(default)]
    pub completion_params: Map<String, JsonValue>,
}

/// Trait for LLM clients that can generate completions.
///
/// Implementations must be thread-safe (Send + Sync) to support async operations.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generates a single non-streaming completion.
    ///
    /// Returns the assistant text, which is empty when the model produced no
    /// text content.
    async fn complete(&self, model: &ModelConfig, messages: &[Message]) -> ToolResult<String>;
}
