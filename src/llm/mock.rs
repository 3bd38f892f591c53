//! Mock LLM client for testing.
//!
//! Replies from a script and records every request it receives.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{ToolError, ToolResult};
use crate::llm::{LlmClient, Message, ModelConfig};

/// Scripted LLM client.
///
/// Queued replies are returned in order; once the queue is empty the
/// fallback reply is used.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    fallback: String,
    script: Mutex<VecDeque<ToolResult<String>>>,
    requests: Mutex<Vec<(ModelConfig, Vec<Message>)>>,
}

impl MockLlmClient {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
            ..Default::default()
        }
    }

    /// Queue a successful reply.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push(Ok(reply.into()));
        self
    }

    /// Queue a failure.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Err(ToolError::llm(message)));
        self
    }

    fn push(&self, reply: ToolResult<String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(reply);
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<(ModelConfig, Vec<Message>)> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, model: &ModelConfig, messages: &[Message]) -> ToolResult<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((model.clone(), messages.to_vec()));
        }
        let next = self.script.lock().ok().and_then(|mut script| script.pop_front());
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}
