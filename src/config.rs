//! Configuration handling for the Text2Data server.
//!
//! This module provides configuration management via CLI arguments and environment variables.
//! Database credentials are not configured here; they arrive with each tool call.

use crate::llm::OpenAiConfig;
use crate::llm::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub use crate::db::DEFAULT_CONNECT_TIMEOUT_SECS;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the Text2Data server.
#[derive(Clone, Parser)]
#[command(
    name = "text2data-server",
    about = "MCP server that executes SQL and generates SQL from natural language",
    version,
    author
)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "info", env = "TEXT2DATA_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "TEXT2DATA_JSON_LOGS")]
    pub json_logs: bool,

    /// Database connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "TEXT2DATA_CONNECT_TIMEOUT"
    )]
    pub connect_timeout_secs: u64,

    /// Base URL of an OpenAI-compatible chat-completions API
    #[arg(long, default_value = DEFAULT_BASE_URL, env = "TEXT2DATA_LLM_BASE_URL")]
    pub llm_base_url: String,

    /// API key sent as a Bearer token (optional for local servers)
    #[arg(long, env = "TEXT2DATA_LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Model used when a request does not name one
    #[arg(long, default_value = DEFAULT_MODEL, env = "TEXT2DATA_LLM_MODEL")]
    pub llm_model: String,

    /// LLM request timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_TIMEOUT_SECS,
        env = "TEXT2DATA_LLM_TIMEOUT"
    )]
    pub llm_timeout_secs: u64,

    /// Directory of `<dialect>_prompt.jinja` files overriding the built-in templates
    #[arg(long, value_name = "DIR", env = "TEXT2DATA_PROMPT_DIR")]
    pub prompt_dir: Option<PathBuf>,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            llm_base_url: DEFAULT_BASE_URL.to_string(),
            llm_api_key: None,
            llm_model: DEFAULT_MODEL.to_string(),
            llm_timeout_secs: DEFAULT_TIMEOUT_SECS,
            prompt_dir: None,
        }
    }

    /// Validate values clap cannot check on its own.
    pub fn validate(&self) -> Result<(), String> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(format!(
                "Invalid log level '{}'. Expected one of: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err("connect_timeout_secs must be greater than 0".to_string());
        }
        if self.llm_timeout_secs == 0 {
            return Err("llm_timeout_secs must be greater than 0".to_string());
        }

        let url = Url::parse(&self.llm_base_url).map_err(|e| format!("Invalid LLM base URL: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "LLM base URL must use http or https, got '{}'",
                url.scheme()
            ));
        }
        if self.llm_model.trim().is_empty() {
            return Err("llm_model cannot be empty".to_string());
        }

        if let Some(dir) = &self.prompt_dir {
            if !dir.is_dir() {
                return Err(format!(
                    "Prompt directory {} does not exist or is not a directory",
                    dir.display()
                ));
            }
        }
        Ok(())
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// LLM client settings derived from this configuration.
    pub fn llm_config(&self) -> OpenAiConfig {
        let config = OpenAiConfig::new(&self.llm_base_url, &self.llm_model)
            .with_timeout(self.llm_timeout_secs);
        match self.llm_api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => config.with_api_key(key),
            None => config,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("log_level", &self.log_level)
            .field("json_logs", &self.json_logs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_api_key", &self.llm_api_key.as_ref().map(|_| "****"))
            .field("llm_model", &self.llm_model)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("prompt_dir", &self.prompt_dir)
            .finish()
    }
}
