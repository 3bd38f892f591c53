//! Natural-language to SQL tool.
//!
//! This module implements the `text2data` MCP tool: the schema of the target
//! database is introspected and compressed, rendered into a system prompt,
//! and sent to the LLM together with the user's requirement.

use crate::db::{TableFilter, load_schema};
use crate::dsl::compress;
use crate::error::{ToolError, ToolResult};
use crate::llm::{LlmClient, Message, ModelConfig};
use crate::models::{Dialect, SchemaSnapshot};
use crate::prompt::{DEFAULT_LIMIT, PromptContext, PromptLoader};
use crate::tools::ToolOutput;
use crate::tools::format::ResultFormat;
use crate::tools::message::ToolMessage;
use crate::tools::params::ConnectionParams;
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Returned when the LLM produced no usable text.
pub const GENERATION_FAILED: &str =
    "Generation failed, please check if the input parameters are correct";

static SQL_CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```sql(.*?)```").expect("valid code block pattern"));
static BARE_SQL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?si)^\s*((?:SELECT|INSERT|UPDATE|DELETE|WITH|CREATE|ALTER|DROP).+?)(;|$|\n\s*$)")
        .expect("valid bare SQL pattern")
});
static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\n\r\t]+").expect("valid line break pattern"));

/// Input for the text2data tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct Text2DataInput {
    #[serde(flatten)]
    pub connection: ConnectionParams,
    /// Natural-language description of the data to retrieve
    #[serde(default)]
    pub query: String,
    /// LLM selection and completion parameters
    #[serde(default)]
    pub model: ModelConfig,
    /// Comma-separated table names to include; all tables when omitted
    #[serde(default)]
    pub table_names: Option<String>,
    /// Include table and column comments in the schema description
    #[serde(default)]
    pub with_comment: bool,
    /// Row limit suggested to the LLM. Default: 100
    #[serde(default)]
    pub limit: Option<u32>,
    /// Extra instructions appended to the system prompt
    #[serde(default)]
    pub custom_prompt: Option<String>,
    /// "json" returns {"sql": ...}; anything else returns plain text
    #[serde(default)]
    pub result_format: ResultFormat,
    /// Return only the SQL found in the completion instead of the full reply
    #[serde(default)]
    pub extract_sql: bool,
}

/// Pull the SQL statement out of an LLM reply.
///
/// The first ```` ```sql ```` block wins; otherwise a leading bare statement
/// is taken (keeping its terminating semicolon); otherwise the reply is
/// flattened to one line and returned only if it looks like SQL.
///
/// # Examples
///
/// ```
/// use text2data::tools::text2data::extract_sql;
///
/// let reply = "Here you go:\n```sql\nSELECT id FROM orders LIMIT 10\n```";
/// assert_eq!(extract_sql(reply), "SELECT id FROM orders LIMIT 10");
/// assert_eq!(extract_sql("I cannot help with that."), "");
/// ```
pub fn extract_sql(text: &str) -> String {
    if let Some(block) = SQL_CODE_BLOCK.captures(text).and_then(|c| c.get(1)) {
        return block.as_str().trim().to_string();
    }

    if let Some(captures) = BARE_SQL.captures(text) {
        let statement = captures
            .get(1)
            .map(|m| m.as_str().trim_end_matches(';').trim())
            .unwrap_or_default();
        let terminated = captures.get(2).is_some_and(|m| m.as_str() == ";");
        return if terminated {
            format!("{};", statement)
        } else {
            statement.to_string()
        };
    }

    let flattened = LINE_BREAKS.replace_all(text, " ");
    let flattened = flattened.trim();
    let upper = flattened.to_uppercase();
    if ["SELECT", "FROM", "WHERE"].iter().any(|kw| upper.contains(kw)) {
        flattened.to_string()
    } else {
        String::new()
    }
}

/// Render the reply in the requested output shape.
pub fn completion_messages(reply: &str, format: ResultFormat) -> Vec<ToolMessage> {
    if reply.trim().is_empty() {
        return vec![ToolMessage::text(GENERATION_FAILED)];
    }
    match format {
        ResultFormat::Json => vec![ToolMessage::json(json!({ "sql": reply }))],
        _ => vec![ToolMessage::text(reply)],
    }
}

pub struct Text2DataHandler {
    connect_timeout: Duration,
    prompts: Arc<PromptLoader>,
    llm: Arc<dyn LlmClient>,
}

impl Text2DataHandler {
    pub fn new(
        connect_timeout: Duration,
        prompts: Arc<PromptLoader>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            connect_timeout,
            prompts,
            llm,
        }
    }

    /// Handle the text2data tool call.
    pub async fn generate(&self, input: Text2DataInput) -> ToolResult<ToolOutput> {
        if input.query.trim().is_empty() {
            return Err(ToolError::invalid_input("Query cannot be empty"));
        }
        let spec = input.connection.to_spec()?;
        let filter = input.table_names.as_deref().and_then(TableFilter::parse);
        info!(
            target_db = %spec.redacted_url(),
            tables = ?filter.as_ref().map(TableFilter::names),
            "Generating SQL"
        );

        let snapshot = load_schema(&spec, filter.as_ref(), self.connect_timeout).await?;
        self.generate_from_snapshot(spec.dialect(), &snapshot, &input)
            .await
    }

    /// Build the prompt from an already loaded schema and ask the LLM.
    pub async fn generate_from_snapshot(
        &self,
        dialect: Dialect,
        snapshot: &SchemaSnapshot,
        input: &Text2DataInput,
    ) -> ToolResult<ToolOutput> {
        let start = Instant::now();
        if snapshot.is_empty() {
            warn!(dialect = %dialect.as_str(), "No tables found for the prompt");
        }

        let meta_data = compress(snapshot, true, input.with_comment);
        let context = PromptContext::new(dialect, meta_data)
            .with_limit(input.limit.unwrap_or(DEFAULT_LIMIT))
            .with_custom_prompt(input.custom_prompt.clone().unwrap_or_default());
        let system_prompt = self.prompts.render(dialect, &context)?;
        debug!(prompt = %system_prompt, "System prompt");

        let messages = [
            Message::system(system_prompt),
            Message::user(format!(
                "Database type: {}\nUser requirement: {}",
                dialect.as_str(),
                input.query
            )),
        ];
        let reply = self.llm.complete(&input.model, &messages).await?;

        let reply = if input.extract_sql {
            extract_sql(&reply)
        } else {
            reply
        };
        info!(
            tables = snapshot.len(),
            reply_len = reply.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "SQL generated"
        );
        Ok(ToolOutput {
            messages: completion_messages(&reply, input.result_format),
        })
    }
}
