//! MCP service implementation using rmcp.
//!
//! This module defines the Text2DataService struct with the `execute_sql`
//! and `text2data` tools exposed via the MCP protocol using the rmcp
//! framework's macros.

use crate::llm::LlmClient;
use crate::prompt::PromptLoader;
use crate::tools::{
    ExecuteSqlHandler, ExecuteSqlInput, Text2DataHandler, Text2DataInput, ToolOutput,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, info_span, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct Text2DataService {
    execute_sql: Arc<ExecuteSqlHandler>,
    text2data: Arc<Text2DataHandler>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl Text2DataService {
    /// Create a new service.
    ///
    /// # Arguments
    ///
    /// * `connect_timeout` - Upper bound for opening each database connection
    /// * `prompts` - System prompt templates
    /// * `llm` - Client used by `text2data`
    pub fn new(
        connect_timeout: Duration,
        prompts: Arc<PromptLoader>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            execute_sql: Arc::new(ExecuteSqlHandler::new(connect_timeout)),
            text2data: Arc::new(Text2DataHandler::new(connect_timeout, prompts, llm)),
            tool_router: Self::tool_router(),
        }
    }
}

fn into_mcp_error(tool: &str, err: crate::error::ToolError) -> McpError {
    warn!(tool = %tool, error = %err, "Tool call failed");
    McpError::from(err)
}

#[tool_router]
impl Text2DataService {
    #[tool(
        description = "Execute SQL against a MySQL, Oracle, SQL Server or Hologres database and return the result.\nConnection parameters (db_type, host, port, db_name, username, password) are given per call.\nStatements starting with DROP, DELETE, TRUNCATE, ALTER, UPDATE or INSERT are rejected.\nresult_format: json (default), csv (result.csv attachment), html (result.html attachment), anything else returns raw text."
    )]
    async fn execute_sql(
        &self,
        Parameters(input): Parameters<ExecuteSqlInput>,
    ) -> Result<Json<ToolOutput>, McpError> {
        let span = info_span!("tool_call", tool = "execute_sql", request_id = %Uuid::new_v4());
        self.execute_sql
            .execute(input)
            .instrument(span)
            .await
            .map(Json)
            .map_err(|e| into_mcp_error("execute_sql", e))
    }

    #[tool(
        description = "Generate SQL from a natural-language requirement.\nThe database schema is introspected (optionally restricted by table_names), compressed, and given to the LLM with the requirement.\nSet with_comment to include table and column comments, limit to suggest a row limit (default 100), custom_prompt for extra instructions.\nresult_format json returns {\"sql\": ...}; anything else returns plain text. Set extract_sql to strip everything but the SQL."
    )]
    async fn text2data(
        &self,
        Parameters(input): Parameters<Text2DataInput>,
    ) -> Result<Json<ToolOutput>, McpError> {
        let span = info_span!("tool_call", tool = "text2data", request_id = %Uuid::new_v4());
        self.text2data
            .generate(input)
            .instrument(span)
            .await
            .map(Json)
            .map_err(|e| into_mcp_error("text2data", e))
    }
}

#[tool_handler]
impl ServerHandler for Text2DataService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "text2data-server".to_owned(),
                title: Some("Text2Data Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Tools for querying relational databases and generating SQL.\n\
                \n\
                ## Workflow\n\
                1. Call `text2data` with the connection parameters and a natural-language `query`\n\
                2. Review the generated SQL\n\
                3. Call `execute_sql` with the same connection parameters and the SQL\n\
                \n\
                ## Supported Databases\n\
                - `mysql`, `hologres`, `sqlserver`\n\
                - `oracle`: requires Oracle client libraries on the server host\n\
                \n\
                ## Safety\n\
                `execute_sql` rejects any statement starting with DROP, DELETE, TRUNCATE, ALTER, UPDATE or INSERT.\n\
                The check is keyword based and does not replace database permissions."
                    .to_string(),
            ),
        }
    }
}
