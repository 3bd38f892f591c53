//! SQL execution tool.
//!
//! This module implements the `execute_sql` MCP tool. The submitted text is
//! screened by the risk guard, executed on a fresh connection, and the result
//! is rendered in the requested format.

use crate::db::{self, DbSession};
use crate::error::{ToolError, ToolResult};
use crate::tools::ToolOutput;
use crate::tools::format::{ResultFormat, format_result};
use crate::tools::guard::find_risky_statement;
use crate::tools::params::ConnectionParams;
use schemars::JsonSchema;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Input for the execute_sql tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteSqlInput {
    #[serde(flatten)]
    pub connection: ConnectionParams,
    /// SQL text to execute. Statements starting with DROP, DELETE, TRUNCATE, ALTER, UPDATE or INSERT are rejected.
    #[serde(default)]
    pub sql: String,
    /// Output format: "json" (default), "csv", "html"; anything else returns raw text
    #[serde(default)]
    pub result_format: ResultFormat,
}

pub struct ExecuteSqlHandler {
    connect_timeout: Duration,
}

impl ExecuteSqlHandler {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Validate the input without touching the database.
    ///
    /// Checks run in order: empty SQL, risk guard, connection parameters.
    pub fn validate(input: &ExecuteSqlInput) -> ToolResult<crate::models::ConnectionSpec> {
        if input.sql.trim().is_empty() {
            return Err(ToolError::invalid_input("SQL statement cannot be empty"));
        }
        if let Some(statement) = find_risky_statement(&input.sql) {
            warn!(statement = %statement, "Rejected risky SQL");
            return Err(ToolError::risky_sql(statement));
        }
        input.connection.to_spec()
    }

    /// Handle the execute_sql tool call.
    pub async fn execute(&self, input: ExecuteSqlInput) -> ToolResult<ToolOutput> {
        let spec = Self::validate(&input)?;
        let start = Instant::now();
        info!(
            target_db = %spec.redacted_url(),
            format = ?input.result_format,
            "Executing SQL"
        );

        let mut session = DbSession::open(&spec, self.connect_timeout).await?;
        let result = db::execute(&mut session, &input.sql).await;
        session.close().await;
        let result = result?;

        let messages = format_result(&result, input.result_format)?;
        info!(
            rows = result.row_count(),
            messages = messages.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "SQL executed"
        );
        Ok(ToolOutput { messages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(sql: &str) -> ExecuteSqlInput {
        serde_json::from_value(json!({
            "db_type": "mysql",
            "host": "localhost",
            "port": "3306",
            "db_name": "shop",
            "username": "reader",
            "password": "secret",
            "sql": sql,
        }))
        .unwrap()
    }

    #[test]
    fn test_input_flattens_connection_fields() {
        let input = input("SELECT 1");
        assert_eq!(input.connection.db_name, "shop");
        assert_eq!(input.result_format, ResultFormat::Json);
    }

    #[test]
    fn test_empty_sql_rejected_first() {
        let mut input = input("   ");
        input.connection.host.clear();
        let err = ExecuteSqlHandler::validate(&input).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: SQL statement cannot be empty");
    }

    #[test]
    fn test_risky_sql_rejected_before_connection_checks() {
        let mut input = input("SELECT 1; DROP TABLE users");
        input.connection.password.clear();
        let err = ExecuteSqlHandler::validate(&input).unwrap_err();
        assert!(matches!(err, ToolError::RiskySql { ref statement } if statement == "DROP TABLE users"));
    }

    #[test]
    fn test_valid_input_builds_spec() {
        let spec = ExecuteSqlHandler::validate(&input("SELECT * FROM orders")).unwrap();
        assert_eq!(spec.port(), 3306);
    }

    #[tokio::test]
    async fn test_driverless_dialect_fails_before_io() {
        let mut input = input("SELECT 1 FROM dual");
        input.connection.db_type = "oracle".into();
        let handler = ExecuteSqlHandler::new(Duration::from_secs(1));
        let err = handler.execute(input).await.unwrap_err();
        assert!(matches!(err, ToolError::Connection { .. }));
    }
}
