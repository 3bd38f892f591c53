//! Error types for the text2data tools.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Each variant carries a message the host agent can act on; driver failures are
//! re-described rather than swallowed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("SQL statement contains risks: {statement}")]
    RiskySql { statement: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Schema error: {message} (object: {object})")]
    Schema { message: String, object: String },

    #[error("Unserializable type {type_name}")]
    Unserializable { type_name: String },

    #[error("Format error: {message}")]
    Format { message: String },

    #[error("Prompt error: {message}")]
    Prompt { message: String },

    #[error("LLM error: {message}")]
    Llm { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ToolError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a risky SQL error naming the offending statement.
    pub fn risky_sql(statement: impl Into<String>) -> Self {
        Self::RiskySql {
            statement: statement.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            object: object.into(),
        }
    }

    pub fn unserializable(type_name: impl Into<String>) -> Self {
        Self::Unserializable {
            type_name: type_name.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn prompt(message: impl Into<String>) -> Self {
        Self::Prompt {
            message: message.into(),
        }
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::RiskySql { .. } => Some(
                "Only read statements are accepted; DROP, DELETE, TRUNCATE, ALTER, UPDATE and INSERT are blocked",
            ),
            _ => None,
        }
    }
}

/// Convert sqlx errors to ToolError.
impl From<sqlx::Error> for ToolError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => ToolError::connection(
                msg.to_string(),
                "Check the connection parameters and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                ToolError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => ToolError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::Io(io_err) => ToolError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => ToolError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => ToolError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => ToolError::schema(
                format!("Type not found: {}", type_name),
                type_name.to_string(),
            ),
            sqlx::Error::ColumnNotFound(col) => {
                ToolError::schema(format!("Column not found: {}", col), col.to_string())
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => ToolError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                ToolError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                ToolError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => ToolError::internal("Database worker crashed"),
            _ => ToolError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Convert SQL Server driver errors to ToolError.
impl From<tiberius::error::Error> for ToolError {
    fn from(err: tiberius::error::Error) -> Self {
        use tiberius::error::Error as TdsError;
        match err {
            TdsError::Server(token) => ToolError::database(
                token.message().to_string(),
                Some(token.code().to_string()),
                "Check the SQL syntax and referenced objects",
            ),
            err @ (TdsError::Io { .. } | TdsError::Tls(_) | TdsError::Routing { .. }) => {
                ToolError::connection(
                    err.to_string(),
                    "Check network connectivity and database server status",
                )
            }
            TdsError::Protocol(msg) => ToolError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            other => ToolError::internal(format!("SQL Server driver error: {}", other)),
        }
    }
}

/// Convert Oracle driver errors to ToolError.
///
/// The message keeps the `ORA-nnnnn` prefix reported by the server.
impl From<oracle::Error> for ToolError {
    fn from(err: oracle::Error) -> Self {
        ToolError::database(
            err.to_string(),
            None,
            "Check the SQL syntax and referenced objects",
        )
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        ToolError::connection(
            format!("I/O error: {}", err),
            "Check network connectivity and database server status",
        )
    }
}

/// Result type alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert ToolError to MCP ErrorData for semantic error categorization.
/// Includes the suggestion field in the `data` object when available.
impl From<ToolError> for rmcp::ErrorData {
    fn from(err: ToolError) -> Self {
        match &err {
            // Caller mistakes -> invalid_params
            ToolError::InvalidInput { .. }
            | ToolError::RiskySql { .. }
            | ToolError::Schema { .. }
            | ToolError::Unserializable { .. }
            | ToolError::Format { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), suggestion_data(err.suggestion()))
            }

            // Database errors -> invalid_params with sql_state in message
            ToolError::Database {
                message,
                sql_state,
                suggestion,
            } => {
                let msg = match sql_state {
                    Some(code) => format!("Database error: {} (SQLSTATE: {})", message, code),
                    None => format!("Database error: {}", message),
                };
                rmcp::ErrorData::invalid_params(msg, suggestion_data(Some(suggestion)))
            }

            // Connection -> internal_error (with implicit retryable flag)
            ToolError::Connection { suggestion, .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), suggestion_data(Some(suggestion)))
            }

            ToolError::Prompt { .. } | ToolError::Llm { .. } | ToolError::Internal { .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), suggestion_data(err.suggestion()))
            }
        }
    }
}
