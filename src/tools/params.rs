//! Connection parameters shared by both tools.

use crate::error::{ToolError, ToolResult};
use crate::models::{ConnectionSpec, Dialect};
use schemars::JsonSchema;
use serde::Deserialize;

const EMPTY_PARAMS: &str = "Database connection parameters cannot be empty";

/// Port given either as a number or as a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PortInput {
    Number(u64),
    Text(String),
}

impl PortInput {
    fn parse(&self) -> ToolResult<u16> {
        let port = match self {
            Self::Number(n) => u16::try_from(*n).ok(),
            Self::Text(s) => s.trim().parse::<u16>().ok(),
        };
        port.filter(|p| *p != 0)
            .ok_or_else(|| ToolError::invalid_input(format!("Invalid port: {}", self)))
    }
}

impl std::fmt::Display for PortInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "'{}'", s),
        }
    }
}

/// Connection fields accepted by every tool call.
#[derive(Clone, Default, Deserialize, JsonSchema)]
pub struct ConnectionParams {
    /// Database type: mysql, oracle, sqlserver or hologres
    #[serde(default)]
    pub db_type: String,
    /// Database host name or IP address
    #[serde(default)]
    pub host: String,
    /// Database port, as a number or numeric string
    #[serde(default)]
    pub port: Option<PortInput>,
    /// Database (or service) name
    #[serde(default)]
    pub db_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl ConnectionParams {
    /// Validate the fields and build a [`ConnectionSpec`]. No I/O happens here.
    pub fn to_spec(&self) -> ToolResult<ConnectionSpec> {
        let Some(port) = &self.port else {
            return Err(ToolError::invalid_input(EMPTY_PARAMS));
        };
        if self.db_type.trim().is_empty() {
            return Err(ToolError::invalid_input(EMPTY_PARAMS));
        }
        let dialect: Dialect = self.db_type.parse()?;
        ConnectionSpec::new(
            dialect,
            &self.host,
            port.parse()?,
            &self.db_name,
            &self.username,
            &self.password,
        )
    }
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_name", &self.db_name)
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}
