//! MCP tool implementations.
//!
//! This module contains the tool handlers and their building blocks:
//! - `execute_sql`: Execute SQL and format the result
//! - `text2data`: Generate SQL from a natural-language requirement
//! - `guard`: Destructive-statement detection
//! - `format`: JSON/CSV/HTML/text rendering of results
//! - `params`: Connection parameters shared by both tools

pub mod execute_sql;
pub mod format;
pub mod guard;
pub mod message;
pub mod params;
pub mod text2data;

pub use execute_sql::{ExecuteSqlHandler, ExecuteSqlInput};
pub use format::ResultFormat;
pub use message::ToolMessage;
pub use params::{ConnectionParams, PortInput};
pub use text2data::{Text2DataHandler, Text2DataInput};

use schemars::JsonSchema;
use serde::Serialize;

/// Output shared by every tool: the ordered messages for the host.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ToolOutput {
    pub messages: Vec<ToolMessage>,
}
