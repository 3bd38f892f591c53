//! Text2Data Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for AI assistants
//! to execute SQL against MySQL, Oracle, SQL Server and Hologres databases and
//! to generate SQL from natural language with an LLM.

pub mod config;
pub mod db;
pub mod dsl;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod models;
pub mod prompt;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{ToolError, ToolResult};
pub use mcp::Text2DataService;
