//! Transport layer for the MCP server.
//!
//! The server speaks MCP over standard input/output; stdout carries protocol
//! traffic only.

pub mod stdio;

pub use stdio::StdioTransport;

use crate::error::ToolResult;
use std::future::Future;

/// Trait for MCP transport implementations.
///
/// Transports handle the low-level communication between the MCP server
/// and clients, abstracting away the protocol details.
pub trait Transport: Send + Sync {
    /// Start the transport and begin handling requests.
    ///
    /// This method should block until the transport is shut down.
    fn run(&self) -> impl Future<Output = ToolResult<()>> + Send;

    /// Get the name of this transport for logging.
    fn name(&self) -> &'static str;
}
