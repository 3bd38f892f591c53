//! Data models for the text2data tools.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionSpec, Dialect, application_name};
pub use query::{ResultSet, Row, Value};
pub use schema::{ColumnInfo, SchemaSnapshot, SchemaSnapshotBuilder, TableInfo};
