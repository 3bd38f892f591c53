//! Database access layer.
//!
//! This module provides database access functionality:
//! - Per-call sessions (sqlx for MySQL and Hologres, tiberius for SQL Server,
//!   ODPI-C for Oracle)
//! - Catalog queries and schema introspection
//! - Statement execution
//! - Type mappings

pub mod catalog;
pub mod executor;
pub mod introspect;
pub mod session;
pub mod types;

pub use catalog::SchemaCatalog;
pub use executor::execute;
pub use introspect::{TableFilter, introspect, load_schema};
pub use session::{DEFAULT_CONNECT_TIMEOUT_SECS, DbSession, OracleSession};
