//! Per-call database sessions.
//!
//! Every tool call opens exactly one connection and closes it before
//! returning; there is no pooling between calls.

use crate::error::{ToolError, ToolResult};
use crate::models::{ConnectionSpec, Dialect, application_name};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use std::time::Duration;
use tiberius::{AuthMethod, Client, Config as TdsConfig};
use tokio::net::TcpStream;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

/// Default time allowed for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// TDS client over a tokio socket.
pub type SqlServerClient = Client<Compat<TcpStream>>;

/// An open connection for one tool call.
pub enum DbSession {
    MySql(MySqlConnection),
    /// PostgreSQL-protocol connection (Hologres)
    Postgres(PgConnection),
    SqlServer(SqlServerClient),
    Oracle(OracleSession),
}

impl DbSession {
    /// Open a session for the given connection parameters.
    pub async fn open(spec: &ConnectionSpec, connect_timeout: Duration) -> ToolResult<Self> {
        let dialect = spec.dialect();
        info!(url = %spec.redacted_url(), "Opening database session");

        let connect = async {
            match dialect {
                Dialect::MySql => MySqlConnectOptions::new()
                    .host(spec.host())
                    .port(spec.port())
                    .username(spec.username())
                    .password(spec.password())
                    .database(spec.database())
                    .charset("utf8mb4")
                    .connect()
                    .await
                    .map(Self::MySql)
                    .map_err(|e| e.to_string()),
                Dialect::Hologres => PgConnectOptions::new()
                    .host(spec.host())
                    .port(spec.port())
                    .username(spec.username())
                    .password(spec.password())
                    .database(spec.database())
                    .application_name(&application_name())
                    .connect()
                    .await
                    .map(Self::Postgres)
                    .map_err(|e| e.to_string()),
                Dialect::SqlServer => connect_sql_server(spec).await.map(Self::SqlServer),
                Dialect::Oracle => OracleSession::connect(spec).await.map(Self::Oracle),
            }
        };

        match timeout(connect_timeout, connect).await {
            Ok(Ok(session)) => {
                debug!(dialect = %dialect, "Database session established");
                Ok(session)
            }
            Ok(Err(message)) => Err(ToolError::connection(
                format!("Failed to connect: {}", message),
                connection_suggestion(dialect, &message),
            )),
            Err(_) => Err(ToolError::connection(
                format!(
                    "Timed out after {}s connecting to {}:{}",
                    connect_timeout.as_secs(),
                    spec.host(),
                    spec.port()
                ),
                "Check that the host and port are reachable from this server",
            )),
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Self::MySql(_) => Dialect::MySql,
            Self::Postgres(_) => Dialect::Hologres,
            Self::SqlServer(_) => Dialect::SqlServer,
            Self::Oracle(_) => Dialect::Oracle,
        }
    }

    /// Close the session, logging (not propagating) any failure.
    pub async fn close(self) {
        let result = match self {
            Self::MySql(conn) => conn.close().await.map_err(|e| e.to_string()),
            Self::Postgres(conn) => conn.close().await.map_err(|e| e.to_string()),
            Self::SqlServer(client) => client.close().await.map_err(|e| e.to_string()),
            Self::Oracle(session) => session.close().await,
        };
        match result {
            Ok(()) => debug!("Database session closed"),
            Err(e) => warn!(error = %e, "Failed to close database session cleanly"),
        }
    }
}

impl std::fmt::Debug for DbSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DbSession").field(&self.dialect()).finish()
    }
}

async fn connect_sql_server(spec: &ConnectionSpec) -> Result<SqlServerClient, String> {
    let mut config = TdsConfig::new();
    config.host(spec.host());
    config.port(spec.port());
    config.database(spec.database());
    config.application_name(application_name());
    config.authentication(AuthMethod::sql_server(spec.username(), spec.password()));
    #[cfg(any(feature = "tls-native", feature = "tls-rustls"))]
    config.trust_cert();

    let tcp = TcpStream::connect(config.get_addr())
        .await
        .map_err(|e| e.to_string())?;
    tcp.set_nodelay(true).map_err(|e| e.to_string())?;
    Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| e.to_string())
}

/// Blocking Oracle connection driven from the tokio blocking pool.
///
/// The connection moves into each blocking task and back, so the session is
/// unusable only if a task panics.
pub struct OracleSession {
    conn: Option<oracle::Connection>,
}

impl OracleSession {
    async fn connect(spec: &ConnectionSpec) -> Result<Self, String> {
        let username = spec.username().to_string();
        let password = spec.password().to_string();
        let connect_string = oracle_connect_string(spec);
        let conn = spawn_blocking(move || {
            oracle::Connector::new(username, password, connect_string).connect()
        })
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;
        Ok(Self { conn: Some(conn) })
    }

    /// Run blocking work against the connection.
    pub async fn run<T, F>(&mut self, work: F) -> ToolResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&oracle::Connection) -> ToolResult<T> + Send + 'static,
    {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| ToolError::internal("Oracle session was lost by an earlier failure"))?;
        let (conn, result) = spawn_blocking(move || {
            let result = work(&conn);
            (conn, result)
        })
        .await
        .map_err(|e| ToolError::internal(format!("Oracle worker failed: {}", e)))?;
        self.conn = Some(conn);
        result
    }

    async fn close(mut self) -> Result<(), String> {
        match self.conn.take() {
            Some(conn) => spawn_blocking(move || conn.close())
                .await
                .map_err(|e| e.to_string())?
                .map_err(|e| e.to_string()),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for OracleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleSession")
            .field("open", &self.conn.is_some())
            .finish()
    }
}

/// EZConnect string: `//host:port/service_name`.
pub fn oracle_connect_string(spec: &ConnectionSpec) -> String {
    format!("//{}:{}/{}", spec.host(), spec.port(), spec.database())
}

fn connection_suggestion(dialect: Dialect, error: &str) -> String {
    let error_str = error.to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            dialect.display_name()
        );
    }

    if error_str.contains("authentication")
        || error_str.contains("login failed")
        || error_str.contains("ora-01017")
        || error_str.contains("password")
        || error_str.contains("access denied")
    {
        return "Verify the username and password".to_string();
    }

    if error_str.contains("does not exist")
        || error_str.contains("unknown database")
        || error_str.contains("ora-12514")
    {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration on the server".to_string();
    }

    format!(
        "Verify host, port ({} by default) and database name",
        dialect.default_port()
    )
}
