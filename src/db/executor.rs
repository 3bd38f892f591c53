//! Statement execution.
//!
//! Every dialect runs the SQL text inside one transaction: commit on success,
//! rollback on any error. Rows from any statement make the result a row set;
//! otherwise the affected-row counts of all statements are summed.
//!
//! - sqlx dialects send the text as-is over the simple-query protocol
//! - SQL Server sends it as one batch
//! - Oracle runs the comment-stripped statements one by one, since OCI
//!   accepts a single statement per call

use crate::db::session::{DbSession, SqlServerClient};
use crate::db::types::{DecodeRow, decode_tds_row};
use crate::error::ToolResult;
use crate::models::{ResultSet, Row};
use crate::tools::guard::{returns_rows, split_statements};
use futures_util::TryStreamExt;
use sqlx::{Connection, Either};
use std::time::Instant;
use tracing::{debug, warn};

/// Stream raw SQL through a transaction on any sqlx connection and collect
/// `(rows, affected)`.
macro_rules! sqlx_transaction {
    ($conn:expr, $sql:expr) => {{
        let mut tx = $conn.begin().await?;
        let collected = {
            let mut stream = sqlx::raw_sql($sql).fetch_many(&mut *tx);
            let mut rows = Vec::new();
            let mut affected = 0u64;
            while let Some(step) = stream.try_next().await? {
                match step {
                    Either::Left(done) => affected += done.rows_affected(),
                    Either::Right(row) => rows.push(row.decode_row()),
                }
            }
            (rows, affected)
        };
        tx.commit().await?;
        collected
    }};
}

/// Execute SQL text on an open session.
pub async fn execute(session: &mut DbSession, sql: &str) -> ToolResult<ResultSet> {
    let start = Instant::now();
    debug!(sql = %sql, dialect = %session.dialect(), "Executing statement");

    let (rows, affected) = match session {
        DbSession::MySql(conn) => sqlx_transaction!(conn, sql),
        DbSession::Postgres(conn) => sqlx_transaction!(conn, sql),
        DbSession::SqlServer(client) => sql_server_transaction(client, sql).await?,
        DbSession::Oracle(session) => {
            let statements = split_statements(sql);
            session
                .run(move |conn| {
                    match oracle_statements(conn, &statements) {
                        Ok(collected) => {
                            conn.commit()?;
                            Ok(collected)
                        }
                        Err(e) => {
                            if let Err(rollback) = conn.rollback() {
                                warn!(error = %rollback, "Oracle rollback failed");
                            }
                            Err(e)
                        }
                    }
                })
                .await?
        }
    };

    let result = classify(sql, rows, affected);
    debug!(
        rows = result.row_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Statement finished"
    );
    Ok(result)
}

async fn sql_server_command(client: &mut SqlServerClient, command: &str) -> ToolResult<()> {
    client.simple_query(command).await?.into_results().await?;
    Ok(())
}

async fn sql_server_transaction(
    client: &mut SqlServerClient,
    sql: &str,
) -> ToolResult<(Vec<Row>, u64)> {
    sql_server_command(client, "BEGIN TRANSACTION").await?;
    match sql_server_batch(client, sql).await {
        Ok(collected) => {
            sql_server_command(client, "COMMIT TRANSACTION").await?;
            Ok(collected)
        }
        Err(e) => {
            if let Err(rollback) = sql_server_command(client, "ROLLBACK TRANSACTION").await {
                warn!(error = %rollback, "SQL Server rollback failed");
            }
            Err(e)
        }
    }
}

/// Row-returning text is streamed as result sets; anything else is executed
/// for its affected-row counts.
async fn sql_server_batch(client: &mut SqlServerClient, sql: &str) -> ToolResult<(Vec<Row>, u64)> {
    if returns_rows(sql) {
        let sets = client.simple_query(sql).await?.into_results().await?;
        let rows = sets.into_iter().flatten().map(decode_tds_row).collect();
        Ok((rows, 0))
    } else {
        let result = client.execute(sql, &[]).await?;
        Ok((Vec::new(), result.total()))
    }
}

fn oracle_statements(
    conn: &oracle::Connection,
    statements: &[String],
) -> ToolResult<(Vec<Row>, u64)> {
    let mut rows = Vec::new();
    let mut affected = 0u64;
    for text in statements {
        let mut stmt = conn.statement(text).build()?;
        if stmt.is_query() {
            for row in stmt.query(&[])? {
                rows.push(row?.decode_row());
            }
        } else {
            stmt.execute(&[])?;
            affected += stmt.row_count()?;
        }
    }
    Ok((rows, affected))
}

/// Decide between a row set and an affected-row count.
///
/// A read statement that matched nothing is still a row set.
pub fn classify(sql: &str, rows: Vec<Row>, affected: u64) -> ResultSet {
    if !rows.is_empty() || returns_rows(sql) {
        ResultSet::Rows(rows)
    } else {
        ResultSet::Affected { rowcount: affected }
    }
}
