//! Catalog queries used by schema introspection.
//!
//! [`SchemaCatalog`] is the seam between the introspection walk and the
//! database: [`DbSession`] implements it against the live catalog, and tests
//! substitute an in-memory catalog.
//!
//! SQL queries are organized in the `queries` submodule with constants for
//! each protocol family. Comment lookups come from the [`Dialect`] tables.

use crate::db::session::DbSession;
use crate::db::types::normalize_type_name;
use crate::error::{ToolError, ToolResult};
use crate::models::Dialect;
use std::future::Future;
use tracing::debug;

/// Read-only access to the database catalog.
///
/// `schema` is `None` for dialects without schema iteration, meaning the
/// connection's current database.
pub trait SchemaCatalog {
    fn dialect(&self) -> Dialect;

    /// All schema names visible to the connection.
    fn list_schemas(&mut self) -> impl Future<Output = ToolResult<Vec<String>>> + Send;

    /// Base tables.
    fn list_tables(
        &mut self,
        schema: Option<&str>,
    ) -> impl Future<Output = ToolResult<Vec<String>>> + Send;

    /// Plain and materialized views.
    fn list_views(
        &mut self,
        schema: Option<&str>,
    ) -> impl Future<Output = ToolResult<Vec<String>>> + Send;

    /// Partitioned parents and foreign tables that are not inheritance children.
    fn list_special_tables(
        &mut self,
        schema: &str,
    ) -> impl Future<Output = ToolResult<Vec<String>>> + Send;

    fn table_comment(
        &mut self,
        schema: Option<&str>,
        table: &str,
    ) -> impl Future<Output = ToolResult<Option<String>>> + Send;

    /// `(name, declared_type)` pairs in ordinal order.
    fn columns(
        &mut self,
        schema: Option<&str>,
        table: &str,
    ) -> impl Future<Output = ToolResult<Vec<(String, String)>>> + Send;

    fn column_comment(
        &mut self,
        schema: Option<&str>,
        table: &str,
        column: &str,
    ) -> impl Future<Output = ToolResult<Option<String>>> + Send;
}

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub mod postgres {
        pub const LIST_SCHEMAS: &str = r#"
            SELECT nspname FROM pg_catalog.pg_namespace ORDER BY nspname
            "#;

        pub const LIST_RELATIONS: &str = r#"
            SELECT c.relname
            FROM pg_catalog.pg_class c
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1
            AND c.relkind::text = ANY($2)
            ORDER BY c.relname
            "#;

        pub const LIST_SPECIAL_TABLES: &str = r#"
            SELECT c.relname AS table_name
            FROM pg_catalog.pg_class c
            JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid
            WHERE n.nspname = $1
            AND c.relkind IN ('p', 'f')
            AND NOT EXISTS (
                SELECT 1 FROM pg_catalog.pg_inherits i
                WHERE i.inhrelid = c.oid
            )
            ORDER BY c.relname
            "#;

        pub const LIST_COLUMNS: &str = r#"
            SELECT a.attname, pg_catalog.format_type(a.atttypid, a.atttypmod)
            FROM pg_catalog.pg_attribute a
            JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1
            AND c.relname = $2
            AND a.attnum > 0
            AND NOT a.attisdropped
            ORDER BY a.attnum
            "#;

        pub const TABLE_KINDS: &[&str] = &["r"];
        pub const VIEW_KINDS: &[&str] = &["v", "m"];
    }

    pub mod mysql {
        pub const LIST_SCHEMAS: &str = r#"
            SELECT CONVERT(SCHEMA_NAME USING utf8) AS SCHEMA_NAME
            FROM information_schema.SCHEMATA
            ORDER BY SCHEMA_NAME
            "#;

        pub const LIST_TABLES: &str = r#"
            SELECT CONVERT(TABLE_NAME USING utf8) AS TABLE_NAME
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
            AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
            "#;

        pub const LIST_VIEWS: &str = r#"
            SELECT CONVERT(TABLE_NAME USING utf8) AS TABLE_NAME
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
            AND TABLE_TYPE = 'VIEW'
            ORDER BY TABLE_NAME
            "#;

        pub const LIST_COLUMNS: &str = r#"
            SELECT
                CONVERT(COLUMN_NAME USING utf8) AS COLUMN_NAME,
                CONVERT(COLUMN_TYPE USING utf8) AS COLUMN_TYPE
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
            "#;
    }

    pub mod sqlserver {
        pub const LIST_SCHEMAS: &str = r#"
            SELECT name FROM sys.schemas ORDER BY name
            "#;

        pub const LIST_TABLES: &str = r#"
            SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
            "#;

        pub const LIST_VIEWS: &str = r#"
            SELECT TABLE_NAME FROM INFORMATION_SCHEMA.VIEWS
            ORDER BY TABLE_NAME
            "#;

        /// Declared type rebuilt from its length or precision columns.
        pub const LIST_COLUMNS: &str = r#"
            SELECT
                COLUMN_NAME,
                DATA_TYPE + CASE
                    WHEN CHARACTER_MAXIMUM_LENGTH = -1 THEN '(max)'
                    WHEN CHARACTER_MAXIMUM_LENGTH IS NOT NULL
                        THEN '(' + CAST(CHARACTER_MAXIMUM_LENGTH AS VARCHAR(10)) + ')'
                    WHEN DATA_TYPE IN ('decimal', 'numeric')
                        THEN '(' + CAST(NUMERIC_PRECISION AS VARCHAR(10)) + ','
                            + CAST(NUMERIC_SCALE AS VARCHAR(10)) + ')'
                    ELSE ''
                END AS COLUMN_TYPE
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_NAME = @P1
            ORDER BY ORDINAL_POSITION
            "#;
    }

    pub mod oracle {
        pub const LIST_SCHEMAS: &str = r#"
            SELECT USERNAME FROM ALL_USERS ORDER BY USERNAME
            "#;

        pub const LIST_TABLES: &str = r#"
            SELECT TABLE_NAME FROM USER_TABLES ORDER BY TABLE_NAME
            "#;

        pub const LIST_VIEWS: &str = r#"
            SELECT VIEW_NAME FROM USER_VIEWS ORDER BY VIEW_NAME
            "#;

        pub const LIST_COLUMNS: &str = r#"
            SELECT
                COLUMN_NAME,
                DATA_TYPE || CASE
                    WHEN DATA_TYPE IN ('VARCHAR2', 'NVARCHAR2', 'CHAR', 'NCHAR')
                        THEN '(' || CHAR_LENGTH || ')'
                    WHEN DATA_TYPE = 'NUMBER' AND DATA_PRECISION IS NOT NULL
                        THEN '(' || DATA_PRECISION || ',' || DATA_SCALE || ')'
                    ELSE ''
                END AS COLUMN_TYPE
            FROM USER_TAB_COLUMNS
            WHERE TABLE_NAME = :table_name
            ORDER BY COLUMN_ID
            "#;
    }
}

fn no_schema_support(dialect: Dialect) -> ToolError {
    ToolError::schema(
        format!("{} has no schema iteration", dialect.display_name()),
        dialect.as_str(),
    )
}

impl SchemaCatalog for DbSession {
    fn dialect(&self) -> Dialect {
        DbSession::dialect(self)
    }

    async fn list_schemas(&mut self) -> ToolResult<Vec<String>> {
        let names = match self {
            Self::MySql(conn) => mysql::names(conn, queries::mysql::LIST_SCHEMAS, &[]).await?,
            Self::Postgres(conn) => postgres::names(conn, queries::postgres::LIST_SCHEMAS).await?,
            Self::SqlServer(client) => {
                sqlserver::names(client, queries::sqlserver::LIST_SCHEMAS).await?
            }
            Self::Oracle(session) => oracle::names(session, queries::oracle::LIST_SCHEMAS).await?,
        };
        debug!(count = names.len(), "Listed schemas");
        Ok(names)
    }

    async fn list_tables(&mut self, schema: Option<&str>) -> ToolResult<Vec<String>> {
        match self {
            Self::MySql(conn) => mysql::names(conn, queries::mysql::LIST_TABLES, &[schema]).await,
            Self::Postgres(conn) => {
                postgres::relations(conn, schema.unwrap_or("public"), queries::postgres::TABLE_KINDS)
                    .await
            }
            Self::SqlServer(client) => {
                sqlserver::names(client, queries::sqlserver::LIST_TABLES).await
            }
            Self::Oracle(session) => oracle::names(session, queries::oracle::LIST_TABLES).await,
        }
    }

    async fn list_views(&mut self, schema: Option<&str>) -> ToolResult<Vec<String>> {
        match self {
            Self::MySql(conn) => mysql::names(conn, queries::mysql::LIST_VIEWS, &[schema]).await,
            Self::Postgres(conn) => {
                postgres::relations(conn, schema.unwrap_or("public"), queries::postgres::VIEW_KINDS)
                    .await
            }
            Self::SqlServer(client) => sqlserver::names(client, queries::sqlserver::LIST_VIEWS).await,
            Self::Oracle(session) => oracle::names(session, queries::oracle::LIST_VIEWS).await,
        }
    }

    async fn list_special_tables(&mut self, schema: &str) -> ToolResult<Vec<String>> {
        match self {
            Self::MySql(_) | Self::SqlServer(_) | Self::Oracle(_) => {
                Err(no_schema_support(DbSession::dialect(self)))
            }
            Self::Postgres(conn) => {
                let rows: Vec<(String,)> =
                    sqlx::query_as(queries::postgres::LIST_SPECIAL_TABLES)
                        .bind(schema)
                        .fetch_all(&mut *conn)
                        .await?;
                Ok(rows.into_iter().map(|(name,)| name).collect())
            }
        }
    }

    async fn table_comment(
        &mut self,
        schema: Option<&str>,
        table: &str,
    ) -> ToolResult<Option<String>> {
        let sql = self.dialect().table_comment_sql();
        match self {
            Self::MySql(conn) => {
                mysql::optional_string(conn, sql, &[schema, Some(table)]).await
            }
            Self::Postgres(conn) => {
                postgres::optional_string(conn, sql, &[schema.unwrap_or("public"), table]).await
            }
            Self::SqlServer(client) => sqlserver::optional_string(client, sql, &[table]).await,
            Self::Oracle(session) => {
                oracle::optional_string(session, sql, &[("table_name", table)]).await
            }
        }
    }

    async fn columns(
        &mut self,
        schema: Option<&str>,
        table: &str,
    ) -> ToolResult<Vec<(String, String)>> {
        let dialect = self.dialect();
        let columns = match self {
            Self::MySql(conn) => mysql::columns(conn, schema, table).await?,
            Self::Postgres(conn) => {
                let rows: Vec<(String, Option<String>)> =
                    sqlx::query_as(queries::postgres::LIST_COLUMNS)
                        .bind(schema.unwrap_or("public"))
                        .bind(table)
                        .fetch_all(&mut *conn)
                        .await?;
                rows.into_iter()
                    .map(|(name, ty)| (name, ty.unwrap_or_default()))
                    .collect()
            }
            Self::SqlServer(client) => sqlserver::columns(client, table).await?,
            Self::Oracle(session) => oracle::columns(session, table).await?,
        };
        Ok(columns
            .into_iter()
            .map(|(name, ty)| (name, normalize_type_name(&ty, dialect)))
            .collect())
    }

    async fn column_comment(
        &mut self,
        schema: Option<&str>,
        table: &str,
        column: &str,
    ) -> ToolResult<Option<String>> {
        let sql = self.dialect().column_comment_sql();
        match self {
            Self::MySql(conn) => {
                mysql::optional_string(conn, sql, &[schema, Some(table), Some(column)]).await
            }
            Self::Postgres(conn) => {
                postgres::optional_string(conn, sql, &[schema.unwrap_or("public"), table, column])
                    .await
            }
            Self::SqlServer(client) => {
                sqlserver::optional_string(client, sql, &[table, column]).await
            }
            Self::Oracle(session) => {
                oracle::optional_string(
                    session,
                    sql,
                    &[("table_name", table), ("column_name", column)],
                )
                .await
            }
        }
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod mysql {
    use super::*;
    use sqlx::mysql::{MySqlConnection, MySqlRow};
    use sqlx::Row;

    /// Safely get an optional string by index.
    /// MySQL may return VARBINARY instead of VARCHAR depending on charset configuration.
    fn get_optional_string(row: &MySqlRow, index: usize) -> Option<String> {
        row.try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .or_else(|| {
                row.try_get::<Option<Vec<u8>>, _>(index)
                    .ok()
                    .flatten()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
    }

    async fn fetch(
        conn: &mut MySqlConnection,
        sql: &str,
        binds: &[Option<&str>],
    ) -> ToolResult<Vec<MySqlRow>> {
        let mut query = sqlx::query::<sqlx::MySql>(sql);
        for bind in binds {
            query = query.bind(*bind);
        }
        Ok(query.fetch_all(&mut *conn).await?)
    }

    pub async fn names(
        conn: &mut MySqlConnection,
        sql: &str,
        binds: &[Option<&str>],
    ) -> ToolResult<Vec<String>> {
        let rows = fetch(conn, sql, binds).await?;
        Ok(rows
            .iter()
            .filter_map(|row| get_optional_string(row, 0))
            .collect())
    }

    pub async fn optional_string(
        conn: &mut MySqlConnection,
        sql: &str,
        binds: &[Option<&str>],
    ) -> ToolResult<Option<String>> {
        let rows = fetch(conn, sql, binds).await?;
        Ok(rows.first().and_then(|row| get_optional_string(row, 0)))
    }

    pub async fn columns(
        conn: &mut MySqlConnection,
        schema: Option<&str>,
        table: &str,
    ) -> ToolResult<Vec<(String, String)>> {
        let rows = fetch(conn, queries::mysql::LIST_COLUMNS, &[schema, Some(table)]).await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let name = get_optional_string(row, 0)?;
                Some((name, get_optional_string(row, 1).unwrap_or_default()))
            })
            .collect())
    }
}

mod postgres {
    use super::*;
    use sqlx::postgres::PgConnection;

    pub async fn names(conn: &mut PgConnection, sql: &str) -> ToolResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(sql).fetch_all(&mut *conn).await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    pub async fn relations(
        conn: &mut PgConnection,
        schema: &str,
        kinds: &[&str],
    ) -> ToolResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(queries::postgres::LIST_RELATIONS)
            .bind(schema)
            .bind(kinds)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    pub async fn optional_string(
        conn: &mut PgConnection,
        sql: &str,
        binds: &[&str],
    ) -> ToolResult<Option<String>> {
        let mut query = sqlx::query_scalar::<sqlx::Postgres, Option<String>>(sql);
        for bind in binds {
            query = query.bind(*bind);
        }
        Ok(query.fetch_optional(&mut *conn).await?.flatten())
    }
}

mod sqlserver {
    use super::*;
    use crate::db::session::SqlServerClient;
    use tiberius::{Row, ToSql};

    async fn fetch(
        client: &mut SqlServerClient,
        sql: &str,
        binds: &[&str],
    ) -> ToolResult<Vec<Row>> {
        let params: Vec<&dyn ToSql> = binds.iter().map(|b| b as &dyn ToSql).collect();
        Ok(client.query(sql, &params).await?.into_first_result().await?)
    }

    fn string_at(row: &Row, index: usize) -> ToolResult<Option<String>> {
        Ok(row.try_get::<&str, _>(index)?.map(str::to_string))
    }

    pub async fn names(client: &mut SqlServerClient, sql: &str) -> ToolResult<Vec<String>> {
        let rows = fetch(client, sql, &[]).await?;
        let mut names = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(name) = string_at(row, 0)? {
                names.push(name);
            }
        }
        Ok(names)
    }

    pub async fn optional_string(
        client: &mut SqlServerClient,
        sql: &str,
        binds: &[&str],
    ) -> ToolResult<Option<String>> {
        let rows = fetch(client, sql, binds).await?;
        match rows.first() {
            Some(row) => string_at(row, 0),
            None => Ok(None),
        }
    }

    pub async fn columns(
        client: &mut SqlServerClient,
        table: &str,
    ) -> ToolResult<Vec<(String, String)>> {
        let rows = fetch(client, queries::sqlserver::LIST_COLUMNS, &[table]).await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(name) = string_at(row, 0)? {
                columns.push((name, string_at(row, 1)?.unwrap_or_default()));
            }
        }
        Ok(columns)
    }
}

mod oracle {
    use super::*;
    use crate::db::session::OracleSession;

    /// Collect the given columns of every row as optional strings.
    fn query_strings(
        conn: &::oracle::Connection,
        sql: &str,
        binds: &[(String, String)],
        width: usize,
    ) -> ToolResult<Vec<Vec<Option<String>>>> {
        let named: Vec<(&str, &dyn ::oracle::sql_type::ToSql)> = binds
            .iter()
            .map(|(name, value)| (name.as_str(), value as &dyn ::oracle::sql_type::ToSql))
            .collect();
        let rows = conn.query_named(sql, &named)?;
        let mut out = Vec::new();
        for row in rows {
            let row = row?;
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(row.get::<usize, Option<String>>(index)?);
            }
            out.push(values);
        }
        Ok(out)
    }

    fn owned_binds(binds: &[(&str, &str)]) -> Vec<(String, String)> {
        binds
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    pub async fn names(session: &mut OracleSession, sql: &'static str) -> ToolResult<Vec<String>> {
        let rows = session
            .run(move |conn| query_strings(conn, sql, &[], 1))
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| row.pop().flatten())
            .collect())
    }

    pub async fn optional_string(
        session: &mut OracleSession,
        sql: &'static str,
        binds: &[(&str, &str)],
    ) -> ToolResult<Option<String>> {
        let binds = owned_binds(binds);
        let rows = session
            .run(move |conn| query_strings(conn, sql, &binds, 1))
            .await?;
        Ok(rows.into_iter().next().and_then(|mut row| row.pop().flatten()))
    }

    pub async fn columns(
        session: &mut OracleSession,
        table: &str,
    ) -> ToolResult<Vec<(String, String)>> {
        let binds = owned_binds(&[("table_name", table)]);
        let rows = session
            .run(move |conn| query_strings(conn, queries::oracle::LIST_COLUMNS, &binds, 2))
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let mut values = row.into_iter();
                let name = values.next().flatten()?;
                Some((name, values.next().flatten().unwrap_or_default()))
            })
            .collect())
    }
}
