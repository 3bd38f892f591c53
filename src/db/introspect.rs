//! Schema introspection.
//!
//! Walks the catalog of one connection and produces a [`SchemaSnapshot`].
//! For the PostgreSQL family every non-system schema is visited and names are
//! qualified as `schema.table`; other dialects list the current database only.
//!
//! A failing table-comment lookup aborts the walk. A failing column-comment
//! lookup is logged and the column keeps an empty comment.

use crate::db::catalog::SchemaCatalog;
use crate::db::session::DbSession;
use crate::error::{ToolError, ToolResult};
use crate::models::{ColumnInfo, ConnectionSpec, SchemaSnapshot, TableInfo};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Schema assumed for unqualified names in the PostgreSQL family.
pub const DEFAULT_SCHEMA: &str = "public";

/// Comma-separated list of table names restricting introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFilter {
    names: Vec<String>,
}

impl TableFilter {
    /// Parse `"orders, customers"`; blank input means no filter.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return None;
        }
        let names = raw
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        Some(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Filter names that were discovered, in filter order without repeats.
    pub fn select(&self, discovered: &[String]) -> Vec<String> {
        let known: HashSet<&str> = discovered.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        self.names
            .iter()
            .filter(|name| known.contains(name.as_str()) && seen.insert(name.as_str()))
            .cloned()
            .collect()
    }
}

fn is_system_schema(name: &str, excluded: &[&str]) -> bool {
    name.starts_with("pg_") || excluded.iter().any(|e| *e == name)
}

fn push_unique(all: &mut Vec<String>, seen: &mut HashSet<String>, name: String) {
    if seen.insert(name.clone()) {
        all.push(name);
    }
}

fn metadata_error(err: ToolError, object: &str) -> ToolError {
    ToolError::schema(
        format!("Failed to retrieve database table metadata: {}", err),
        object,
    )
}

/// Enumerate every table and view the snapshot may contain.
pub async fn discover_tables<C: SchemaCatalog>(catalog: &mut C) -> ToolResult<Vec<String>> {
    let dialect = catalog.dialect();
    let mut all = Vec::new();
    let mut seen = HashSet::new();

    if !dialect.is_postgres_family() {
        for name in catalog
            .list_tables(None)
            .await
            .map_err(|e| metadata_error(e, dialect.as_str()))?
        {
            push_unique(&mut all, &mut seen, name);
        }
        return Ok(all);
    }

    let excluded = dialect.excluded_schemas();
    let schemas = catalog
        .list_schemas()
        .await
        .map_err(|e| metadata_error(e, dialect.as_str()))?;

    for schema in schemas
        .into_iter()
        .filter(|s| !is_system_schema(s, excluded))
    {
        let tables = catalog
            .list_tables(Some(schema.as_str()))
            .await
            .map_err(|e| metadata_error(e, &schema))?;
        let views = catalog
            .list_views(Some(schema.as_str()))
            .await
            .map_err(|e| metadata_error(e, &schema))?;
        let special = match catalog.list_special_tables(&schema).await {
            Ok(names) => names,
            Err(e) => {
                warn!(schema = %schema, error = %e, "Failed to list partitioned and foreign tables");
                Vec::new()
            }
        };

        debug!(
            schema = %schema,
            tables = tables.len(),
            views = views.len(),
            special = special.len(),
            "Discovered relations"
        );

        for name in tables.into_iter().chain(views).chain(special) {
            push_unique(&mut all, &mut seen, format!("{}.{}", schema, name));
        }
    }

    Ok(all)
}

/// Introspect through an open catalog.
pub async fn introspect<C: SchemaCatalog>(
    catalog: &mut C,
    filter: Option<&TableFilter>,
) -> ToolResult<SchemaSnapshot> {
    let dialect = catalog.dialect();
    let discovered = discover_tables(catalog).await?;
    let targets = match filter {
        Some(filter) => filter.select(&discovered),
        None => discovered,
    };

    info!(tables = targets.len(), "Retrieving table metadata");

    let mut builder = SchemaSnapshot::builder();
    for qualified in targets {
        let (schema, table) = match qualified.split_once('.') {
            Some((schema, table)) if dialect.is_postgres_family() => (Some(schema), table),
            _ if dialect.is_postgres_family() => (Some(DEFAULT_SCHEMA), qualified.as_str()),
            _ => (None, qualified.as_str()),
        };

        let comment = catalog.table_comment(schema, table).await.map_err(|e| {
            ToolError::schema(
                format!("Failed to retrieve table comments: {}", e),
                qualified.as_str(),
            )
        })?;

        let mut info = TableInfo::new(qualified.as_str())
            .with_comment(comment.unwrap_or_default());

        let columns = catalog
            .columns(schema, table)
            .await
            .map_err(|e| metadata_error(e, &qualified))?;

        for (name, declared_type) in columns {
            let comment = match catalog.column_comment(schema, table, &name).await {
                Ok(comment) => comment.unwrap_or_default(),
                Err(e) => {
                    warn!(table = %qualified, column = %name, error = %e, "Failed to get column comment");
                    String::new()
                }
            };
            info = info.with_column(ColumnInfo::new(name, declared_type).with_comment(comment));
        }

        debug!(table = %qualified, columns = info.columns.len(), "Introspected table");
        builder.insert(info);
    }

    Ok(builder.build())
}

/// Open a session, introspect it, and close it on every exit path.
pub async fn load_schema(
    spec: &ConnectionSpec,
    filter: Option<&TableFilter>,
    connect_timeout: Duration,
) -> ToolResult<SchemaSnapshot> {
    let mut session = DbSession::open(spec, connect_timeout).await?;
    let result = introspect(&mut session, filter).await;
    session.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dialect;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryCatalog {
        dialect: Option<Dialect>,
        schemas: Vec<String>,
        tables: HashMap<String, Vec<String>>,
        views: HashMap<String, Vec<String>>,
        special: HashMap<String, Vec<String>>,
        columns: HashMap<String, Vec<(String, String)>>,
        table_comments: HashMap<String, String>,
        column_comments: HashMap<String, String>,
        fail_table_comment: bool,
        fail_column_comment: bool,
        fail_special: bool,
    }

    fn key(schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(s) => format!("{}.{}", s, table),
            None => table.to_string(),
        }
    }

    impl MemoryCatalog {
        fn mysql() -> Self {
            Self {
                dialect: Some(Dialect::MySql),
                ..Default::default()
            }
        }

        fn hologres() -> Self {
            Self {
                dialect: Some(Dialect::Hologres),
                ..Default::default()
            }
        }

        fn table(mut self, schema: &str, name: &str, columns: &[(&str, &str)]) -> Self {
            self.tables
                .entry(schema.to_string())
                .or_default()
                .push(name.to_string());
            let owner = if self.dialect == Some(Dialect::MySql) {
                key(None, name)
            } else {
                key(Some(schema), name)
            };
            self.columns.insert(
                owner,
                columns
                    .iter()
                    .map(|(n, t)| (n.to_string(), t.to_string()))
                    .collect(),
            );
            if !self.schemas.iter().any(|s| s == schema) {
                self.schemas.push(schema.to_string());
            }
            self
        }
    }

    impl SchemaCatalog for MemoryCatalog {
        fn dialect(&self) -> Dialect {
            self.dialect.unwrap_or(Dialect::MySql)
        }

        async fn list_schemas(&mut self) -> ToolResult<Vec<String>> {
            Ok(self.schemas.clone())
        }

        async fn list_tables(&mut self, schema: Option<&str>) -> ToolResult<Vec<String>> {
            let schema = schema.unwrap_or("db");
            Ok(self.tables.get(schema).cloned().unwrap_or_default())
        }

        async fn list_views(&mut self, schema: Option<&str>) -> ToolResult<Vec<String>> {
            let schema = schema.unwrap_or("db");
            Ok(self.views.get(schema).cloned().unwrap_or_default())
        }

        async fn list_special_tables(&mut self, schema: &str) -> ToolResult<Vec<String>> {
            if self.fail_special {
                return Err(ToolError::database("relation pg_inherits denied", None, ""));
            }
            Ok(self.special.get(schema).cloned().unwrap_or_default())
        }

        async fn table_comment(
            &mut self,
            schema: Option<&str>,
            table: &str,
        ) -> ToolResult<Option<String>> {
            if self.fail_table_comment {
                return Err(ToolError::database("permission denied", None, ""));
            }
            Ok(self.table_comments.get(&key(schema, table)).cloned())
        }

        async fn columns(
            &mut self,
            schema: Option<&str>,
            table: &str,
        ) -> ToolResult<Vec<(String, String)>> {
            Ok(self
                .columns
                .get(&key(schema, table))
                .cloned()
                .unwrap_or_default())
        }

        async fn column_comment(
            &mut self,
            schema: Option<&str>,
            table: &str,
            column: &str,
        ) -> ToolResult<Option<String>> {
            if self.fail_column_comment {
                return Err(ToolError::database("timeout", None, ""));
            }
            let k = format!("{}.{}", key(schema, table), column);
            Ok(self.column_comments.get(&k).cloned())
        }
    }

    #[test]
    fn test_table_filter_parse() {
        let filter = TableFilter::parse(" orders , customers ,").unwrap();
        assert_eq!(filter.names(), &["orders", "customers"]);
        assert!(TableFilter::parse("").is_none());
        assert!(TableFilter::parse("   ").is_none());
    }

    #[test]
    fn test_table_filter_select_keeps_filter_order() {
        let discovered = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let filter = TableFilter::parse("c, x, a, c").unwrap();
        assert_eq!(filter.select(&discovered), vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_filter_drops_unknown_tables() {
        let mut catalog = MemoryCatalog::mysql().table("db", "orders", &[("id", "INT(11)")]);
        let filter = TableFilter::parse("orders,customers").unwrap();

        let snapshot = introspect(&mut catalog, Some(&filter)).await.unwrap();
        assert_eq!(snapshot.table_names().collect::<Vec<_>>(), vec!["orders"]);
    }

    #[tokio::test]
    async fn test_mysql_names_are_unqualified() {
        let mut catalog = MemoryCatalog::mysql()
            .table("db", "users", &[("id", "INT"), ("email", "VARCHAR(255)")]);
        catalog
            .table_comments
            .insert("users".into(), "Registered users".into());
        catalog
            .column_comments
            .insert("users.email".into(), "login".into());

        let snapshot = introspect(&mut catalog, None).await.unwrap();
        let users = snapshot.get("users").unwrap();
        assert_eq!(users.comment.as_deref(), Some("Registered users"));
        assert_eq!(users.columns[1].comment.as_deref(), Some("login"));
        assert_eq!(users.columns[0].comment, None);
    }

    #[tokio::test]
    async fn test_hologres_walks_schemas_and_skips_system_ones() {
        let mut catalog = MemoryCatalog::hologres()
            .table("public", "orders", &[("id", "BIGINT")])
            .table("sales", "targets", &[("q", "TEXT")])
            .table("pg_toast", "chunk", &[])
            .table("hologres_statistic", "stats", &[])
            .table("information_schema", "tables", &[]);
        catalog
            .views
            .insert("sales".into(), vec!["monthly".into()]);
        catalog
            .special
            .insert("public".into(), vec!["events".into()]);

        let snapshot = introspect(&mut catalog, None).await.unwrap();
        assert_eq!(
            snapshot.table_names().collect::<Vec<_>>(),
            vec!["public.orders", "public.events", "sales.targets", "sales.monthly"]
        );
    }

    #[tokio::test]
    async fn test_special_table_failure_keeps_other_tables() {
        let mut catalog = MemoryCatalog::hologres().table("public", "orders", &[("id", "INT")]);
        catalog.fail_special = true;

        let snapshot = introspect(&mut catalog, None).await.unwrap();
        assert!(snapshot.contains("public.orders"));
    }

    #[tokio::test]
    async fn test_table_comment_failure_is_fatal() {
        let mut catalog = MemoryCatalog::mysql().table("db", "orders", &[("id", "INT")]);
        catalog.fail_table_comment = true;

        let err = introspect(&mut catalog, None).await.unwrap_err();
        let ToolError::Schema { message, object } = err else {
            panic!("expected schema error");
        };
        assert!(message.starts_with("Failed to retrieve table comments"));
        assert_eq!(object, "orders");
    }

    #[tokio::test]
    async fn test_column_comment_failure_is_recovered() {
        let mut catalog =
            MemoryCatalog::mysql().table("db", "orders", &[("id", "INT"), ("total", "DECIMAL")]);
        catalog.fail_column_comment = true;

        let snapshot = introspect(&mut catalog, None).await.unwrap();
        let orders = snapshot.get("orders").unwrap();
        assert_eq!(orders.columns.len(), 2);
        assert!(orders.columns.iter().all(|c| c.comment.is_none()));
    }

    #[tokio::test]
    async fn test_duplicate_discovery_is_collapsed() {
        let mut catalog = MemoryCatalog::hologres().table("public", "p", &[("id", "INT")]);
        catalog.special.insert("public".into(), vec!["p".into()]);

        let snapshot = introspect(&mut catalog, None).await.unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_type_becomes_unknown() {
        let mut catalog = MemoryCatalog::mysql().table("db", "t", &[("c", "")]);
        let snapshot = introspect(&mut catalog, None).await.unwrap();
        assert_eq!(snapshot.get("t").unwrap().columns[0].declared_type, "UNKNOWN");
    }
}
