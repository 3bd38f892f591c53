//! Schema-related data models.
//!
//! This module defines the point-in-time schema snapshot produced by
//! introspection and consumed by the DSL compressor.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Raw type string as reported by the database, never empty
    pub declared_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ColumnInfo {
    /// Create a column without a comment.
    ///
    /// An empty declared type is recorded as `UNKNOWN`.
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let declared_type = declared_type.into();
        let declared_type = if declared_type.trim().is_empty() {
            "UNKNOWN".to_string()
        } else {
            declared_type
        };
        Self {
            name: name.into(),
            declared_type,
            comment: None,
        }
    }

    /// Set the comment; empty strings are stored as `None`.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        self.comment = (!comment.is_empty()).then_some(comment);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    /// `schema.table` for the PostgreSQL family, bare name elsewhere
    pub qualified_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            comment: None,
            columns: Vec::new(),
        }
    }

    /// Set the comment; empty strings are stored as `None`.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        self.comment = (!comment.is_empty()).then_some(comment);
        self
    }

    pub fn with_column(mut self, column: ColumnInfo) -> Self {
        self.columns.push(column);
        self
    }
}

/// Introspected tables keyed by qualified name, in discovery order.
///
/// Built once per request; there is no way to mutate a snapshot after
/// [`SchemaSnapshotBuilder::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SchemaSnapshot {
    tables: Vec<TableInfo>,
}

impl SchemaSnapshot {
    pub fn builder() -> SchemaSnapshotBuilder {
        SchemaSnapshotBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn get(&self, qualified_name: &str) -> Option<&TableInfo> {
        self.tables
            .iter()
            .find(|t| t.qualified_name == qualified_name)
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.get(qualified_name).is_some()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.qualified_name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables.iter()
    }
}

#[derive(Debug, Default)]
pub struct SchemaSnapshotBuilder {
    tables: Vec<TableInfo>,
}

impl SchemaSnapshotBuilder {
    /// Add a table. A later table with the same qualified name replaces the
    /// earlier one in place, keeping keys unique and the original position.
    pub fn insert(&mut self, table: TableInfo) -> &mut Self {
        match self
            .tables
            .iter_mut()
            .find(|t| t.qualified_name == table.qualified_name)
        {
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
        self
    }

    pub fn build(self) -> SchemaSnapshot {
        SchemaSnapshot {
            tables: self.tables,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_declared_type_is_never_stored() {
        let col = ColumnInfo::new("id", "  ");
        assert_eq!(col.declared_type, "UNKNOWN");
    }

    #[test]
    fn test_empty_comment_is_none() {
        assert_eq!(ColumnInfo::new("id", "INT").with_comment("").comment, None);
        assert_eq!(TableInfo::new("t").with_comment("").comment, None);
        assert_eq!(
            TableInfo::new("t").with_comment("Orders").comment.as_deref(),
            Some("Orders")
        );
    }

    #[test]
    fn test_snapshot_keeps_insertion_order_and_unique_keys() {
        let mut builder = SchemaSnapshot::builder();
        builder
            .insert(TableInfo::new("public.b"))
            .insert(TableInfo::new("public.a"))
            .insert(TableInfo::new("public.b").with_comment("second"));
        let snapshot = builder.build();

        assert_eq!(
            snapshot.table_names().collect::<Vec<_>>(),
            vec!["public.b", "public.a"]
        );
        assert_eq!(
            snapshot.get("public.b").unwrap().comment.as_deref(),
            Some("second")
        );
        assert!(!snapshot.contains("public.c"));
    }
}
