//! Schema DSL compression.
//!
//! Renders a [`SchemaSnapshot`] as one line per table so it fits cheaply in an
//! LLM prompt:
//!
//! ```text
//! # Customer orders
//! T:public.orders(id:i, customer_id:i, total:f:# gross amount, created_at:dt)
//! ```

use crate::models::{ColumnInfo, SchemaSnapshot};

/// Map a declared column type to its short code.
///
/// Any parenthesized suffix is dropped and the rest uppercased before lookup;
/// types without an alias are returned lower-cased.
pub fn type_code(declared_type: &str) -> String {
    let base = declared_type
        .split('(')
        .next()
        .unwrap_or_default()
        .to_uppercase();

    let alias = match base.as_str() {
        "INTEGER" | "INT" | "BIGINT" | "SMALLINT" | "TINYINT" => "i",
        "VARCHAR" | "TEXT" | "CHAR" => "s",
        "DATETIME" | "TIMESTAMP" | "DATE" => "dt",
        "DECIMAL" | "NUMERIC" | "FLOAT" | "DOUBLE" => "f",
        "BOOLEAN" | "BOOL" => "b",
        "JSON" => "j",
        _ => return base.to_lowercase(),
    };
    alias.to_string()
}

fn column_entry(column: &ColumnInfo, include_types: bool, include_comments: bool) -> String {
    let mut parts = vec![column.name.clone()];
    if include_types {
        parts.push(type_code(&column.declared_type));
    }
    if include_comments {
        if let Some(comment) = column.comment.as_deref().filter(|c| !c.is_empty()) {
            parts.push(format!("# {}", comment));
        }
    }
    parts.join(":")
}

/// Compress a snapshot into the line-oriented schema DSL.
///
/// # Examples
///
/// ```
/// use text2data::dsl::compress;
/// use text2data::models::{ColumnInfo, SchemaSnapshot, TableInfo};
///
/// let mut builder = SchemaSnapshot::builder();
/// builder.insert(
///     TableInfo::new("users")
///         .with_column(ColumnInfo::new("id", "INTEGER"))
///         .with_column(ColumnInfo::new("name", "VARCHAR(50)")),
/// );
/// assert_eq!(compress(&builder.build(), true, false), "T:users(id:i, name:s)");
/// ```
pub fn compress(snapshot: &SchemaSnapshot, include_types: bool, include_comments: bool) -> String {
    let mut lines = Vec::with_capacity(snapshot.len());

    for table in snapshot.iter() {
        let columns = table
            .columns
            .iter()
            .map(|c| column_entry(c, include_types, include_comments))
            .collect::<Vec<_>>()
            .join(", ");

        if include_comments {
            if let Some(comment) = table.comment.as_deref().filter(|c| !c.is_empty()) {
                lines.push(format!("# {}", comment));
            }
        }
        lines.push(format!("T:{}({})", table.qualified_name, columns));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TableInfo;

    fn users() -> TableInfo {
        TableInfo::new("users")
            .with_comment("Registered users")
            .with_column(ColumnInfo::new("id", "INTEGER"))
            .with_column(ColumnInfo::new("name", "VARCHAR(50)").with_comment("display name"))
    }

    fn snapshot(tables: Vec<TableInfo>) -> SchemaSnapshot {
        let mut builder = SchemaSnapshot::builder();
        for table in tables {
            builder.insert(table);
        }
        builder.build()
    }

    #[test]
    fn test_type_codes() {
        assert_eq!(type_code("INTEGER"), "i");
        assert_eq!(type_code("bigint"), "i");
        assert_eq!(type_code("INT(11)"), "i");
        assert_eq!(type_code("VARCHAR(255)"), "s");
        assert_eq!(type_code("text"), "s");
        assert_eq!(type_code("TIMESTAMP"), "dt");
        assert_eq!(type_code("DATE"), "dt");
        assert_eq!(type_code("NUMERIC(10, 2)"), "f");
        assert_eq!(type_code("DOUBLE"), "f");
        assert_eq!(type_code("BOOLEAN"), "b");
        assert_eq!(type_code("json"), "j");
    }

    #[test]
    fn test_unknown_type_passes_through_lowercased() {
        assert_eq!(type_code("JSONB"), "jsonb");
        assert_eq!(type_code("BIGINT UNSIGNED"), "bigint unsigned");
        assert_eq!(type_code("DOUBLE PRECISION"), "double precision");
    }

    #[test]
    fn test_types_without_comments() {
        assert_eq!(
            compress(&snapshot(vec![users()]), true, false),
            "T:users(id:i, name:s)"
        );
    }

    #[test]
    fn test_names_only() {
        assert_eq!(
            compress(&snapshot(vec![users()]), false, false),
            "T:users(id, name)"
        );
    }

    #[test]
    fn test_with_comments() {
        assert_eq!(
            compress(&snapshot(vec![users()]), true, true),
            "# Registered users\nT:users(id:i, name:s:# display name)"
        );
    }

    #[test]
    fn test_comment_without_type() {
        assert_eq!(
            compress(&snapshot(vec![users()]), false, true),
            "# Registered users\nT:users(id, name:# display name)"
        );
    }

    #[test]
    fn test_snapshot_order_is_kept() {
        let schema = snapshot(vec![
            TableInfo::new("public.z").with_column(ColumnInfo::new("a", "int")),
            TableInfo::new("public.a").with_column(ColumnInfo::new("b", "bool")),
        ]);
        assert_eq!(
            compress(&schema, true, false),
            "T:public.z(a:i)\nT:public.a(b:b)"
        );
    }

    #[test]
    fn test_output_is_stable() {
        let schema = snapshot(vec![users(), TableInfo::new("empty")]);
        let first = compress(&schema, true, true);
        let second = compress(&schema.clone(), true, true);
        assert_eq!(first, second);
        assert!(first.ends_with("T:empty()"));
    }

    #[test]
    fn test_empty_snapshot() {
        assert_eq!(compress(&SchemaSnapshot::default(), true, true), "");
    }
}
