//! Risk guard for the execute_sql tool.
//!
//! This module flags SQL text whose statements start with a destructive
//! keyword (DROP, DELETE, TRUNCATE, ALTER, UPDATE, INSERT). It is a keyword
//! scanner, not a parser: semicolons or comment markers inside string
//! literals are not understood, so a `false` verdict is advisory only.

use regex::Regex;
use std::sync::LazyLock;

/// Leading keywords that mark a statement as destructive.
pub const RISK_KEYWORDS: [&str; 6] = ["DROP", "DELETE", "TRUNCATE", "ALTER", "UPDATE", "INSERT"];

/// Leading keywords of statements that return rows.
const READ_KEYWORDS: [&str; 8] = [
    "SELECT", "WITH", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "VALUES", "TABLE",
];

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment pattern"));
static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--[^\n]*").expect("valid line comment pattern"));
static STATEMENT_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r";\s*").expect("valid separator pattern"));

/// Remove `/* ... */` and `-- ...` comments.
pub fn strip_comments(sql: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(sql, "");
    LINE_COMMENT.replace_all(&without_blocks, "").into_owned()
}

/// Split comment-stripped SQL into trimmed, non-empty statements.
///
/// # Examples
///
/// ```
/// use text2data::tools::guard::split_statements;
///
/// let stmts = split_statements("SELECT 1; /* x */ SELECT 2;\n");
/// assert_eq!(stmts, vec!["SELECT 1", "SELECT 2"]);
/// ```
pub fn split_statements(sql: &str) -> Vec<String> {
    let stripped = strip_comments(sql);
    STATEMENT_SEPARATOR
        .split(&stripped)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// First whitespace-delimited token of a statement, uppercased.
pub fn leading_keyword(statement: &str) -> Option<String> {
    statement
        .split_whitespace()
        .next()
        .map(|token| token.to_uppercase())
}

/// Return the first statement whose leading keyword is destructive.
pub fn find_risky_statement(sql: &str) -> Option<String> {
    split_statements(sql).into_iter().find(|stmt| {
        leading_keyword(stmt).is_some_and(|kw| RISK_KEYWORDS.contains(&kw.as_str()))
    })
}

/// Check whether SQL text contains a destructive statement.
///
/// # Examples
///
/// ```
/// use text2data::tools::guard::is_risky;
///
/// assert!(is_risky("SELECT 1; DROP TABLE x;"));
/// assert!(!is_risky("SELECT * FROM t -- DROP nothing"));
/// assert!(!is_risky("/* DELETE this comment */ SELECT 1"));
/// ```
pub fn is_risky(sql: &str) -> bool {
    find_risky_statement(sql).is_some()
}

/// Whether the last statement of the text is expected to return rows.
///
/// Used to tell an empty SELECT apart from a write that touched no rows.
pub fn returns_rows(sql: &str) -> bool {
    split_statements(sql)
        .last()
        .and_then(|stmt| leading_keyword(stmt))
        .is_some_and(|kw| {
            let kw = kw.trim_start_matches('(');
            READ_KEYWORDS.contains(&kw)
        })
}
