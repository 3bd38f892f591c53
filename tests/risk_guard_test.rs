//! Black-box tests for the destructive-statement guard.
//!
//! Random statement mixes check that the verdict covers the whole text and
//! that comments never trigger or hide a verdict on their own.

use rand::Rng;
use rand::seq::SliceRandom;
use text2data::tools::guard::{RISK_KEYWORDS, find_risky_statement, is_risky, split_statements};

const SAFE_STATEMENTS: [&str; 6] = [
    "SELECT 1",
    "select * from orders where id = 3",
    "WITH t AS (SELECT 1) SELECT * FROM t",
    "SHOW TABLES",
    "explain select * from users",
    "CREATE TEMPORARY TABLE scratch (id int)",
];

fn risky_statement(rng: &mut impl Rng) -> String {
    let keyword = RISK_KEYWORDS.choose(rng).copied().unwrap_or("DROP");
    let keyword = if rng.gen_bool(0.5) {
        keyword.to_lowercase()
    } else {
        keyword.to_string()
    };
    format!("{} something_{}", keyword, rng.gen_range(0..1000))
}

fn decorate(statement: &str, rng: &mut impl Rng) -> String {
    match rng.gen_range(0..4) {
        0 => format!("/* note */ {}", statement),
        // The line comment must end before the separator that follows
        1 => format!("{} -- trailing\n", statement),
        2 => format!("\n\t {}  ", statement),
        _ => statement.to_string(),
    }
}

#[test]
fn test_documented_verdicts() {
    assert!(is_risky("SELECT 1; DROP TABLE x;"));
    assert!(!is_risky("SELECT * FROM t -- DROP nothing"));
    assert!(!is_risky("/* DELETE this comment */ SELECT 1"));
    assert!(is_risky("drop table x"));
}

#[test]
fn test_random_safe_mixes_pass() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let count = rng.gen_range(1..6);
        let sql = (0..count)
            .map(|_| decorate(SAFE_STATEMENTS.choose(&mut rng).copied().unwrap_or("SELECT 1"), &mut rng))
            .collect::<Vec<_>>()
            .join(";\n");
        assert!(!is_risky(&sql), "flagged safe text: {sql:?}");
    }
}

#[test]
fn test_one_risky_statement_anywhere_is_caught() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let mut statements: Vec<String> = (0..rng.gen_range(0..5))
            .map(|_| SAFE_STATEMENTS.choose(&mut rng).copied().unwrap_or("SELECT 1").to_string())
            .collect();
        let position = rng.gen_range(0..=statements.len());
        statements.insert(position, risky_statement(&mut rng));
        let sql = statements
            .iter()
            .map(|s| decorate(s, &mut rng))
            .collect::<Vec<_>>()
            .join(";\n");
        assert!(is_risky(&sql), "missed risky text: {sql:?}");
    }
}

#[test]
fn test_keywords_inside_comments_are_ignored() {
    for keyword in RISK_KEYWORDS {
        let block = format!("/* {} TABLE a */ SELECT 1", keyword);
        let line = format!("SELECT 1 -- {} TABLE a", keyword);
        let multi = format!("SELECT 1 /*\n{} everything\n*/; SELECT 2", keyword);
        assert!(!is_risky(&block), "{block}");
        assert!(!is_risky(&line), "{line}");
        assert!(!is_risky(&multi), "{multi}");
    }
}

#[test]
fn test_keyword_must_lead_the_statement() {
    assert!(!is_risky("SELECT 'DROP' AS word"));
    assert!(!is_risky("SELECT updated_at FROM t"));
    assert!(!is_risky("SELECT * FROM deleted_rows"));
    assert!(is_risky("UPDATE t SET a = 1"));
}

#[test]
fn test_line_comment_swallows_the_following_separator() {
    // Splitting happens after comment removal, so a `--` comment that runs
    // over the `;` merges the next statement into this one.
    assert!(!is_risky("CREATE t -- x;\nALTER y"));
    assert!(is_risky("CREATE t -- x\n;\nALTER y"));
}

#[test]
fn test_offending_statement_is_reported() {
    assert_eq!(
        find_risky_statement("SELECT 1;\n  TRUNCATE audit_log ; SELECT 2").as_deref(),
        Some("TRUNCATE audit_log")
    );
}

#[test]
fn test_empty_and_comment_only_text() {
    for sql in ["", "   ", ";;;", "-- nothing", "/* nothing */"] {
        assert!(split_statements(sql).is_empty(), "{sql:?}");
        assert!(!is_risky(sql));
    }
}

#[test]
fn test_random_garbage_never_panics() {
    let mut rng = rand::thread_rng();
    let alphabet: Vec<char> = "abcDROP;-/* \n\t'\"\u{00e9}\u{4e2d}".chars().collect();
    for _ in 0..500 {
        let len = rng.gen_range(0..80);
        let sql: String = (0..len)
            .map(|_| *alphabet.choose(&mut rng).unwrap_or(&' '))
            .collect();
        let _ = is_risky(&sql);
    }
}
