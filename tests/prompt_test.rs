//! Integration tests for prompt template loading and overrides.

use std::fs;
use text2data::ToolError;
use text2data::models::Dialect;
use text2data::prompt::{BASE_TEMPLATE, PromptContext, PromptLoader};

#[test]
fn test_override_replaces_builtin() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("mysql_prompt.jinja"),
        "custom {{ db_type }} / {{ limit_clause }} / {{ limit }}",
    )
    .unwrap();

    let loader = PromptLoader::with_overrides(dir.path()).unwrap();
    let prompt = loader
        .render(
            Dialect::MySql,
            &PromptContext::new(Dialect::MySql, "T:t(id:i)").with_limit(7),
        )
        .unwrap();
    assert_eq!(prompt, "custom MYSQL / LIMIT n / 7");
}

#[test]
fn test_override_adds_dialect_template() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("sqlserver_prompt.jinja"),
        "{{ db_type }} uses {{ limit_clause }}",
    )
    .unwrap();

    let loader = PromptLoader::with_overrides(dir.path()).unwrap();
    assert_eq!(loader.template_name(Dialect::SqlServer), "sqlserver_prompt.jinja");
    assert_eq!(loader.template_name(Dialect::Oracle), BASE_TEMPLATE);

    let prompt = loader
        .render(Dialect::SqlServer, &PromptContext::new(Dialect::SqlServer, ""))
        .unwrap();
    assert_eq!(prompt, "SQLSERVER uses TOP n");
}

#[test]
fn test_unrelated_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "{{ broken").unwrap();
    fs::write(dir.path().join("mysql.jinja"), "{{ broken").unwrap();

    let loader = PromptLoader::with_overrides(dir.path()).unwrap();
    assert_eq!(loader.template_name(Dialect::MySql), "mysql_prompt.jinja");
}

#[test]
fn test_invalid_override_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("base_prompt.jinja"), "{% if %}").unwrap();

    let err = PromptLoader::with_overrides(dir.path()).unwrap_err();
    assert!(matches!(err, ToolError::Prompt { .. }));
    assert!(err.to_string().contains("base_prompt.jinja"));
}

#[test]
fn test_blocks_are_trimmed() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("oracle_prompt.jinja"),
        "start\n  {% if user_custom_prompt %}\nextra: {{ user_custom_prompt }}\n  {% endif %}\nend",
    )
    .unwrap();
    let loader = PromptLoader::with_overrides(dir.path()).unwrap();

    let plain = loader
        .render(Dialect::Oracle, &PromptContext::new(Dialect::Oracle, ""))
        .unwrap();
    assert_eq!(plain, "start\nend");

    let custom = loader
        .render(
            Dialect::Oracle,
            &PromptContext::new(Dialect::Oracle, "").with_custom_prompt("be brief"),
        )
        .unwrap();
    assert_eq!(custom, "start\nextra: be brief\nend");
}

#[test]
fn test_builtin_prompts_render_for_every_dialect() {
    let loader = PromptLoader::builtin().unwrap();
    for dialect in Dialect::ALL {
        let prompt = loader
            .render(dialect, &PromptContext::new(dialect, "T:t(id:i)"))
            .unwrap();
        assert!(prompt.contains("T:t(id:i)"), "{dialect:?}");
        assert!(prompt.contains(dialect.limit_clause()), "{dialect:?}");
    }
}
