//! System prompt rendering for SQL generation.
//!
//! Templates are looked up as `<dialect>_prompt.jinja`, falling back to
//! `base_prompt.jinja`. Built-in templates ship with the binary; files in an
//! optional override directory replace them by name.

use crate::error::{ToolError, ToolResult};
use crate::models::Dialect;
use minijinja::{Environment, ErrorKind};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// Template used when no dialect-specific one exists.
pub const BASE_TEMPLATE: &str = "base_prompt.jinja";

/// Row limit shown to the LLM when the caller does not set one.
pub const DEFAULT_LIMIT: u32 = 100;

const TEMPLATE_SUFFIX: &str = "_prompt.jinja";

const BUILTIN_TEMPLATES: [(&str, &str); 3] = [
    (BASE_TEMPLATE, include_str!("templates/base_prompt.jinja")),
    ("mysql_prompt.jinja", include_str!("templates/mysql_prompt.jinja")),
    (
        "hologres_prompt.jinja",
        include_str!("templates/hologres_prompt.jinja"),
    ),
];

/// Values available to every prompt template.
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    /// Uppercased dialect name
    pub db_type: String,
    /// Compressed schema DSL
    pub meta_data: String,
    pub limit_clause: String,
    pub optimization_rules: String,
    pub user_custom_prompt: String,
    pub limit: u32,
}

impl PromptContext {
    pub fn new(dialect: Dialect, meta_data: impl Into<String>) -> Self {
        Self {
            db_type: dialect.as_str().to_uppercase(),
            meta_data: meta_data.into(),
            limit_clause: dialect.limit_clause().to_string(),
            optimization_rules: dialect.optimization_rules().to_string(),
            user_custom_prompt: String::new(),
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_custom_prompt(mut self, custom_prompt: impl Into<String>) -> Self {
        self.user_custom_prompt = custom_prompt.into();
        self
    }
}

/// Template set for system prompts.
#[derive(Debug)]
pub struct PromptLoader {
    env: Environment<'static>,
}

impl PromptLoader {
    /// Loader with the built-in templates only.
    pub fn builtin() -> ToolResult<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        for (name, source) in BUILTIN_TEMPLATES {
            env.add_template(name, source)
                .map_err(|e| ToolError::prompt(format!("Invalid built-in template {}: {}", name, e)))?;
        }
        Ok(Self { env })
    }

    /// Loader with built-ins overridden by `*_prompt.jinja` files in `dir`.
    pub fn with_overrides(dir: &Path) -> ToolResult<Self> {
        let mut loader = Self::builtin()?;
        let entries = std::fs::read_dir(dir).map_err(|e| {
            ToolError::prompt(format!(
                "Cannot read prompt directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        for entry in entries {
            let path = entry
                .map_err(|e| ToolError::prompt(format!("Cannot read prompt directory: {}", e)))?
                .path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(TEMPLATE_SUFFIX) || !path.is_file() {
                continue;
            }
            let source = std::fs::read_to_string(&path).map_err(|e| {
                ToolError::prompt(format!("Cannot read template {}: {}", path.display(), e))
            })?;
            loader
                .env
                .add_template_owned(name.to_string(), source)
                .map_err(|e| ToolError::prompt(format!("Invalid template {}: {}", name, e)))?;
            info!(template = %name, "Loaded prompt template override");
        }
        Ok(loader)
    }

    /// Name of the template that will be used for `dialect`.
    pub fn template_name(&self, dialect: Dialect) -> String {
        let name = format!("{}{}", dialect.as_str(), TEMPLATE_SUFFIX);
        if self.env.get_template(&name).is_ok() {
            name
        } else {
            BASE_TEMPLATE.to_string()
        }
    }

    /// Render the system prompt for `dialect`.
    pub fn render(&self, dialect: Dialect, context: &PromptContext) -> ToolResult<String> {
        let name = format!("{}{}", dialect.as_str(), TEMPLATE_SUFFIX);
        let template = match self.env.get_template(&name) {
            Ok(template) => template,
            Err(e) if e.kind() == ErrorKind::TemplateNotFound => self
                .env
                .get_template(BASE_TEMPLATE)
                .map_err(|e| ToolError::prompt(e.to_string()))?,
            Err(e) => return Err(ToolError::prompt(e.to_string())),
        };

        debug!(template = %template.name(), "Rendering system prompt");
        template
            .render(context)
            .map_err(|e| ToolError::prompt(format!("Failed to render {}: {}", template.name(), e)))
    }
}
