//! Text2Data Server - Main entry point.
//!
//! This server provides the `execute_sql` and `text2data` MCP tools over
//! stdio.

use clap::Parser;
use std::sync::Arc;
use text2data::config::Config;
use text2data::llm::OpenAiClient;
use text2data::mcp::Text2DataService;
use text2data::prompt::PromptLoader;
use text2data::transport::{StdioTransport, Transport};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout is reserved for MCP messages.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    init_tracing(&config);

    info!(
        llm_base_url = %config.llm_base_url,
        llm_model = %config.llm_model,
        "Starting Text2Data Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let prompts = match &config.prompt_dir {
        Some(dir) => PromptLoader::with_overrides(dir)?,
        None => PromptLoader::builtin()?,
    };
    let llm = OpenAiClient::new(config.llm_config())?;

    let service = Text2DataService::new(
        config.connect_timeout_duration(),
        Arc::new(prompts),
        Arc::new(llm),
    );

    let transport = StdioTransport::new(service);
    info!(transport = transport.name(), "Using stdio transport");

    if let Err(e) = transport.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
