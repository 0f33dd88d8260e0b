//! mcp-echo-server — minimal MCP server over stdio.
//!
//! Serves the `echo` tool. Used as a real subprocess in integration tests
//! and as a smoke-test provider (`MCP_PROVIDERS=echo`,
//! `MCP_ECHO_ENABLED=true`, `MCP_ECHO_PATH=<path to this binary>`).
//!
//! Logs go to stderr; stdout carries only protocol messages.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use chatbot_mcp::{McpServer, StdioTransport};
use chatbot_tool_runtime::{EchoTool, LocalToolProvider};

/// Minimal MCP server exposing an `echo` tool over stdio.
#[derive(Parser, Debug)]
#[command(name = "mcp-echo-server", version, about)]
struct Cli {
    /// Server name reported during initialize.
    #[arg(long, env = "MCP_ECHO_SERVER_NAME", default_value = "mcp-echo-server")]
    name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let provider = LocalToolProvider::new("echo").with_tool(EchoTool)?;
    let mut server = McpServer::new(Arc::new(provider)).with_name(&cli.name);
    let mut transport = StdioTransport::new();

    info!(name = %cli.name, "mcp-echo-server ready");
    server.run(&mut transport).await?;
    info!("stdin closed, exiting");
    Ok(())
}
