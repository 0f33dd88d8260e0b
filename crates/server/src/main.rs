//! chatbot-server — HTTP chat gateway in front of a Claude model and MCP tool providers.
//!
//! Subcommands:
//! - `serve` (default): connect providers and serve `/query`, `/tools`, `/tool`
//! - `check-model`: send one prompt to the configured backend and print the reply
//! - `list-tools`: connect providers, print the aggregated catalog, exit

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use chatbot_core::Config;
use chatbot_server::startup::{build_app_state, build_registry, McpConnector};
use chatbot_tool_runtime::{CompletionOptions, Turn};

// ── CLI ─────────────────────────────────────────────────────────────

/// Chat gateway connecting a Claude model to MCP tool providers.
#[derive(Parser, Debug)]
#[command(name = "chatbot-server", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve {
        /// Bind host, overriding HOST.
        #[arg(long)]
        host: Option<String>,

        /// Bind port, overriding PORT.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Send one prompt to the model backend and print the answer.
    CheckModel {
        #[arg(default_value = "Reply with the single word: ok")]
        prompt: String,
    },
    /// Connect the configured providers and print their tools.
    ListTools,
}

// ── Commands ────────────────────────────────────────────────────────

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let gateway = chatbot_llm::create_gateway(&config.llm)
        .await
        .context("Model backend not available")?;
    let registry = build_registry(&config, &McpConnector::default()).await;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = build_app_state(config, gateway, registry)?;
    let app = chatbot_server::build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down tool providers");
    state.registry.shutdown().await;
    Ok(())
}

async fn check_model(config: &Config, prompt: String) -> anyhow::Result<()> {
    let gateway = chatbot_llm::create_gateway(&config.llm)
        .await
        .context("Model backend not available")?;
    let options = CompletionOptions {
        system_prompt: config.llm.system_prompt.clone(),
        max_tokens: config.llm.max_tokens,
    };

    let response = tokio::time::timeout(
        config.llm.timeout,
        gateway.complete(&[Turn::user(prompt)], &[], &options),
    )
    .await
    .map_err(|_| anyhow::anyhow!("model call timed out after {:?}", config.llm.timeout))??;

    info!(backend = gateway.backend_name(), stop_reason = ?response.stop_reason, "Model reachable");
    println!("{}", Turn::assistant(response.content).text());
    Ok(())
}

async fn list_tools(config: &Config) -> anyhow::Result<()> {
    let registry = build_registry(config, &McpConnector::default()).await;

    for summary in registry.provider_statuses() {
        println!("{} [{:?}] {} tools", summary.id, summary.status, summary.tool_count);
    }
    for tool in registry.list() {
        println!("  {} ({})", tool.name, registry.owner(&tool.name).unwrap_or("?"));
    }
    if registry.is_empty() {
        warn!("No tools available; check MCP_PROVIDERS and MCP_<ID>_PATH");
    }

    registry.shutdown().await;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received"),
        _ = terminate => info!("SIGTERM received"),
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so RUST_LOG can come from it.
    chatbot_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().context("Invalid configuration")?;
    config.log_summary();

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::CheckModel { prompt } => check_model(&config, prompt).await,
        Command::ListTools => list_tools(&config).await,
    }
}
