//! MCP (Model Context Protocol) plumbing for the chat gateway.
//!
//! Tool providers are subprocesses speaking JSON-RPC 2.0 over
//! newline-delimited stdio. This crate launches them, runs the handshake,
//! and adapts each one to the `ToolProvider` seam used by the router.
//!
//! # Architecture
//!
//! - **types**: JSON-RPC 2.0 and MCP-specific protocol types
//! - **transport**: Pluggable transport layer (stdio, child pipes, channels)
//! - **launch**: Provider path → command resolution
//! - **client**: MCP client (handshake, pagination, id matching)
//! - **connection**: `McpToolProvider`, a client exposed as a `ToolProvider`
//! - **server**: MCP server wrapping any `ToolProvider`
//! - **error**: Unified error types
//!
//! # Usage
//!
//! ```no_run
//! use chatbot_mcp::{LaunchSpec, McpToolProvider};
//! use chatbot_tool_runtime::ToolProvider;
//!
//! # async fn example() {
//! let spec = LaunchSpec::new("github-mcp-server").with_args(["stdio"]);
//! let provider = McpToolProvider::launch("github", &spec).await.unwrap();
//! let tools = provider.list_tools().await.unwrap();
//! # }
//! ```

pub mod types;
pub mod transport;
pub mod launch;
pub mod client;
pub mod connection;
pub mod server;
pub mod error;

pub use types::*;
pub use transport::{ChannelTransport, ChildProcessTransport, McpTransport, StdioTransport};
pub use launch::LaunchSpec;
pub use client::McpClient;
pub use connection::McpToolProvider;
pub use server::McpServer;
pub use error::McpError;
