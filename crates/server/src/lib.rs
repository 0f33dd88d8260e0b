//! HTTP facade of the chat gateway.
//!
//! `main.rs` wires configuration, the model gateway and the MCP providers
//! together; everything reachable from the router lives here so it can be
//! driven in-process by tests.

pub mod api;
pub mod router;
pub mod startup;
pub mod state;

pub use router::build_router;
pub use state::AppState;
