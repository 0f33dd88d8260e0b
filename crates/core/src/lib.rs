pub mod config;
pub mod error;

pub use config::{Config, HistoryMode, LlmBackend, ProviderConfig};
pub use error::ConfigError;
