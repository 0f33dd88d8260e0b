use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Key/value source the config is built from.
///
/// Every key is first looked up as `{PROFILE}_{KEY}` when a profile is
/// active, falling back to `{KEY}`. Blank values count as unset.
struct Source<'a> {
    profile: &'a str,
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Source<'_> {
    fn opt(&self, key: &str) -> Option<String> {
        if !self.profile.is_empty() {
            let prefixed = format!("{}_{}", self.profile, key);
            if let Some(v) = (self.lookup)(&prefixed).filter(|s| !s.trim().is_empty()) {
                return Some(v);
            }
        }
        (self.lookup)(key).filter(|s| !s.trim().is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.opt(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.opt(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid(key, raw.clone(), e.to_string())),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        let Some(raw) = self.opt(key) else {
            return Ok(default);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::invalid(key, raw, "expected true or false")),
        }
    }

    /// Comma-separated list; items are trimmed and empty items dropped.
    fn list(&self, key: &str) -> Option<Vec<String>> {
        self.opt(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub tools: ToolsConfig,
    pub conversation: ConversationConfig,
    /// Declared providers in configuration order, enabled or not.
    pub providers: Vec<ProviderConfig>,
    /// Single-provider launch path used when no declared provider is enabled.
    pub legacy_script_path: Option<String>,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `CHATBOT_PROFILE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |key: &str| env::var(key).ok();
        Self::from_lookup(&lookup)
    }

    /// Build config from an explicit key/value map.
    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let lookup = |key: &str| values.get(key).cloned();
        Self::from_lookup(&lookup)
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let profile = lookup("CHATBOT_PROFILE")
            .unwrap_or_default()
            .trim()
            .to_uppercase();
        let src = Source {
            profile: &profile,
            lookup,
        };

        let provider_ids = src
            .list("MCP_PROVIDERS")
            .unwrap_or_else(|| vec!["github".to_string(), "filesystem".to_string()]);
        let mut providers = Vec::with_capacity(provider_ids.len());
        for id in provider_ids {
            let id = id.to_lowercase();
            if providers.iter().any(|p: &ProviderConfig| p.id == id) {
                return Err(ConfigError::invalid(
                    "MCP_PROVIDERS",
                    id,
                    "provider declared twice",
                ));
            }
            providers.push(ProviderConfig::from_source(&src, &id)?);
        }

        let config = Self {
            profile: profile.clone(),
            server: ServerConfig::from_source(&src)?,
            llm: LlmConfig::from_source(&src)?,
            tools: ToolsConfig::from_source(&src)?,
            conversation: ConversationConfig::from_source(&src)?,
            providers,
            legacy_script_path: src.opt("SERVER_SCRIPT_PATH"),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.backend == LlmBackend::Anthropic && self.llm.anthropic.api_key.is_none() {
            return Err(ConfigError::missing(
                "ANTHROPIC_API_KEY",
                "required when LLM_BACKEND=anthropic",
            ));
        }
        let aws = &self.llm.aws;
        match (&aws.access_key_id, &aws.secret_access_key) {
            (Some(_), None) => {
                return Err(ConfigError::missing(
                    "AWS_SECRET_ACCESS_KEY",
                    "AWS_ACCESS_KEY_ID is set without a secret",
                ))
            }
            (None, Some(_)) => {
                return Err(ConfigError::missing(
                    "AWS_ACCESS_KEY_ID",
                    "AWS_SECRET_ACCESS_KEY is set without a key id",
                ))
            }
            _ => {}
        }
        if self.tools.max_rounds == 0 {
            return Err(ConfigError::invalid("TOOL_MAX_ROUNDS", "0", "must be at least 1"));
        }
        if self.llm.timeout.is_zero() {
            return Err(ConfigError::invalid("MODEL_TIMEOUT_SECS", "0", "must be at least 1"));
        }
        if self.tools.timeout.is_zero() {
            return Err(ConfigError::invalid("TOOL_TIMEOUT_SECS", "0", "must be at least 1"));
        }
        Ok(())
    }

    /// Providers to launch at startup, in configuration order.
    ///
    /// Falls back to the legacy single script provider (id `default`) only
    /// when no declared provider is enabled with a launch path.
    pub fn launch_providers(&self) -> Vec<ProviderConfig> {
        let enabled: Vec<ProviderConfig> = self
            .providers
            .iter()
            .filter(|p| p.is_launchable())
            .cloned()
            .collect();
        if !enabled.is_empty() {
            return enabled;
        }
        match &self.legacy_script_path {
            Some(path) => vec![ProviderConfig {
                id: "default".to_string(),
                enabled: true,
                path: path.clone(),
                args: Vec::new(),
                env: BTreeMap::new(),
            }],
            None => Vec::new(),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:       {}:{}", self.server.host, self.server.port);
        tracing::info!("  llm:          backend={}, model={}", self.llm.backend, self.llm.model_label());
        tracing::info!(
            "  tools:        max_rounds={}, timeout={}s",
            self.tools.max_rounds,
            self.tools.timeout.as_secs()
        );
        tracing::info!(
            "  conversation: history={}, log={}",
            self.conversation.history,
            if self.conversation.log_enabled {
                self.conversation.log_dir.display().to_string()
            } else {
                "(disabled)".to_string()
            }
        );
        for p in &self.providers {
            tracing::info!(
                "  provider:     {} enabled={} path={}",
                p.id,
                p.enabled,
                if p.path.is_empty() { "(none)" } else { &p.path }
            );
        }
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "llm": {
                "backend": self.llm.backend,
                "model": self.llm.model_label(),
                "explicit_aws_credentials": self.llm.aws.access_key_id.is_some(),
            },
            "tools": {
                "max_rounds": self.tools.max_rounds,
                "timeout_secs": self.tools.timeout.as_secs(),
            },
            "conversation": {
                "history": self.conversation.history,
                "log_enabled": self.conversation.log_enabled,
            },
            "providers": self.providers.iter().map(|p| serde_json::json!({
                "id": p.id,
                "enabled": p.enabled,
                "launchable": p.is_launchable(),
            })).collect::<Vec<_>>(),
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_source(src: &Source<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            host: src.or("HOST", "0.0.0.0"),
            port: src.parsed("PORT", 8000)?,
        })
    }
}

// ── LLM (Anthropic / Bedrock) ─────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Direct hosted API with a single API key.
    Anthropic,
    /// Cloud-hosted models through AWS Bedrock.
    Bedrock,
}

impl FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "bedrock" | "aws" => Ok(Self::Bedrock),
            other => Err(format!("unknown backend '{other}' (expected anthropic or bedrock)")),
        }
    }
}

impl fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic => f.write_str("anthropic"),
            Self::Bedrock => f.write_str("bedrock"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct BedrockConfig {
    pub region: String,
    pub model_id: String,
}

/// Explicit AWS credentials and the profile for the local credential store.
#[derive(Debug, Clone, Default)]
pub struct AwsCredentialsConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub profile: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub anthropic: AnthropicConfig,
    pub bedrock: BedrockConfig,
    pub aws: AwsCredentialsConfig,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
    pub timeout: Duration,
    /// Retries after a throttled first attempt.
    pub max_retries: u32,
}

impl LlmConfig {
    fn from_source(src: &Source<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            backend: src.parsed("LLM_BACKEND", LlmBackend::Bedrock)?,
            anthropic: AnthropicConfig {
                api_key: src.opt("ANTHROPIC_API_KEY"),
                model: src.or("ANTHROPIC_MODEL", "claude-sonnet-4-5-20250929"),
                base_url: src.or("ANTHROPIC_BASE_URL", "https://api.anthropic.com"),
            },
            bedrock: BedrockConfig {
                region: src.or("AWS_REGION", "us-west-2"),
                model_id: src.or(
                    "BEDROCK_MODEL_ID",
                    "global.anthropic.claude-sonnet-4-5-20250929-v1:0",
                ),
            },
            aws: AwsCredentialsConfig {
                access_key_id: src.opt("AWS_ACCESS_KEY_ID"),
                secret_access_key: src.opt("AWS_SECRET_ACCESS_KEY"),
                session_token: src.opt("AWS_SESSION_TOKEN"),
                profile: src.opt("AWS_PROFILE"),
            },
            max_tokens: src.parsed("LLM_MAX_TOKENS", 8192)?,
            system_prompt: src.opt("LLM_SYSTEM_PROMPT"),
            timeout: Duration::from_secs(src.parsed("MODEL_TIMEOUT_SECS", 120)?),
            max_retries: src.parsed("LLM_MAX_RETRIES", 3)?,
        })
    }

    /// Model identifier of the selected backend.
    pub fn model_label(&self) -> &str {
        match self.backend {
            LlmBackend::Anthropic => &self.anthropic.model,
            LlmBackend::Bedrock => &self.bedrock.model_id,
        }
    }
}

// ── Tool dispatch ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ToolsConfig {
    /// Per-invocation timeout for provider calls.
    pub timeout: Duration,
    /// Maximum tool-dispatch rounds per query.
    pub max_rounds: usize,
}

impl ToolsConfig {
    fn from_source(src: &Source<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            timeout: Duration::from_secs(src.parsed("TOOL_TIMEOUT_SECS", 60)?),
            max_rounds: src.parsed("TOOL_MAX_ROUNDS", 10)?,
        })
    }
}

// ── Conversation ──────────────────────────────────────────────

/// Whether a session keeps its turns across queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Each query starts from an empty transcript.
    #[default]
    PerQuery,
    /// Turns accumulate for the lifetime of the process.
    Persistent,
}

impl FromStr for HistoryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "per_query" | "per-query" => Ok(Self::PerQuery),
            "persistent" => Ok(Self::Persistent),
            other => Err(format!("unknown history mode '{other}' (expected per_query or persistent)")),
        }
    }
}

impl fmt::Display for HistoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerQuery => f.write_str("per_query"),
            Self::Persistent => f.write_str("persistent"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationConfig {
    pub history: HistoryMode,
    pub log_enabled: bool,
    pub log_dir: PathBuf,
}

impl ConversationConfig {
    fn from_source(src: &Source<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            history: src.parsed("CONVERSATION_HISTORY", HistoryMode::PerQuery)?,
            log_enabled: src.flag("CONVERSATION_LOG", true)?,
            log_dir: PathBuf::from(src.or("CONVERSATION_LOG_DIR", "conversations")),
        })
    }
}

// ── MCP tool providers ────────────────────────────────────────

/// Launch configuration for one tool provider subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub id: String,
    pub enabled: bool,
    /// Script or executable path. Empty means the provider is not launched.
    pub path: String,
    pub args: Vec<String>,
    /// Extra environment variables for the child, on top of the inherited ones.
    pub env: BTreeMap<String, String>,
}

impl ProviderConfig {
    fn from_source(src: &Source<'_>, id: &str) -> Result<Self, ConfigError> {
        let prefix = format!("MCP_{}", id.to_uppercase().replace('-', "_"));
        let key = |suffix: &str| format!("{prefix}_{suffix}");

        let (enabled_default, path_default) = match id {
            "github" => (true, ""),
            "filesystem" => (false, "npx"),
            _ => (false, ""),
        };

        let mut env = BTreeMap::new();
        if let Some(raw) = src.opt(&key("ENV")) {
            for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let (k, v) = pair.split_once('=').ok_or_else(|| {
                    ConfigError::invalid(key("ENV"), pair, "expected KEY=VALUE")
                })?;
                env.insert(k.trim().to_string(), v.trim().to_string());
            }
        }

        let args = match src.list(&key("ARGS")) {
            Some(args) => args,
            None if id == "github" => github_default_args(src),
            None => Vec::new(),
        };

        if id == "github" {
            for var in ["GITHUB_PERSONAL_ACCESS_TOKEN", "GITHUB_HOST"] {
                if let Some(v) = src.opt(var) {
                    env.entry(var.to_string()).or_insert(v);
                }
            }
        }

        Ok(Self {
            id: id.to_string(),
            enabled: src.flag(&key("ENABLED"), enabled_default)?,
            path: src.or(&key("PATH"), path_default),
            args,
            env,
        })
    }

    pub fn is_launchable(&self) -> bool {
        self.enabled && !self.path.is_empty()
    }
}

/// `stdio` subcommand plus `--gh-host` for GitHub Enterprise hosts (not github.com).
fn github_default_args(src: &Source<'_>) -> Vec<String> {
    let mut args = vec!["stdio".to_string()];
    if let Some(host) = src.opt("GITHUB_HOST").filter(|h| !h.contains("github.com")) {
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{host}")
        };
        args.push("--gh-host".to_string());
        args.push(host);
    }
    args
}
