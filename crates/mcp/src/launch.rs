//! Turning a provider's configured path into a runnable command.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chatbot_core::ProviderConfig;

use crate::error::McpError;

/// Everything needed to spawn one provider subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Added to the inherited environment
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Resolve a provider's path by file type:
    ///
    /// - `.py` next to a `pyproject.toml` or `uv.lock`: `uv run <file>` from that directory
    /// - `.py`: `python <path>`
    /// - `.js`: `node <path>`
    /// - anything else runs directly
    ///
    /// Configured args follow the script in every case.
    pub fn resolve(config: &ProviderConfig) -> Result<Self, McpError> {
        let path = config.path.trim();
        if path.is_empty() {
            return Err(McpError::InvalidLaunch(format!(
                "provider '{}' has no path",
                config.id
            )));
        }

        let script = Path::new(path);
        let extension = script.extension().and_then(|e| e.to_str());
        let mut spec = match extension {
            Some("py") => {
                let dir = script
                    .parent()
                    .filter(|d| !d.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                if dir.join("pyproject.toml").exists() || dir.join("uv.lock").exists() {
                    let file_name = script
                        .file_name()
                        .map(|f| f.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.to_string());
                    let mut spec = LaunchSpec::new("uv").with_args(["run".to_string(), file_name]);
                    spec.env.insert(
                        "UV_PROJECT_ENVIRONMENT".to_string(),
                        dir.join(".venv").to_string_lossy().into_owned(),
                    );
                    spec.cwd = Some(dir.to_path_buf());
                    spec
                } else {
                    LaunchSpec::new("python").with_args([path])
                }
            }
            Some("js") => LaunchSpec::new("node").with_args([path]),
            _ => LaunchSpec::new(path),
        };

        spec.args.extend(config.args.iter().cloned());
        for (k, v) in &config.env {
            spec.env.insert(k.clone(), v.clone());
        }
        Ok(spec)
    }

    /// `program arg1 arg2` for logs. Environment values are never included.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn provider(path: &str, args: &[&str]) -> ProviderConfig {
        ProviderConfig {
            id: "test".to_string(),
            enabled: true,
            path: path.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: BTreeMap::new(),
        }
    }

    #[test]
    fn test_uv_project() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pyproject.toml"), "[project]\nname = \"srv\"\n").unwrap();
        let script = dir.path().join("server.py");
        fs::write(&script, "print('hi')").unwrap();

        let spec = LaunchSpec::resolve(&provider(script.to_str().unwrap(), &[])).unwrap();
        assert_eq!(spec.program, "uv");
        assert_eq!(spec.args, vec!["run", "server.py"]);
        assert_eq!(spec.cwd.as_deref(), Some(dir.path()));
        assert_eq!(
            spec.env.get("UV_PROJECT_ENVIRONMENT").map(String::as_str),
            Some(dir.path().join(".venv").to_str().unwrap())
        );
    }

    #[test]
    fn test_uv_lock_also_selects_uv() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("uv.lock"), "").unwrap();
        let script = dir.path().join("main.py");

        let spec = LaunchSpec::resolve(&provider(script.to_str().unwrap(), &[])).unwrap();
        assert_eq!(spec.program, "uv");
    }

    #[test]
    fn test_plain_python_and_node() {
        let dir = tempfile::tempdir().unwrap();
        let py = dir.path().join("server.py");
        let spec = LaunchSpec::resolve(&provider(py.to_str().unwrap(), &["--verbose"])).unwrap();
        assert_eq!(spec.program, "python");
        assert_eq!(spec.args, vec![py.to_str().unwrap(), "--verbose"]);
        assert!(spec.cwd.is_none());

        let spec = LaunchSpec::resolve(&provider("/opt/mcp/index.js", &[])).unwrap();
        assert_eq!(spec.program, "node");
        assert_eq!(spec.args, vec!["/opt/mcp/index.js"]);
    }

    #[test]
    fn test_executable_runs_directly_with_args() {
        let mut config = provider("npx", &["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]);
        config.env.insert("LOG_LEVEL".to_string(), "debug".to_string());

        let spec = LaunchSpec::resolve(&config).unwrap();
        assert_eq!(spec.program, "npx");
        assert_eq!(
            spec.display(),
            "npx -y @modelcontextprotocol/server-filesystem /tmp"
        );
        assert_eq!(spec.env.get("LOG_LEVEL").map(String::as_str), Some("debug"));
    }

    #[test]
    fn test_empty_path_rejected() {
        let err = LaunchSpec::resolve(&provider("  ", &[])).unwrap_err();
        assert!(matches!(err, McpError::InvalidLaunch(_)));
    }
}
