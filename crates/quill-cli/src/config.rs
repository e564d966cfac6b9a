//! Configuration for the quill CLI, loaded from `quill.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Quill configuration. Every field has a default, so the file is optional
/// and CLI flags override individual values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// GitHub-specific settings.
    #[serde(default)]
    pub github: GitHubConfig,

    /// Decision engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Run settings.
    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    /// Load config from a TOML file; a missing file yields the defaults.
    ///
    /// # Errors
    /// Returns error if the file exists but can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }
}

/// GitHub-specific settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Custom API URL for GitHub Enterprise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// Decision engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine command as program plus arguments, e.g.
    /// `["python3", "engine.py"]`.
    #[serde(default)]
    pub command: Option<Vec<String>>,

    /// Per-decision timeout in seconds.
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_secs: default_engine_timeout(),
        }
    }
}

const fn default_engine_timeout() -> u64 {
    120
}

/// Run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum number of executed decisions per run.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Commit author name.
    #[serde(default = "default_author_name")]
    pub author_name: String,

    /// Commit author email.
    #[serde(default = "default_author_email")]
    pub author_email: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            author_name: default_author_name(),
            author_email: default_author_email(),
        }
    }
}

const fn default_max_iterations() -> u32 {
    quill_core::DEFAULT_MAX_ITERATIONS
}

fn default_author_name() -> String {
    "quill-bot".into()
}

fn default_author_email() -> String {
    "quill-bot@users.noreply.github.com".into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("quill.toml")).unwrap();

        assert!(config.engine.command.is_none());
        assert_eq!(config.engine.timeout_secs, 120);
        assert_eq!(
            config.run.max_iterations,
            quill_core::DEFAULT_MAX_ITERATIONS
        );
        assert_eq!(config.run.author_name, "quill-bot");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.toml");
        std::fs::write(
            &path,
            r#"
[engine]
command = ["python3", "engine.py"]

[run]
max_iterations = 8
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.engine.command,
            Some(vec!["python3".to_string(), "engine.py".to_string()])
        );
        assert_eq!(config.engine.timeout_secs, 120);
        assert_eq!(config.run.max_iterations, 8);
        assert_eq!(config.run.author_email, "quill-bot@users.noreply.github.com");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.toml");
        std::fs::write(&path, "not = [valid").unwrap();

        assert!(Config::load(&path).is_err());
    }
}
