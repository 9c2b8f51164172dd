//! Configuration management for codequill.
//!
//! Configuration lives in a `codequill.yaml` file discovered by walking up
//! from the working directory. Every field has a default, so a missing file
//! simply yields the default configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Name of the configuration file searched for on disk.
pub const CONFIG_FILENAME: &str = "codequill.yaml";

/// Maximum number of parent directories to walk when searching for a config file.
const MAX_SEARCH_DEPTH: usize = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML in config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Agent configuration.
///
/// All limits are read-only for the duration of a run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default LLM model identifier.
    pub default_model: String,

    /// Models the user may select.
    pub allowed_models: Vec<String>,

    /// Maximum files a single patch may touch.
    pub max_files_touched_per_run: usize,

    /// Maximum agent loop iterations per run.
    pub max_iterations: usize,

    /// Maximum tool dispatches per run or chat session.
    pub max_tool_calls_per_session: usize,

    /// Default result cap for the search tool.
    pub max_search_results: usize,

    /// Gateway request timeout in seconds.
    pub api_timeout_secs: u64,

    /// Default timeout for the run tool in seconds.
    pub default_command_timeout_secs: u64,

    /// Retry attempts for the optional retry policy layer.
    pub api_retry_attempts: u32,

    /// Backoff multiplier for the retry policy layer.
    pub api_retry_backoff: f64,

    /// Reject shell commands matching the dangerous-pattern list.
    pub block_dangerous_commands: bool,

    /// Directory for audit log files.
    pub log_dir: PathBuf,

    /// Directory for saved chat conversations.
    pub conversation_dir: PathBuf,

    /// Snapshot the repo before destructive tools in chat.
    pub auto_snapshot: bool,

    /// Path the config was loaded from, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_model: "o1".to_string(),
            allowed_models: vec![
                "gpt-4.1".to_string(),
                "o1".to_string(),
                "o3-mini".to_string(),
            ],
            max_files_touched_per_run: 5,
            max_iterations: 20,
            max_tool_calls_per_session: 50,
            max_search_results: 50,
            api_timeout_secs: 120,
            default_command_timeout_secs: 60,
            api_retry_attempts: 3,
            api_retry_backoff: 2.0,
            block_dangerous_commands: true,
            log_dir: PathBuf::from("./logs"),
            conversation_dir: PathBuf::from("./conversations"),
            auto_snapshot: true,
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, or search for one.
    ///
    /// A missing file is not an error; defaults are returned.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit_path {
            Some(p) => Some(p.to_path_buf()),
            None => find_config_file(Path::new(".")),
        };

        let Some(path) = path else {
            tracing::debug!("No {} found, using defaults", CONFIG_FILENAME);
            return Ok(Self::default());
        };

        let contents = std::fs::read_to_string(&path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.config_path = Some(path.clone());
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Validate limits and return human-readable errors.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_files_touched_per_run < 1 {
            errors.push("max_files_touched_per_run must be >= 1".to_string());
        }
        if self.max_iterations < 1 {
            errors.push("max_iterations must be >= 1".to_string());
        }
        if self.max_tool_calls_per_session < 1 {
            errors.push("max_tool_calls_per_session must be >= 1".to_string());
        }
        if self.api_timeout_secs < 10 {
            errors.push("api_timeout_secs must be >= 10 seconds".to_string());
        }
        if self.api_retry_backoff < 1.0 {
            errors.push("api_retry_backoff must be >= 1.0".to_string());
        }
        if self.allowed_models.is_empty() {
            errors.push("allowed_models cannot be empty".to_string());
        }

        errors
    }
}

/// Search for the config file starting at `start` and walking up.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start
        .canonicalize()
        .unwrap_or_else(|_| start.to_path_buf());

    for _ in 0..MAX_SEARCH_DEPTH {
        let candidate = current.join(CONFIG_FILENAME);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.max_iterations, 20);
        assert_eq!(config.max_tool_calls_per_session, 50);
        assert_eq!(config.default_model, "o1");
    }

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let config: Config = serde_yaml::from_str("max_iterations: 7\n").unwrap();
        assert_eq!(config.max_iterations, 7);
        assert_eq!(config.max_tool_calls_per_session, 50);
        assert_eq!(config.default_model, "o1");
    }

    #[test]
    fn validation_flags_bad_limits() {
        let mut config = Config::default();
        config.max_iterations = 0;
        config.api_timeout_secs = 5;
        config.allowed_models.clear();

        let errors = config.validate();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("max_iterations")));
        assert!(errors.iter().any(|e| e.contains("api_timeout_secs")));
        assert!(errors.iter().any(|e| e.contains("allowed_models")));
    }

    #[test]
    fn find_config_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "max_iterations: 3\n").unwrap();

        let found = find_config_file(&nested).expect("config not found");
        assert!(found.ends_with(CONFIG_FILENAME));
    }
}
