//! Run configuration.
//!
//! Loaded once from an optional TOML file, then overridden by environment
//! variables. Configuration is read-only after loading and may be shared by
//! concurrent runs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const ENV_MODEL: &str = "OPENAI_MODEL";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_PHREEQC_BIN: &str = "PHREEQC_BIN";
pub const ENV_PHREEQC_DATABASE: &str = "PHREEQC_DATABASE";

pub const DEFAULT_MODEL: &str = "gpt-5.2";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a geochemistry assistant working inside a \
sandboxed workspace. Use the tools one at a time: list_file and read_file to inspect files, \
write_file to create or overwrite PHREEQC input files, and execute_phreeqc to run them. \
All paths are relative to the workspace root. Large outputs come with a table of contents; \
read only the sections you need with start_line/end_line. When you have the final answer, \
reply without calling a tool.";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("API key environment variable {var} is not set")]
    MissingApiKey { var: String },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub model: ModelConfig,
    pub agent: LoopConfig,
    pub retry: RetryConfig,
    pub phreeqc: PhreeqcConfig,
    pub read: ReadConfig,
    pub questions: QuestionsConfig,
}

/// Model-service connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Send `parallel_tool_calls=false` with every request.
    pub parallel_tool_calls_flag: bool,
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            parallel_tool_calls_flag: true,
            request_timeout_secs: 120,
        }
    }
}

/// Orchestrator loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub max_steps: usize,
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 24,
            system_prompt_path: None,
        }
    }
}

/// Upstream retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per model call, including the first.
    pub max_attempts: u32,
    /// Delay before retry `n` is `backoff_base_secs ^ n` seconds.
    pub backoff_base_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_secs: 2.0,
        }
    }
}

/// External PHREEQC binary and reference database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhreeqcConfig {
    pub binary: Option<PathBuf>,
    pub database: Option<PathBuf>,
    /// Wall-clock limit for one run; the child is killed on expiry.
    pub timeout_secs: u64,
}

impl Default for PhreeqcConfig {
    fn default() -> Self {
        Self {
            binary: None,
            database: None,
            timeout_secs: 300,
        }
    }
}

/// Bounds on how much file text `read_file` hands back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    /// Files longer than this many characters are previewed, not returned whole.
    pub max_chars: usize,
    /// Lines in each of the head and tail previews.
    pub preview_lines: usize,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            max_chars: 20_000,
            preview_lines: 40,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionsConfig {
    pub dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Load from `path` (if any), apply environment overrides, validate.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override fields from environment lookups. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = get(ENV_MODEL) {
            self.model.name = model;
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.model.base_url = url;
        }
        if let Some(bin) = get(ENV_PHREEQC_BIN) {
            self.phreeqc.binary = Some(PathBuf::from(bin));
        }
        if let Some(db) = get(ENV_PHREEQC_DATABASE) {
            self.phreeqc.database = Some(PathBuf::from(db));
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.model.name.trim().is_empty() {
            return Err(ConfigError::Invalid("model.name must not be empty".into()));
        }
        if self.agent.max_steps == 0 {
            return Err(ConfigError::Invalid("agent.max_steps must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if !(self.retry.backoff_base_secs.is_finite() && self.retry.backoff_base_secs >= 0.0) {
            return Err(ConfigError::Invalid(
                "retry.backoff_base_secs must be a non-negative number".into(),
            ));
        }
        if self.read.max_chars == 0 || self.read.preview_lines == 0 {
            return Err(ConfigError::Invalid(
                "read.max_chars and read.preview_lines must be positive".into(),
            ));
        }
        if self.phreeqc.timeout_secs == 0 {
            return Err(ConfigError::Invalid("phreeqc.timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// System prompt text: the configured file, or the built-in default.
    pub fn system_prompt(&self) -> ConfigResult<String> {
        match &self.agent.system_prompt_path {
            Some(path) => std::fs::read_to_string(path)
                .map(|s| s.trim().to_string())
                .map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                }),
            None => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    pub fn api_key(&self) -> ConfigResult<String> {
        std::env::var(&self.model.api_key_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey {
                var: self.model.api_key_env.clone(),
            })
    }
}
