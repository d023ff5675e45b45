//! Top-level error taxonomy.
//!
//! Only failures that end a run early surface here. Everything that happens
//! inside a tool is reported back to the model as a `ToolResult` instead.

use std::path::PathBuf;

use crate::config::ConfigError;
use crate::retry::UpstreamError;
use crate::sandbox::SandboxError;
use crate::tools::RegistryError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("tool registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("audit log {path}: {source}")]
    Audit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl AgentError {
    /// Whether the model service, rather than local setup, ended the run.
    pub fn is_upstream(&self) -> bool {
        matches!(self, AgentError::Upstream(_))
    }
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
