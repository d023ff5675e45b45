//! Tool capability set.
//!
//! Every tool shares one signature, `run(ctx, args) -> ToolResult`, and
//! resolves paths only through the run's [`RunContext`]. Failures inside a
//! tool are [`ToolError`]s; the [`ToolRegistry`] converts them into
//! structured `ok=false` results so nothing propagates to the orchestrator.
//!
//! # Modules
//!
//! - [`schema`]    - `ParameterSpec` normalization, `ToolDeclaration`
//! - [`result`]    - `ToolResult`, `ToolError`
//! - [`registry`]  - `ToolRegistry`
//! - [`read`], [`write`], [`list`] - workspace file access
//! - [`execute`]   - external PHREEQC runner
//! - [`toc`]       - table-of-contents extraction for result files
//! - [`questions`] - read-only question files

pub mod execute;
pub mod list;
pub mod questions;
pub mod read;
pub mod registry;
pub mod result;
pub mod schema;
pub mod toc;
pub mod write;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::AgentConfig;
use crate::sandbox::RunContext;

pub use execute::ExecutePhreeqcTool;
pub use list::ListFileTool;
pub use questions::ReadQuestionsTool;
pub use read::ReadFileTool;
pub use registry::ToolRegistry;
pub use result::{ToolError, ToolResult};
pub use schema::{ParameterSchema, ParameterSpec, ToolDeclaration};
pub use toc::{build_toc, parse_toc, TocEntry};
pub use write::WriteFileTool;

/// A sandboxed capability the model can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> ParameterSpec;

    async fn run(&self, ctx: &RunContext, args: &Map<String, Value>) -> Result<ToolResult, ToolError>;
}

/// Registry construction failures.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate tool registration: {tool_name}")]
    DuplicateTool { tool_name: String },

    #[error("invalid parameter schema for tool '{tool_name}': {reason}")]
    InvalidSchema { tool_name: String, reason: String },

    #[error("cannot register tool '{tool_name}': {source}")]
    Sandbox {
        tool_name: String,
        #[source]
        source: crate::sandbox::SandboxError,
    },
}

/// Decode a tool's argument object into its typed form.
pub(crate) fn parse_args<T: DeserializeOwned>(args: &Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args.clone()))
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Registry with the standard capability set for `config`.
///
/// `read_questions` is only registered when a questions directory is configured.
pub fn standard_registry(config: &AgentConfig) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register(ReadFileTool::new(config.read.clone()))?;
    registry.register(WriteFileTool)?;
    registry.register(ListFileTool)?;
    registry.register(ExecutePhreeqcTool::new(config.phreeqc.clone()))?;

    if let Some(dir) = &config.questions.dir {
        let tool = ReadQuestionsTool::new(dir).map_err(|source| RegistryError::Sandbox {
            tool_name: questions::TOOL_NAME.to_string(),
            source,
        })?;
        registry.register(tool)?;
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_without_questions() {
        let registry = standard_registry(&AgentConfig::default()).unwrap();
        assert_eq!(
            registry.names(),
            vec!["read_file", "write_file", "list_file", "execute_phreeqc"]
        );
        for decl in registry.declarations() {
            assert_eq!(decl.parameters.kind, "object");
            assert!(!decl.description.is_empty());
        }
    }

    #[test]
    fn test_standard_registry_with_questions() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AgentConfig::default();
        config.questions.dir = Some(dir.path().to_path_buf());
        let registry = standard_registry(&config).unwrap();
        assert!(registry.contains("read_questions"));
    }

    #[test]
    fn test_standard_registry_rejects_missing_questions_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AgentConfig::default();
        config.questions.dir = Some(dir.path().join("missing"));
        assert!(matches!(
            standard_registry(&config),
            Err(RegistryError::Sandbox { .. })
        ));
    }
}
