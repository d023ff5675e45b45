//! `write_file`: full replacement of a workspace file.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{parse_args, ParameterSpec, Tool, ToolError, ToolResult};
use crate::sandbox::RunContext;

pub const TOOL_NAME: &str = "write_file";

/// Creates missing parent directories, then overwrites the target.
pub struct WriteFileTool;

#[derive(Debug, Deserialize)]
struct WriteArgs {
    path: String,
    #[serde(alias = "new_content")]
    content: String,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Create or overwrite a file in the workspace with the given content. Missing parent \
         directories are created. The previous content is replaced entirely."
    }

    fn parameters(&self) -> ParameterSpec {
        ParameterSpec::flat([
            ("path", "Path of the file to write, relative to the workspace root."),
            ("content", "Complete new content of the file."),
        ])
    }

    async fn run(&self, ctx: &RunContext, args: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let args: WriteArgs = parse_args(args)?;
        let resolved = ctx.resolve_writable(&args.path)?;

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::io(parent, e))?;
        }
        tokio::fs::write(&resolved, args.content.as_bytes())
            .await
            .map_err(|e| ToolError::io(&resolved, e))?;

        Ok(ToolResult::success(json!({
            "path": resolved.display().to_string(),
            "bytes_written": args.content.len(),
            "message": format!("Wrote {}", resolved.display()),
        })))
    }
}
