//! `list_file`: directory listings inside the workspace.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{parse_args, ParameterSpec, Tool, ToolError, ToolResult};
use crate::sandbox::{RunContext, LEASE_FILE_NAME};

pub const TOOL_NAME: &str = "list_file";

pub struct ListFileTool;

#[derive(Debug, Deserialize)]
struct ListArgs {
    #[serde(default = "current_dir")]
    path: String,
}

fn current_dir() -> String {
    ".".to_string()
}

#[async_trait]
impl Tool for ListFileTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "List the entry names of a directory in the workspace. Use \".\" for the workspace root."
    }

    fn parameters(&self) -> ParameterSpec {
        ParameterSpec::flat([("path", "Directory to list, relative to the workspace root.")])
    }

    async fn run(&self, ctx: &RunContext, args: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let args: ListArgs = parse_args(args)?;
        let resolved = ctx.resolve(&args.path)?;

        match tokio::fs::metadata(&resolved).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(ToolError::NotADirectory(resolved)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::NotFound(format!(
                    "Directory not found: {}",
                    resolved.display()
                )))
            }
            Err(e) => return Err(ToolError::io(&resolved, e)),
        }

        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&resolved)
            .await
            .map_err(|e| ToolError::io(&resolved, e))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| ToolError::io(&resolved, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name != LEASE_FILE_NAME {
                entries.push(name);
            }
        }
        entries.sort();

        Ok(ToolResult::success(json!({
            "path": resolved.display().to_string(),
            "items": entries,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxRoot;

    #[tokio::test]
    async fn test_lists_sorted_names_without_lease() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new(SandboxRoot::new(dir.path()).unwrap()).unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let args = json!({"path": "."});
        let result = ListFileTool.run(&ctx, args.as_object().unwrap()).await.unwrap();
        assert_eq!(result.get("items"), Some(&json!(["a.txt", "b.txt", "sub"])));
    }

    #[tokio::test]
    async fn test_file_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new(SandboxRoot::new(dir.path()).unwrap()).unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();

        let args = json!({"path": "a.txt"});
        let err = ListFileTool
            .run(&ctx, args.as_object().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.classification(), "NotADirectoryError");

        let args = json!({"path": "missing"});
        let err = ListFileTool
            .run(&ctx, args.as_object().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.classification(), "FileNotFoundError");
    }
}
