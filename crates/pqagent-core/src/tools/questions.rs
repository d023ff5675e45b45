//! `read_questions`: read-only access to a configured questions directory.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{parse_args, ParameterSpec, Tool, ToolError, ToolResult};
use crate::sandbox::{RunContext, SandboxResult, SandboxRoot};

pub const TOOL_NAME: &str = "read_questions";

/// Reads question files by name. The directory is its own sandbox root,
/// independent of the run's workspace.
pub struct ReadQuestionsTool {
    questions: SandboxRoot,
}

#[derive(Debug, Deserialize)]
struct QuestionArgs {
    file_name: String,
}

impl ReadQuestionsTool {
    pub fn new(dir: impl AsRef<Path>) -> SandboxResult<Self> {
        Ok(Self {
            questions: SandboxRoot::new(dir)?,
        })
    }
}

#[async_trait]
impl Tool for ReadQuestionsTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Read a question file from the questions folder (read-only)."
    }

    fn parameters(&self) -> ParameterSpec {
        ParameterSpec::flat([("file_name", "Question file name under the questions directory.")])
    }

    async fn run(&self, _ctx: &RunContext, args: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let args: QuestionArgs = parse_args(args)?;
        let target = self.questions.validate(&args.file_name)?;

        let content = match tokio::fs::read_to_string(&target).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::NotFound(format!(
                    "Question file not found: {}",
                    target.display()
                )))
            }
            Err(e) => return Err(ToolError::io(&target, e)),
        };

        Ok(ToolResult::success(json!({ "content": content })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_within_questions_dir_only() {
        let workspace = tempfile::tempdir().unwrap();
        let questions = tempfile::tempdir().unwrap();
        std::fs::write(questions.path().join("q1.txt"), "What is the SI of calcite?").unwrap();
        std::fs::write(workspace.path().join("private.txt"), "nope").unwrap();

        let ctx = RunContext::new(SandboxRoot::new(workspace.path()).unwrap()).unwrap();
        let tool = ReadQuestionsTool::new(questions.path()).unwrap();

        let args = json!({"file_name": "q1.txt"});
        let result = tool.run(&ctx, args.as_object().unwrap()).await.unwrap();
        assert_eq!(
            result.get("content"),
            Some(&json!("What is the SI of calcite?"))
        );

        let escape = format!("../{}/private.txt", workspace.path().file_name().unwrap().to_string_lossy());
        let args = json!({ "file_name": escape });
        let err = tool.run(&ctx, args.as_object().unwrap()).await.unwrap_err();
        assert_eq!(err.classification(), "SandboxViolation");

        let args = json!({"file_name": "q9.txt"});
        let err = tool.run(&ctx, args.as_object().unwrap()).await.unwrap_err();
        assert_eq!(err.classification(), "FileNotFoundError");
    }
}
