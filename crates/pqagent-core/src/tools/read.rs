//! `read_file`: bounded reads of workspace files.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{parse_args, ParameterSpec, Tool, ToolError, ToolResult};
use crate::config::ReadConfig;
use crate::sandbox::RunContext;

pub const TOOL_NAME: &str = "read_file";

/// Reads a file whole, by 1-based inclusive line range, or, when it is too
/// large, as a head/tail preview.
pub struct ReadFileTool {
    limits: ReadConfig,
}

#[derive(Debug, Deserialize)]
struct ReadArgs {
    path: String,
    #[serde(default)]
    start_line: Option<usize>,
    #[serde(default)]
    end_line: Option<usize>,
}

impl ReadFileTool {
    pub fn new(limits: ReadConfig) -> Self {
        Self { limits }
    }

    fn read_range(
        &self,
        path: &str,
        lines: &[&str],
        start: Option<usize>,
        end: Option<usize>,
    ) -> Result<ToolResult, ToolError> {
        let total = lines.len();
        let start = start.unwrap_or(1);
        let end = end.unwrap_or(total);

        if start == 0 {
            return Err(ToolError::InvalidArguments(
                "start_line is 1-based and must be at least 1".into(),
            ));
        }
        if end < start {
            return Err(ToolError::InvalidArguments(format!(
                "end_line {end} is before start_line {start}"
            )));
        }
        if start > total {
            return Err(ToolError::InvalidArguments(format!(
                "start_line {start} exceeds total_line_count {total}"
            )));
        }

        let end = end.min(total);
        Ok(ToolResult::success(json!({
            "path": path,
            "start_line": start,
            "end_line": end,
            "total_line_count": total,
            "content": lines[start - 1..end].join("\n"),
        })))
    }

    fn read_preview(&self, path: &str, lines: &[&str]) -> ToolResult {
        let total = lines.len();
        let n = self.limits.preview_lines;
        let head = &lines[..n.min(total)];
        let tail = &lines[total.saturating_sub(n)..];

        ToolResult::success(json!({
            "path": path,
            "truncated": true,
            "total_line_count": total,
            "head": head.join("\n"),
            "tail": tail.join("\n"),
            "head_line_count": head.len(),
            "tail_line_count": tail.len(),
            "hint": format!(
                "File exceeds {} characters. Use start_line/end_line to read a specific range.",
                self.limits.max_chars
            ),
        }))
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Read a file within the workspace. Pass start_line/end_line (1-based, inclusive) to read \
         a range; large files without a range return only a head and tail preview."
    }

    fn parameters(&self) -> ParameterSpec {
        ParameterSpec::Schema(json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to the file to read."},
                "start_line": {"type": "integer", "description": "First line to read (1-based, inclusive)."},
                "end_line": {"type": "integer", "description": "Last line to read (1-based, inclusive)."}
            },
            "required": ["path"]
        }))
    }

    async fn run(&self, ctx: &RunContext, args: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let args: ReadArgs = parse_args(args)?;
        let resolved = ctx.resolve(&args.path)?;

        let metadata = match tokio::fs::metadata(&resolved).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::NotFound(format!(
                    "File not found: {}",
                    resolved.display()
                )))
            }
            Err(e) => return Err(ToolError::io(&resolved, e)),
        };
        if metadata.is_dir() {
            return Err(ToolError::Precondition(format!(
                "{} is a directory; use list_file",
                resolved.display()
            )));
        }

        let bytes = tokio::fs::read(&resolved)
            .await
            .map_err(|e| ToolError::io(&resolved, e))?;
        let content = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = content.lines().collect();
        let display = resolved.display().to_string();

        if args.start_line.is_some() || args.end_line.is_some() {
            return self.read_range(&display, &lines, args.start_line, args.end_line);
        }

        if content.chars().count() <= self.limits.max_chars {
            return Ok(ToolResult::success(json!({
                "path": display,
                "content": content,
                "total_line_count": lines.len(),
            })));
        }

        Ok(self.read_preview(&display, &lines))
    }
}
