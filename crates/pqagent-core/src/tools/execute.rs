//! `execute_phreeqc`: runs the external simulator on a workspace input file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::process::Command;
use tracing::{debug, warn};

use super::toc::{build_toc, TocEntry};
use super::{parse_args, ParameterSpec, Tool, ToolError, ToolResult};
use crate::config::PhreeqcConfig;
use crate::sandbox::RunContext;

pub const TOOL_NAME: &str = "execute_phreeqc";

/// Conventional output file written next to the input.
pub const RESULT_FILE_NAME: &str = "result.out";

/// Captured stdout/stderr are cut to their last this-many characters.
pub const OUTPUT_TAIL_CHARS: usize = 4000;

const HINT: &str =
    "Use read_file with start_line/end_line to read specific sections from the TOC above.";

pub struct ExecutePhreeqcTool {
    config: PhreeqcConfig,
}

#[derive(Debug, Deserialize)]
struct ExecuteArgs {
    input_path: String,
}

impl ExecutePhreeqcTool {
    pub fn new(config: PhreeqcConfig) -> Self {
        Self { config }
    }

    /// Binary and database paths, checked before the sandbox is consulted.
    fn installation(&self) -> Result<(&Path, &Path), ToolError> {
        let binary = self
            .config
            .binary
            .as_deref()
            .ok_or_else(|| ToolError::Precondition("PHREEQC binary is not configured".into()))?;
        if !binary.is_file() {
            return Err(ToolError::Precondition(format!(
                "PHREEQC binary not found: {}",
                binary.display()
            )));
        }

        let database = self
            .config
            .database
            .as_deref()
            .ok_or_else(|| ToolError::Precondition("PHREEQC database is not configured".into()))?;
        if !database.is_file() {
            return Err(ToolError::Precondition(format!(
                "PHREEQC database not found: {}",
                database.display()
            )));
        }

        Ok((binary, database))
    }
}

#[async_trait]
impl Tool for ExecutePhreeqcTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Run PHREEQC on an input file. Returns execution status, paths to output files, and a \
         table of contents with section line numbers for result.out. Use read_file with \
         start_line/end_line to inspect specific sections."
    }

    fn parameters(&self) -> ParameterSpec {
        ParameterSpec::flat([(
            "input_path",
            "Path to the PHREEQC input file (e.g., inputs/example2.in.txt).",
        )])
    }

    async fn run(&self, ctx: &RunContext, args: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let (binary, database) = self.installation()?;
        let args: ExecuteArgs = parse_args(args)?;
        let input = ctx.resolve(&args.input_path)?;

        if !input.is_file() {
            return Err(ToolError::NotFound(format!(
                "Input file not found: {}",
                input.display()
            )));
        }
        let workdir = input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| ctx.sandbox().path().to_path_buf());
        let out_file = ctx.resolve_writable(workdir.join(RESULT_FILE_NAME))?;

        let before = list_names(&workdir).await?;

        debug!(binary = %binary.display(), input = %input.display(), "spawning phreeqc");
        let child = Command::new(binary)
            .arg(&input)
            .arg(&out_file)
            .arg(database)
            .current_dir(&workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::Process(format!("failed to start {}: {e}", binary.display())))?;

        let timeout_secs = self.config.timeout_secs;
        let output = match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(result) => result.map_err(|e| ToolError::Process(e.to_string()))?,
            Err(_) => {
                // Dropping the wait future drops the child, which kills it.
                warn!(timeout_secs, input = %input.display(), "phreeqc timed out");
                return Err(ToolError::Timeout { timeout_secs });
            }
        };

        let after = list_names(&workdir).await?;
        let output_files: Vec<String> = after
            .difference(&before)
            .map(|name| workdir.join(name))
            .filter(|path| path.is_file())
            .map(|path| workspace_relative(ctx, &path))
            .collect();

        let toc = index_result_file(&out_file).await;

        let returncode = output.status.code().unwrap_or(-1);
        let payload = json!({
            "returncode": returncode,
            "stdout": tail_chars(&String::from_utf8_lossy(&output.stdout), OUTPUT_TAIL_CHARS),
            "stderr": tail_chars(&String::from_utf8_lossy(&output.stderr), OUTPUT_TAIL_CHARS),
            "output_files": output_files,
            "result_out_toc": toc,
            "hint": HINT,
        });

        if output.status.success() {
            Ok(ToolResult::success(payload))
        } else {
            Ok(ToolResult::unsuccessful(payload))
        }
    }
}

async fn list_names(dir: &Path) -> Result<BTreeSet<String>, ToolError> {
    let mut names = BTreeSet::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ToolError::io(dir, e))?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| ToolError::io(dir, e))? {
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// TOC of `result.out`, empty when the run produced none or it cannot be read.
async fn index_result_file(path: &Path) -> Vec<TocEntry> {
    if !path.exists() {
        return Vec::new();
    }
    build_toc(path).await.unwrap_or_else(|err| {
        warn!(file = %path.display(), error = %err, "could not index result file");
        Vec::new()
    })
}

fn workspace_relative(ctx: &RunContext, path: &Path) -> String {
    ctx.sandbox()
        .relative_path(path)
        .unwrap_or_else(|| PathBuf::from(path))
        .display()
        .to_string()
}

fn tail_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    text.chars().skip(count - max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxRoot;

    fn ctx() -> (tempfile::TempDir, RunContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new(SandboxRoot::new(dir.path()).unwrap()).unwrap();
        (dir, ctx)
    }

    #[tokio::test]
    async fn test_unconfigured_binary_fails_before_sandbox() {
        let (_dir, ctx) = ctx();
        let tool = ExecutePhreeqcTool::new(PhreeqcConfig::default());
        // Escaping path: precondition must still win.
        let args = json!({"input_path": "../../etc/passwd"});
        let err = tool.run(&ctx, args.as_object().unwrap()).await.unwrap_err();
        assert_eq!(err.classification(), "PreconditionFailed");
        assert!(err.to_string().contains("binary"));
    }

    #[tokio::test]
    async fn test_missing_database_reported() {
        let (dir, ctx) = ctx();
        let bin = dir.path().join("phreeqc");
        std::fs::write(&bin, "").unwrap();
        let tool = ExecutePhreeqcTool::new(PhreeqcConfig {
            binary: Some(bin),
            database: Some(dir.path().join("missing.dat")),
            timeout_secs: 5,
        });
        let args = json!({"input_path": "in.txt"});
        let err = tool.run(&ctx, args.as_object().unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("database not found"));
    }

    #[tokio::test]
    async fn test_unreadable_result_file_gives_empty_toc() {
        let dir = tempfile::tempdir().unwrap();
        assert!(index_result_file(&dir.path().join(RESULT_FILE_NAME)).await.is_empty());

        // A directory where the result file should be cannot be read as text.
        let blocked = dir.path().join("blocked");
        std::fs::create_dir_all(blocked.join(RESULT_FILE_NAME)).unwrap();
        assert!(index_result_file(&blocked.join(RESULT_FILE_NAME)).await.is_empty());

        std::fs::write(dir.path().join(RESULT_FILE_NAME), "---Saturation indices---\n").unwrap();
        let toc = index_result_file(&dir.path().join(RESULT_FILE_NAME)).await;
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].section, "Saturation indices");
    }

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("ab", 3), "ab");
        assert_eq!(tail_chars("ééé", 2), "éé");
    }
}
