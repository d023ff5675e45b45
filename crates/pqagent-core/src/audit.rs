//! Append-only JSONL journal of one run.
//!
//! One record per line, each `{"ts": ..., "action": "<kind>", ...fields}`.
//! Records are flushed as they are written so a crashed run still leaves a
//! readable trail.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::model::ToolCall;

/// Directory under the sandbox root that holds default audit logs.
pub const LOG_DIR_NAME: &str = "logs";

/// How a run ended, as recorded in `run_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Answered,
    ApiError,
    MaxStepsReached,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Answered => "answered",
            RunStatus::ApiError => "api_error",
            RunStatus::MaxStepsReached => "max_steps_reached",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl From<&ToolCall> for ToolCallRecord {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditAction {
    RunStart {
        model: String,
        max_steps: usize,
    },
    User {
        content: String,
    },
    Assistant {
        step: usize,
        content: String,
        tool_calls: Vec<ToolCallRecord>,
    },
    Tool {
        step: usize,
        tool: String,
        /// Parsed argument object, or the raw text when it could not be parsed.
        args: Value,
        result: Value,
    },
    RunEnd {
        status: RunStatus,
        step: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub action: AuditAction,
}

/// Open JSONL audit file for a single run.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    file: File,
}

impl AuditLog {
    /// `<root>/logs/chat_<YYYYmmdd_HHMMSS>_<unix-seconds>_<run-id>.jsonl`
    ///
    /// The run id keeps back-to-back runs within one second apart.
    pub fn default_path(root: &Path, run_id: Uuid) -> PathBuf {
        let now = Local::now();
        root.join(LOG_DIR_NAME).join(format!(
            "chat_{}_{}_{}.jsonl",
            now.format("%Y%m%d_%H%M%S"),
            now.timestamp(),
            run_id
        ))
    }

    pub async fn create_default(root: &Path, run_id: Uuid) -> io::Result<Self> {
        Self::at(Self::default_path(root, run_id)).await
    }

    /// Open (creating parents) an audit file at `path`, appending if it exists.
    pub async fn at(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&mut self, action: AuditAction) -> io::Result<()> {
        let event = AuditEvent {
            ts: Utc::now(),
            action,
        };
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        self.file.write_all(&line).await?;
        self.file.flush().await
    }
}

/// Parse every record of an audit file.
pub async fn read_events(path: &Path) -> io::Result<Vec<AuditEvent>> {
    let text = tokio::fs::read_to_string(path).await?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(io::Error::from))
        .collect()
}
