//! Structured tool outcomes and the tool-boundary error taxonomy.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::sandbox::SandboxError;

/// Failures raised inside a tool. They never cross the tool boundary:
/// the registry turns them into a failed [`ToolResult`].
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("{0}")]
    Precondition(String),

    #[error("process did not finish within {timeout_secs}s and was terminated")]
    Timeout { timeout_secs: u64 },

    #[error("{0}")]
    Process(String),
}

impl ToolError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ToolError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable classification name used as the prefix of the error string.
    pub fn classification(&self) -> &'static str {
        match self {
            ToolError::InvalidArguments(_) => "InvalidArguments",
            ToolError::Sandbox(err) if err.is_configuration() => "SandboxConfigurationError",
            ToolError::Sandbox(_) => "SandboxViolation",
            ToolError::Io { .. } => "IoError",
            ToolError::NotFound(_) => "FileNotFoundError",
            ToolError::NotADirectory(_) => "NotADirectoryError",
            ToolError::Precondition(_) => "PreconditionFailed",
            ToolError::Timeout { .. } => "TimeoutError",
            ToolError::Process(_) => "ProcessError",
        }
    }
}

/// Outcome of one tool invocation, serialized flat:
/// `{"ok": true, ...fields}` or `{"ok": false, "error": "...", ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ToolResult {
    /// Successful result. A non-object payload is stored under `result`.
    pub fn success(payload: Value) -> Self {
        Self {
            ok: true,
            error: None,
            fields: into_fields(payload),
        }
    }

    /// Result that carries a full payload but reports `ok=false`.
    pub fn unsuccessful(payload: Value) -> Self {
        Self {
            ok: false,
            error: None,
            fields: into_fields(payload),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            fields: Map::new(),
        }
    }

    pub fn from_error(err: &ToolError) -> Self {
        Self::failure(format!("{}: {}", err.classification(), err))
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({"ok": false, "error": format!("SerializationError: {e}")})
        })
    }

    /// Compact JSON used as the content of a tool message.
    pub fn to_content(&self) -> String {
        self.to_value().to_string()
    }
}

fn into_fields(payload: Value) -> Map<String, Value> {
    match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("result".to_string(), other);
            map
        }
    }
}
