//! Error types for the sandbox module.

use std::path::PathBuf;

/// Errors produced by the sandbox layer.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("sandbox root is not configured")]
    RootNotConfigured,

    #[error("invalid sandbox root {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    #[error("disallowed path: {path} resolves outside {root}")]
    Violation { path: PathBuf, root: PathBuf },

    #[error("disallowed path: {path} could not be resolved ({reason})")]
    Unresolvable { path: PathBuf, reason: String },

    #[error("disallowed path: {path} is run bookkeeping and cannot be modified")]
    Protected { path: PathBuf },

    #[error("sandbox root {root} is already leased by another run (lock file {lock})")]
    RootBusy { root: PathBuf, lock: PathBuf },
}

impl SandboxError {
    /// Configuration-level failures that must abort a run instead of being
    /// reported back to the model as a per-call violation.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SandboxError::RootNotConfigured
                | SandboxError::InvalidRoot { .. }
                | SandboxError::RootBusy { .. }
        )
    }
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_display_names_both_paths() {
        let err = SandboxError::Violation {
            path: PathBuf::from("/tmp/secrets.txt"),
            root: PathBuf::from("/tmp/ws"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/secrets.txt"));
        assert!(msg.contains("/tmp/ws"));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_configuration_errors() {
        assert!(SandboxError::RootNotConfigured.is_configuration());
        assert!(SandboxError::InvalidRoot {
            path: PathBuf::from("x"),
            reason: "missing".into()
        }
        .is_configuration());
        assert!(!SandboxError::Unresolvable {
            path: PathBuf::from("x"),
            reason: "loop".into()
        }
        .is_configuration());
    }
}
