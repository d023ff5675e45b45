//! Per-run context: the sandbox root a run is bound to, plus an exclusive
//! lease that keeps two in-flight runs off the same root.
//!
//! The lease is an OS advisory lock on `.pqagent.lock`. The kernel drops it
//! when the owning process exits, so a killed or aborted run never leaves
//! the root busy. The file itself stays behind between runs.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use uuid::Uuid;

use super::error::{SandboxError, SandboxResult};
use super::root::SandboxRoot;

/// Lock file inside a sandbox root. Locked while a run holds the root.
pub const LEASE_FILE_NAME: &str = ".pqagent.lock";

/// Run-scoped context threaded through every tool invocation.
///
/// Not `Clone`: the orchestrator takes it by value, so a context can only
/// ever back a single run, and its root cannot change once the run starts.
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    sandbox: SandboxRoot,
    /// Bookkeeping files tools may read but never modify.
    protected: Vec<PathBuf>,
    _lease: SandboxLease,
}

impl RunContext {
    /// Bind a new run to `sandbox`, failing with [`SandboxError::RootBusy`]
    /// if another live context already holds the root.
    pub fn new(sandbox: SandboxRoot) -> SandboxResult<Self> {
        let run_id = Uuid::new_v4();
        let lease = SandboxLease::acquire(&sandbox, run_id)?;
        Ok(Self {
            run_id,
            protected: vec![lease.path.clone()],
            sandbox,
            _lease: lease,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn sandbox(&self) -> &SandboxRoot {
        &self.sandbox
    }

    /// Shorthand for validating a tool-supplied path against this run's root.
    pub fn resolve(&self, requested: impl AsRef<Path>) -> SandboxResult<PathBuf> {
        self.sandbox.validate(requested)
    }

    /// Like [`resolve`](Self::resolve), for tools that create or modify the
    /// target. Protected bookkeeping files are rejected.
    pub fn resolve_writable(&self, requested: impl AsRef<Path>) -> SandboxResult<PathBuf> {
        let resolved = self.resolve(requested)?;
        if self.is_protected(&resolved) {
            return Err(SandboxError::Protected { path: resolved });
        }
        Ok(resolved)
    }

    /// Mark `path` as off limits for mutating tools. Expects a canonical path.
    pub fn protect(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.protected.contains(&path) {
            self.protected.push(path);
        }
    }

    pub fn is_protected(&self, resolved: &Path) -> bool {
        self.protected.iter().any(|p| p == resolved)
    }
}

#[derive(Debug)]
struct SandboxLease {
    path: PathBuf,
    /// Holds the advisory lock until dropped.
    file: File,
}

impl SandboxLease {
    fn acquire(sandbox: &SandboxRoot, run_id: Uuid) -> SandboxResult<Self> {
        let path = sandbox.path().join(LEASE_FILE_NAME);
        let invalid = |err: io::Error| SandboxError::InvalidRoot {
            path: sandbox.path().to_path_buf(),
            reason: format!("cannot lock lease file: {err}"),
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(invalid)?;

        if let Err(err) = file.try_lock_exclusive() {
            if err.kind() == fs2::lock_contended_error().kind() {
                return Err(SandboxError::RootBusy {
                    root: sandbox.path().to_path_buf(),
                    lock: path,
                });
            }
            return Err(invalid(err));
        }

        let annotated = file
            .set_len(0)
            .and_then(|_| writeln!(file, "run_id={run_id} pid={}", std::process::id()));
        if let Err(err) = annotated {
            tracing::warn!(lock = %path.display(), error = %err, "failed to annotate lease file");
        }

        Ok(Self { path, file })
    }
}

impl Drop for SandboxLease {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!(lock = %self.path.display(), error = %err, "failed to release sandbox lease");
        }
    }
}
