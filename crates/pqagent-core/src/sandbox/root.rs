//! Sandbox root and path validation.
//!
//! [`SandboxRoot::validate`] is the single containment check shared by every
//! filesystem-touching tool. A requested path is joined onto the root,
//! normalized, and canonicalized through its longest existing ancestor, so
//! symlinks in the existing part of the path are resolved before the
//! containment check while not-yet-created files (write targets) can still be
//! validated.

use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::error::{SandboxError, SandboxResult};

/// A canonical, existing directory that bounds every tool invocation of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRoot {
    root: PathBuf,
}

impl SandboxRoot {
    /// Canonicalize `path` and use it as a sandbox root.
    ///
    /// An empty path is treated as "not configured"; a missing path or a
    /// non-directory is an invalid root.
    pub fn new(path: impl AsRef<Path>) -> SandboxResult<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(SandboxError::RootNotConfigured);
        }

        let root = std::fs::canonicalize(path).map_err(|e| SandboxError::InvalidRoot {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if !root.is_dir() {
            return Err(SandboxError::InvalidRoot {
                path: path.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        Ok(Self { root })
    }

    /// The canonical root directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve `requested` against the root and require that the result stays inside it.
    pub fn validate(&self, requested: impl AsRef<Path>) -> SandboxResult<PathBuf> {
        let requested = requested.as_ref();
        let joined = self.root.join(requested);

        let normalized = normalize_lexically(&joined).ok_or_else(|| SandboxError::Violation {
            path: joined.clone(),
            root: self.root.clone(),
        })?;
        if !normalized.starts_with(&self.root) {
            return Err(SandboxError::Violation {
                path: normalized,
                root: self.root.clone(),
            });
        }

        let resolved = canonicalize_existing_prefix(&normalized)?;
        if !resolved.starts_with(&self.root) {
            return Err(SandboxError::Violation {
                path: resolved,
                root: self.root.clone(),
            });
        }

        Ok(resolved)
    }

    /// Path of `absolute` relative to the root, if it lies inside it.
    pub fn relative_path(&self, absolute: &Path) -> Option<PathBuf> {
        absolute.strip_prefix(&self.root).ok().map(Path::to_path_buf)
    }
}

/// Contract form of the validator: a missing root is a configuration error.
pub fn validate(root: Option<&SandboxRoot>, requested: impl AsRef<Path>) -> SandboxResult<PathBuf> {
    root.ok_or(SandboxError::RootNotConfigured)?
        .validate(requested)
}

/// Collapse `.` and `..` without touching the filesystem.
///
/// Returns `None` when `..` would climb above the filesystem root.
fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Some(out)
}

/// Canonicalize the longest existing ancestor of `path` and re-append the
/// components that do not exist yet.
///
/// `path` must already be lexically normalized, so every trailing component
/// is a plain name.
fn canonicalize_existing_prefix(path: &Path) -> SandboxResult<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut missing: Vec<OsString> = Vec::new();

    loop {
        match std::fs::canonicalize(&existing) {
            Ok(mut resolved) => {
                for part in missing.iter().rev() {
                    resolved.push(part);
                }
                return Ok(resolved);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // A dangling symlink would be followed on write.
                if std::fs::symlink_metadata(&existing).is_ok() {
                    return Err(SandboxError::Unresolvable {
                        path: existing,
                        reason: "dangling symbolic link".to_string(),
                    });
                }
                match existing.file_name() {
                    Some(name) => {
                        missing.push(name.to_os_string());
                        existing.pop();
                    }
                    None => {
                        return Err(SandboxError::Unresolvable {
                            path: path.to_path_buf(),
                            reason: err.to_string(),
                        })
                    }
                }
            }
            Err(err) => {
                return Err(SandboxError::Unresolvable {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                })
            }
        }
    }
}
