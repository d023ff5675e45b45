//! Sandbox: the filesystem boundary every tool of a run is held to.
//!
//! # Modules
//!
//! - [`root`]    - `SandboxRoot` and the path validator
//! - [`context`] - `RunContext`, the per-run root binding and its lease
//! - [`error`]   - `SandboxError` / `SandboxResult`

pub mod context;
pub mod error;
pub mod root;

pub use context::{RunContext, LEASE_FILE_NAME};
pub use error::{SandboxError, SandboxResult};
pub use root::{validate, SandboxRoot};
