//! PQAgent Core Library
//!
//! A sandboxed, single-tool-per-round agent loop for PHREEQC workspaces.
//!
//! # Modules
//!
//! - [`agent`]     - the orchestration loop (`Agent::run`)
//! - [`sandbox`]   - sandbox root, path validation, run context and lease
//! - [`tools`]     - tool trait, registry and the standard capability set
//! - [`model`]     - conversation types, `ModelClient`, OpenAI-compatible client
//! - [`retry`]     - classified retry with exponential backoff
//! - [`audit`]     - JSONL audit journal
//! - [`config`]    - TOML + environment configuration
//! - [`obs`], [`telemetry`] - structured tracing

pub mod agent;
pub mod audit;
pub mod config;
pub mod error;
pub mod model;
pub mod obs;
pub mod retry;
pub mod sandbox;
pub mod telemetry;
pub mod tools;

pub use agent::{Agent, AgentSettings, RunOutcome, RunRequest, BUDGET_EXHAUSTED_MESSAGE};
pub use audit::{AuditAction, AuditEvent, AuditLog, RunStatus, ToolCallRecord};
pub use config::{AgentConfig, ConfigError};
pub use error::{AgentError, Result};
pub use model::{
    AssistantReply, Message, ModelClient, ModelRequest, OpenAiClient, ProviderError,
    ProviderErrorKind, Role, ToolCall, ToolChoice,
};
pub use retry::{RetryPolicy, UpstreamError};
pub use sandbox::{RunContext, SandboxError, SandboxRoot};
pub use tools::{
    standard_registry, RegistryError, Tool, ToolDeclaration, ToolError, ToolRegistry, ToolResult,
};
