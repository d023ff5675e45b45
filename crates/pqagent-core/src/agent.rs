//! The orchestration loop.
//!
//! One run alternates between asking the model for its next move and
//! executing at most one tool. It ends when the model answers without a tool
//! call, when the step budget runs out, or when the model service fails for
//! good. Only the last case is an error.
//!
//! ```text
//!   AwaitingModel ──reply with tool call──▶ Dispatching ──result appended──┐
//!        ▲  │                                                             │
//!        │  └──reply without tool call / budget spent──▶ Terminated       │
//!        └────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{warn, Instrument};

use crate::audit::{AuditAction, AuditLog, RunStatus, ToolCallRecord};
use crate::config::{AgentConfig, ConfigResult};
use crate::error::{AgentError, Result};
use crate::model::{
    AssistantReply, Message, ModelClient, ModelRequest, Role, ToolCall, ToolChoice,
};
use crate::obs;
use crate::retry::{RetryPolicy, UpstreamError};
use crate::sandbox::RunContext;
use crate::tools::{ToolDeclaration, ToolRegistry, ToolResult};

/// Final answer returned when the step budget runs out.
pub const BUDGET_EXHAUSTED_MESSAGE: &str =
    "Reached max_steps without a final answer. Try rephrasing or increasing max_steps.";

/// Static settings shared by every run of one [`Agent`].
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub system_prompt: String,
    pub retry: RetryPolicy,
    /// Send `parallel_tool_calls=false` to the model service.
    pub parallel_tool_calls_flag: bool,
}

impl AgentSettings {
    pub fn from_config(config: &AgentConfig) -> ConfigResult<Self> {
        Ok(Self {
            model: config.model.name.clone(),
            system_prompt: config.system_prompt()?,
            retry: RetryPolicy::from(&config.retry),
            parallel_tool_calls_flag: config.model.parallel_tool_calls_flag,
        })
    }
}

/// Input of one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Initial conversation; a system message is prepended when missing.
    pub messages: Vec<Message>,
    pub max_steps: usize,
    /// Audit file location; defaults to `<root>/logs/chat_*.jsonl`.
    pub log_path: Option<PathBuf>,
}

impl RunRequest {
    pub fn new(messages: Vec<Message>, max_steps: usize) -> Self {
        Self {
            messages,
            max_steps,
            log_path: None,
        }
    }

    /// Single user prompt.
    pub fn prompt(text: impl Into<String>, max_steps: usize) -> Self {
        Self::new(vec![Message::user(text)], max_steps)
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }
}

/// Result of a run that did not fail upstream.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Final assistant text, or [`BUDGET_EXHAUSTED_MESSAGE`].
    pub answer: String,
    /// Full conversation, system message first.
    pub messages: Vec<Message>,
    pub status: RunStatus,
    /// Rounds performed.
    pub steps: usize,
    pub log_path: PathBuf,
}

enum LoopState {
    AwaitingModel {
        step: usize,
    },
    Dispatching {
        step: usize,
        call: ToolCall,
    },
    Terminated {
        status: RunStatus,
        step: usize,
        answer: String,
    },
}

/// Orchestrator with an injected model client and tool registry.
pub struct Agent {
    model: Arc<dyn ModelClient>,
    tools: ToolRegistry,
    settings: AgentSettings,
}

impl Agent {
    pub fn new(model: Arc<dyn ModelClient>, tools: ToolRegistry, settings: AgentSettings) -> Self {
        Self {
            model,
            tools,
            settings,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Drive one run to completion.
    ///
    /// Takes the context by value: the sandbox lease is held for exactly the
    /// duration of this run. Upstream failures are returned as
    /// [`AgentError::Upstream`] after a `run_end{status: "api_error"}` record
    /// has been written.
    pub async fn run(&self, ctx: RunContext, request: RunRequest) -> Result<RunOutcome> {
        let span = obs::run_span(&ctx.run_id().to_string());
        self.drive(ctx, request).instrument(span).await
    }

    async fn drive(&self, mut ctx: RunContext, request: RunRequest) -> Result<RunOutcome> {
        let started = Instant::now();
        let run_id = ctx.run_id().to_string();
        let max_steps = request.max_steps;

        let log_path = request
            .log_path
            .unwrap_or_else(|| AuditLog::default_path(ctx.sandbox().path(), ctx.run_id()));
        let mut audit = AuditLog::at(&log_path)
            .await
            .map_err(|source| AgentError::Audit {
                path: log_path.clone(),
                source,
            })?;
        // The journal may live inside the root; tools must not rewrite it.
        match tokio::fs::canonicalize(audit.path()).await {
            Ok(canonical) => ctx.protect(canonical),
            Err(err) => warn!(log = %log_path.display(), error = %err, "cannot protect audit log"),
        }

        let mut messages = request.messages;
        if messages.first().map(|m| m.role) != Some(Role::System) {
            messages.insert(0, Message::system(self.settings.system_prompt.clone()));
        }
        let declarations = self.tools.declarations();

        obs::emit_run_started(
            &run_id,
            &self.settings.model,
            max_steps,
            &ctx.sandbox().path().display().to_string(),
        );
        record(
            &mut audit,
            AuditAction::RunStart {
                model: self.settings.model.clone(),
                max_steps,
            },
        )
        .await?;
        if let Some(latest) = messages.iter().rev().find(|m| m.role == Role::User) {
            record(
                &mut audit,
                AuditAction::User {
                    content: latest.content.clone(),
                },
            )
            .await?;
        }

        let mut state = LoopState::AwaitingModel { step: 1 };
        loop {
            state = match state {
                LoopState::AwaitingModel { step } if step > max_steps => LoopState::Terminated {
                    status: RunStatus::MaxStepsReached,
                    step: max_steps,
                    answer: BUDGET_EXHAUSTED_MESSAGE.to_string(),
                },

                LoopState::AwaitingModel { step } => {
                    let reply = match self.query(&messages, &declarations).await {
                        Ok(reply) => reply,
                        Err(err) => {
                            let end = AuditAction::RunEnd {
                                status: RunStatus::ApiError,
                                step,
                            };
                            if let Err(audit_err) = record(&mut audit, end).await {
                                warn!(error = %audit_err, "could not record api_error run_end");
                            }
                            obs::emit_run_finished(
                                &run_id,
                                RunStatus::ApiError.as_str(),
                                step,
                                elapsed_ms(started),
                            );
                            return Err(err.into());
                        }
                    };

                    let (content, call) = self.keep_first_call(&run_id, step, reply);
                    obs::emit_round(&run_id, step, call.as_ref().map(|c| c.name.as_str()));

                    messages.push(Message::assistant(content.clone(), call.clone()));
                    record(
                        &mut audit,
                        AuditAction::Assistant {
                            step,
                            content: content.clone(),
                            tool_calls: call.iter().map(ToolCallRecord::from).collect(),
                        },
                    )
                    .await?;

                    match call {
                        Some(call) => LoopState::Dispatching { step, call },
                        None => LoopState::Terminated {
                            status: RunStatus::Answered,
                            step,
                            answer: content,
                        },
                    }
                }

                LoopState::Dispatching { step, call } => {
                    let (args, result) = self.dispatch(&ctx, &run_id, step, &call).await;
                    messages.push(Message::tool(call.id.clone(), result.to_content()));
                    record(
                        &mut audit,
                        AuditAction::Tool {
                            step,
                            tool: call.name.clone(),
                            args,
                            result: result.to_value(),
                        },
                    )
                    .await?;
                    LoopState::AwaitingModel { step: step + 1 }
                }

                LoopState::Terminated {
                    status,
                    step,
                    answer,
                } => {
                    record(&mut audit, AuditAction::RunEnd { status, step }).await?;
                    obs::emit_run_finished(&run_id, status.as_str(), step, elapsed_ms(started));
                    return Ok(RunOutcome {
                        answer,
                        messages,
                        status,
                        steps: step,
                        log_path,
                    });
                }
            };
        }
    }

    async fn query(
        &self,
        messages: &[Message],
        declarations: &[ToolDeclaration],
    ) -> std::result::Result<AssistantReply, UpstreamError> {
        let request = ModelRequest {
            model: &self.settings.model,
            messages,
            tools: declarations,
            tool_choice: ToolChoice::Auto,
            parallel_tool_calls: self.settings.parallel_tool_calls_flag.then_some(false),
        };
        self.settings
            .retry
            .call(|| self.model.complete(&request))
            .await
    }

    /// Keep the first proposed call; the rest are never executed, audited
    /// or shown back to the model.
    fn keep_first_call(
        &self,
        run_id: &str,
        step: usize,
        reply: AssistantReply,
    ) -> (String, Option<ToolCall>) {
        let AssistantReply {
            content,
            tool_calls,
        } = reply;
        let dropped = tool_calls.len().saturating_sub(1);
        let call = tool_calls.into_iter().next();
        if let Some(kept) = &call {
            if dropped > 0 {
                obs::emit_tool_calls_dropped(run_id, step, &kept.name, dropped);
            }
        }
        (content.unwrap_or_default(), call)
    }

    /// Execute one call. Returns the audit form of its arguments and the result.
    async fn dispatch(
        &self,
        ctx: &RunContext,
        run_id: &str,
        step: usize,
        call: &ToolCall,
    ) -> (Value, ToolResult) {
        let args = match call.parse_arguments() {
            Ok(args) => args,
            Err(err) => {
                let result = ToolResult::failure(err.to_string())
                    .with_field("raw", Value::String(call.arguments.clone()));
                return (Value::String(call.arguments.clone()), result);
            }
        };

        obs::emit_tool_dispatched(run_id, step, &call.name, &call.id);
        let started = Instant::now();
        let result = self.tools.invoke(ctx, &call.name, &args).await;
        obs::emit_tool_completed(run_id, step, &call.name, result.ok, elapsed_ms(started));

        (Value::Object(args), result)
    }
}

async fn record(audit: &mut AuditLog, action: AuditAction) -> Result<()> {
    audit.append(action).await.map_err(|source| AgentError::Audit {
        path: audit.path().to_path_buf(),
        source,
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProviderError;
    use crate::sandbox::SandboxRoot;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with the next scripted answer; repeats the last one forever.
    struct Scripted {
        replies: Mutex<Vec<AssistantReply>>,
        seen: Mutex<Vec<usize>>,
    }

    impl Scripted {
        fn new(mut replies: Vec<AssistantReply>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelClient for Scripted {
        fn id(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: &ModelRequest<'_>,
        ) -> std::result::Result<AssistantReply, ProviderError> {
            self.seen.lock().unwrap().push(request.messages.len());
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                Ok(replies.pop().unwrap())
            } else {
                Ok(replies[0].clone())
            }
        }
    }

    fn settings() -> AgentSettings {
        AgentSettings {
            model: "gpt-test".into(),
            system_prompt: "be brief".into(),
            retry: RetryPolicy::default(),
            parallel_tool_calls_flag: true,
        }
    }

    #[tokio::test]
    async fn test_prepends_system_prompt_and_answers() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new(SandboxRoot::new(dir.path()).unwrap()).unwrap();
        let model = Arc::new(Scripted::new(vec![AssistantReply::text("42")]));
        let agent = Agent::new(model.clone(), ToolRegistry::new(), settings());

        let outcome = agent
            .run(ctx, RunRequest::prompt("question", 5))
            .await
            .unwrap();

        assert_eq!(outcome.answer, "42");
        assert_eq!(outcome.status, RunStatus::Answered);
        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.messages[0], Message::system("be brief"));
        assert_eq!(outcome.messages.len(), 3);
        assert_eq!(*model.seen.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_existing_system_prompt_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new(SandboxRoot::new(dir.path()).unwrap()).unwrap();
        let model = Arc::new(Scripted::new(vec![AssistantReply::text("ok")]));
        let agent = Agent::new(model, ToolRegistry::new(), settings());

        let request = RunRequest::new(
            vec![Message::system("custom"), Message::user("hi")],
            2,
        );
        let outcome = agent.run(ctx, request).await.unwrap();
        assert_eq!(outcome.messages[0].content, "custom");
        assert_eq!(
            outcome
                .messages
                .iter()
                .filter(|m| m.role == Role::System)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_lease_released_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let root = SandboxRoot::new(dir.path()).unwrap();
        let ctx = RunContext::new(root.clone()).unwrap();
        let model = Arc::new(Scripted::new(vec![AssistantReply::text("done")]));
        let agent = Agent::new(model, ToolRegistry::new(), settings());

        agent.run(ctx, RunRequest::prompt("q", 1)).await.unwrap();
        RunContext::new(root).unwrap();
    }
}
