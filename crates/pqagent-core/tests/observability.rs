//! Structured tracing emitted during agent runs.

use std::sync::Arc;

use async_trait::async_trait;
use tracing_test::traced_test;

use pqagent_core::obs::{
    emit_round, emit_run_finished, emit_run_started, emit_tool_calls_dropped, emit_tool_completed,
    emit_tool_dispatched, emit_upstream_retry, run_span,
};
use pqagent_core::{
    Agent, AgentSettings, AssistantReply, ModelClient, ModelRequest, ProviderError, RetryPolicy,
    RunContext, RunRequest, SandboxRoot, ToolCall, ToolRegistry,
};

#[traced_test]
#[test]
fn test_lifecycle_emitters_log_event_names() {
    let span = run_span("run-obs-1");
    span.in_scope(|| {
        emit_run_started("run-obs-1", "gpt-test", 4, "/ws");
        emit_round("run-obs-1", 1, Some("read_file"));
        emit_tool_dispatched("run-obs-1", 1, "read_file", "call-1");
        emit_tool_completed("run-obs-1", 1, "read_file", true, 3);
        emit_run_finished("run-obs-1", "answered", 1, 12);
    });

    assert!(logs_contain("run.started"));
    assert!(logs_contain("run.round"));
    assert!(logs_contain("tool.dispatched"));
    assert!(logs_contain("tool.completed"));
    assert!(logs_contain("run.finished"));
    assert!(logs_contain("run-obs-1"));
}

#[traced_test]
#[test]
fn test_warning_emitters() {
    emit_tool_calls_dropped("run-obs-2", 2, "write_file", 2);
    emit_upstream_retry(1, 3, 2000, &"provider error (503, server_error): busy");

    assert!(logs_contain("tool_calls.dropped"));
    assert!(logs_contain("dropped=2"));
    assert!(logs_contain("upstream.retry"));
    assert!(logs_contain("delay_ms=2000"));
}

struct TwoCallsThenAnswer {
    answered: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl ModelClient for TwoCallsThenAnswer {
    fn id(&self) -> &str {
        "two-calls"
    }

    async fn complete(&self, _request: &ModelRequest<'_>) -> Result<AssistantReply, ProviderError> {
        if self.answered.swap(true, std::sync::atomic::Ordering::SeqCst) {
            return Ok(AssistantReply::text("done"));
        }
        Ok(AssistantReply::with_tool_calls(
            None,
            vec![
                ToolCall::new("a", "missing_tool", "{}"),
                ToolCall::new("b", "missing_tool", "{}"),
            ],
        ))
    }
}

#[traced_test]
#[tokio::test]
async fn test_dropped_tool_calls_are_logged_not_executed() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = RunContext::new(SandboxRoot::new(dir.path()).unwrap()).unwrap();
    let agent = Agent::new(
        Arc::new(TwoCallsThenAnswer {
            answered: Default::default(),
        }),
        ToolRegistry::new(),
        AgentSettings {
            model: "gpt-test".into(),
            system_prompt: "sys".into(),
            retry: RetryPolicy::default(),
            parallel_tool_calls_flag: true,
        },
    );

    let outcome = agent
        .run(ctx, RunRequest::prompt("go", 3).with_log_path(dir.path().join("audit.jsonl")))
        .await
        .unwrap();

    assert_eq!(outcome.answer, "done");
    assert!(logs_contain("tool_calls.dropped"));
    assert!(logs_contain("dropped=1"));
    assert!(logs_contain("call_id=a"));
    assert!(!logs_contain("call_id=b"));
}
