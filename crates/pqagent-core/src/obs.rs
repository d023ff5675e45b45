//! Structured observability hooks for agent runs.
//!
//! Provides a run-scoped span via [`run_span`] and one emitter per
//! lifecycle event. Every event carries an `event` field, so logs can be
//! filtered with e.g. `event="tool.completed"` in JSON mode.

use tracing::{info, warn};

/// Run-scoped span. Attach it with `tracing::Instrument` so it follows the
/// run's future across threads.
///
/// ```ignore
/// agent.drive(ctx, request).instrument(obs::run_span(&run_id)).await
/// ```
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("pqagent.run", run_id = %run_id)
}

pub fn emit_run_started(run_id: &str, model: &str, max_steps: usize, root: &str) {
    info!(
        event = "run.started",
        run_id = %run_id,
        model = %model,
        max_steps = max_steps,
        root = %root,
    );
}

/// Emit event: one model round completed.
pub fn emit_round(run_id: &str, step: usize, requested_tool: Option<&str>) {
    info!(
        event = "run.round",
        run_id = %run_id,
        step = step,
        tool = requested_tool.unwrap_or("-"),
    );
}

pub fn emit_tool_dispatched(run_id: &str, step: usize, tool: &str, call_id: &str) {
    info!(
        event = "tool.dispatched",
        run_id = %run_id,
        step = step,
        tool = %tool,
        call_id = %call_id,
    );
}

pub fn emit_tool_completed(run_id: &str, step: usize, tool: &str, ok: bool, duration_ms: u64) {
    info!(
        event = "tool.completed",
        run_id = %run_id,
        step = step,
        tool = %tool,
        ok = ok,
        duration_ms = duration_ms,
    );
}

/// Emit event: extra tool calls proposed in one reply were discarded (warning level).
pub fn emit_tool_calls_dropped(run_id: &str, step: usize, kept: &str, dropped: usize) {
    warn!(
        event = "tool_calls.dropped",
        run_id = %run_id,
        step = step,
        kept = %kept,
        dropped = dropped,
    );
}

/// Emit event: a transient upstream failure will be retried (warning level).
pub fn emit_upstream_retry(attempt: u32, max_attempts: u32, delay_ms: u64, error: &dyn std::fmt::Display) {
    warn!(
        event = "upstream.retry",
        attempt = attempt,
        max_attempts = max_attempts,
        delay_ms = delay_ms,
        error = %error,
    );
}

pub fn emit_run_finished(run_id: &str, status: &str, steps: usize, duration_ms: u64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        status = %status,
        steps = steps,
        duration_ms = duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let span = run_span("test-run-id");
        span.in_scope(|| emit_round("test-run-id", 1, None));
    }
}
