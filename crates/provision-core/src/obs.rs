//! Structured lifecycle events for provisioning runs.
//!
//! These are diagnostics (tracing), separate from the run log which is the
//! operator-facing audit trail.

use tracing::{info, warn, Span};

/// Span tagging every event of one run with its id.
///
/// Attach with `Instrument::instrument`; the run future awaits child processes.
pub fn run_span(run_id: &str) -> Span {
    tracing::info_span!("provision.run", run_id = %run_id)
}

pub fn emit_run_started(run_id: &str, plan_digest: &str, step_count: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        plan_digest = %plan_digest,
        steps = step_count,
    );
}

pub fn emit_step_started(step: &str, fatal: bool) {
    info!(event = "step.started", step = %step, fatal = fatal);
}

/// `outcome` is one of `success`, `non_fatal`, `fatal`.
pub fn emit_step_finished(step: &str, outcome: &str, exit_code: i32, duration_ms: u64) {
    info!(
        event = "step.finished",
        step = %step,
        outcome = %outcome,
        exit_code = exit_code,
        duration_ms = duration_ms,
    );
}

pub fn emit_package_failed(package: &str, exit_code: i32) {
    warn!(event = "package.install_failed", package = %package, exit_code = exit_code);
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, success: bool, non_fatal_failures: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        success = success,
        non_fatal_failures = non_fatal_failures,
    );
}
