//! # Session Metrics
//!
//! Thin wrappers over the `metrics` facade. No exporter is installed by the
//! library; embedding applications pick their own recorder.

use std::time::Duration;

pub const SESSIONS_TOTAL: &str = "policy_debugger_sessions_total";
pub const POLL_ATTEMPTS_TOTAL: &str = "policy_debugger_poll_attempts_total";
pub const SESSION_DURATION_SECONDS: &str = "policy_debugger_session_duration_seconds";

/// Record the end of a debug session with its outcome label
pub fn record_session(outcome: &'static str, elapsed: Duration) {
    metrics::counter!(SESSIONS_TOTAL, "outcome" => outcome).increment(1);
    metrics::histogram!(SESSION_DURATION_SECONDS, "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

/// Record one read of the debug event
pub fn record_poll_attempt() {
    metrics::counter!(POLL_ATTEMPTS_TOTAL).increment(1);
}
