//! # Polling Orchestrator
//!
//! Submits one debug request, then re-reads the resulting event on a fixed
//! interval until the gateway reports a result, reports an error, or the
//! polling window closes. Only the read is retried; the submission never is.
//!
//! Every await point races against the caller's [`CancellationToken`], so a
//! cancelled run stops at the next suspension and never yields a result.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{DebugBackend, DebugRequest};
use crate::core::config::PollingConfig;
use crate::core::error::{DebugError, DebugResult};
use crate::debug::event::{ApiDebugStatus, DebugEvent};
use crate::observability::metrics;

/// Progress report emitted after submission and after each unfinished poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollProgress {
    pub event_id: String,
    /// Number of event reads so far, 0 right after submission
    pub attempt: u32,
    pub elapsed: Duration,
    /// Set once the slow-request threshold has passed without a result
    pub slow: bool,
}

pub struct PollingOrchestrator {
    backend: Arc<dyn DebugBackend>,
    config: PollingConfig,
}

impl PollingOrchestrator {
    pub fn new(backend: Arc<dyn DebugBackend>, config: PollingConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &Arc<dyn DebugBackend> {
        &self.backend
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    /// Run one debug request to completion
    pub async fn debug<F>(
        &self,
        api_id: &str,
        request: &DebugRequest,
        cancel: &CancellationToken,
        mut progress: F,
    ) -> DebugResult<DebugEvent>
    where
        F: FnMut(PollProgress) + Send,
    {
        let started = Instant::now();
        let result = self.run(api_id, request, cancel, &mut progress).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(DebugError::EventFailed { .. }) => "failed",
            Err(DebugError::Timeout { .. }) => "timeout",
            Err(DebugError::Cancelled) => "cancelled",
            Err(_) => "error",
        };
        metrics::record_session(outcome, started.elapsed());

        match &result {
            Ok(event) => info!(api_id, event_id = %event.id, "Debug event received"),
            Err(DebugError::Cancelled) => debug!(api_id, "Debug run cancelled"),
            Err(e) => warn!(api_id, error = %e, "Debug run ended without a result"),
        }

        result
    }

    async fn run<F>(
        &self,
        api_id: &str,
        request: &DebugRequest,
        cancel: &CancellationToken,
        progress: &mut F,
    ) -> DebugResult<DebugEvent>
    where
        F: FnMut(PollProgress) + Send,
    {
        let event_id = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DebugError::Cancelled),
            submitted = self.backend.submit_debug(api_id, request) => submitted?,
        };
        debug!(api_id, %event_id, "Debug request submitted");

        let polling_started = Instant::now();
        let deadline = polling_started + self.config.timeout;
        let timed_out = || DebugError::Timeout {
            waited_ms: self.config.timeout.as_millis() as u64,
        };

        progress(PollProgress {
            event_id: event_id.clone(),
            attempt: 0,
            elapsed: Duration::ZERO,
            slow: false,
        });

        let mut ticker = interval_at(polling_started + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempt = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DebugError::Cancelled),
                _ = sleep_until(deadline) => return Err(timed_out()),
                _ = ticker.tick() => {}
            }

            attempt += 1;
            metrics::record_poll_attempt();

            let record = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DebugError::Cancelled),
                _ = sleep_until(deadline) => return Err(timed_out()),
                fetched = self.backend.fetch_event(api_id, &event_id) => fetched?,
            };

            if !record.is_debug_event() {
                debug!(%event_id, attempt, event_type = %record.event_type, "Event not ready yet");
            } else {
                match record.debug_status() {
                    Some(ApiDebugStatus::Success) => return record.into_debug_event(&event_id),
                    Some(ApiDebugStatus::Error) => {
                        return Err(DebugError::EventFailed {
                            event_id: event_id.clone(),
                        })
                    }
                    status => debug!(%event_id, attempt, ?status, "Debug event pending"),
                }
            }

            let elapsed = polling_started.elapsed();
            let slow = self
                .config
                .slow_request_warning
                .map_or(false, |threshold| elapsed >= threshold);
            progress(PollProgress {
                event_id: event_id.clone(),
                attempt,
                elapsed,
                slow,
            });
        }
    }
}
