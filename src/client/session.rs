//! # Debug Session
//!
//! Owns at most one in-flight debug run for an API and publishes its state
//! through a `tokio::sync::watch` channel.
//!
//! ## Last request wins
//! Starting a new request, cancelling, resetting or dropping the session
//! cancels the previous run's token. State writes from a run happen under the
//! same gate that cancels it and are skipped once its token is cancelled, so a
//! superseded run can never overwrite newer state.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::poller::{PollProgress, PollingOrchestrator};
use crate::client::{DebugBackend, DebugRequest};
use crate::core::config::PollingConfig;
use crate::core::error::{DebugError, DebugResult};
use crate::debug::event::PolicyCatalog;
use crate::debug::response::DebugResponse;
use crate::debug::timeline::Inspection;
use crate::debug::view::DebugView;

/// Observable state of a debug session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Sending,
    #[serde(rename_all = "camelCase")]
    Polling {
        event_id: String,
        attempt: u32,
        slow: bool,
    },
    Success(Box<DebugView>),
    /// Submission, polling or decoding failed, or the gateway reported an error
    Failed { message: String, error: String },
    #[serde(rename_all = "camelCase")]
    TimedOut { message: String, waited_ms: u64 },
    Cancelled,
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Sending | Self::Polling { .. })
    }

    pub fn is_settled(&self) -> bool {
        !self.is_loading()
    }

    pub fn view(&self) -> Option<&DebugView> {
        match self {
            Self::Success(view) => Some(view),
            _ => None,
        }
    }

    /// Response shown for this state; every non-success state shows an empty one
    pub fn response(&self) -> DebugResponse {
        self.view()
            .map(|view| view.response.clone())
            .unwrap_or_else(DebugResponse::empty)
    }

    /// Transient notification text, if any
    pub fn notification(&self) -> Option<&str> {
        match self {
            Self::Failed { message, .. } | Self::TimedOut { message, .. } => Some(message),
            _ => None,
        }
    }

    fn from_error(error: &DebugError) -> Self {
        match error {
            DebugError::Timeout { waited_ms } => Self::TimedOut {
                message: error.user_message().to_string(),
                waited_ms: *waited_ms,
            },
            DebugError::Cancelled => Self::Cancelled,
            _ => Self::Failed {
                message: error.user_message().to_string(),
                error: error.to_string(),
            },
        }
    }
}

struct Shared {
    state: watch::Sender<SessionState>,
    current: Mutex<Option<CancellationToken>>,
}

impl Shared {
    /// Publish `state` unless `token`'s run has been superseded
    fn publish(&self, token: &CancellationToken, state: SessionState) {
        let _gate = self.current.lock();
        if !token.is_cancelled() {
            self.state.send_replace(state);
        }
    }

    /// Publish the terminal state of `token`'s run and retire its token
    fn finish(&self, token: &CancellationToken, state: SessionState) {
        let _gate = self.current.lock();
        if token.is_cancelled() {
            return;
        }
        self.state.send_replace(state);
        token.cancel();
    }

    /// Cancel the in-flight run, if any, and publish `state` in the same critical section
    fn cancel_and_publish(&self, state: SessionState) {
        let mut current = self.current.lock();
        if let Some(token) = current.take() {
            token.cancel();
        }
        self.state.send_replace(state);
    }
}

/// Cancellable debug session for one API
pub struct DebugSession {
    api_id: String,
    orchestrator: Arc<PollingOrchestrator>,
    catalog: Arc<RwLock<PolicyCatalog>>,
    shared: Arc<Shared>,
}

impl DebugSession {
    pub fn new<S: Into<String>>(
        api_id: S,
        backend: Arc<dyn DebugBackend>,
        config: PollingConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            api_id: api_id.into(),
            orchestrator: Arc::new(PollingOrchestrator::new(backend, config)),
            catalog: Arc::new(RwLock::new(PolicyCatalog::new())),
            shared: Arc::new(Shared {
                state,
                current: Mutex::new(None),
            }),
        }
    }

    pub fn api_id(&self) -> &str {
        &self.api_id
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Fetch the policy catalog used to label timeline entries
    pub async fn load_policies(&self) -> DebugResult<usize> {
        let items = self.orchestrator.backend().list_policies().await?;
        let catalog = PolicyCatalog::from(items);
        let count = catalog.len();
        *self.catalog.write() = catalog;
        info!(policies = count, "Policy catalog loaded");
        Ok(count)
    }

    /// Start a debug run, superseding any run in flight.
    ///
    /// The run is spawned on the current Tokio runtime; called outside one,
    /// this returns an error and leaves the session untouched.
    pub fn send(&self, request: DebugRequest) -> DebugResult<()> {
        request.validate()?;
        let runtime = Handle::try_current().map_err(|e| {
            DebugError::internal(format!("no Tokio runtime to run the debug request: {}", e))
        })?;

        let token = CancellationToken::new();
        {
            let mut current = self.shared.current.lock();
            if let Some(previous) = current
                .replace(token.clone())
                .filter(|previous| !previous.is_cancelled())
            {
                previous.cancel();
                info!(api_id = %self.api_id, "Previous debug run superseded");
            }
            self.shared.state.send_replace(SessionState::Sending);
        }

        let api_id = self.api_id.clone();
        let orchestrator = self.orchestrator.clone();
        let catalog = self.catalog.clone();
        let shared = self.shared.clone();

        runtime.spawn(async move {
            let result = orchestrator
                .debug(&api_id, &request, &token, |progress: PollProgress| {
                    shared.publish(
                        &token,
                        SessionState::Polling {
                            event_id: progress.event_id,
                            attempt: progress.attempt,
                            slow: progress.slow,
                        },
                    );
                })
                .await;

            let state = match result.map(|event| DebugResponse::from_event(&event)) {
                Ok(response) => {
                    let view = DebugView::new(response, &catalog.read());
                    SessionState::Success(Box::new(view))
                }
                Err(DebugError::Cancelled) => return,
                Err(e) => {
                    warn!(api_id = %api_id, error = %e, "Debug request failed");
                    SessionState::from_error(&e)
                }
            };
            shared.finish(&token, state);
        });

        Ok(())
    }

    /// Cancel the run in flight; a no-op when nothing is running
    pub fn cancel(&self) {
        let mut current = self.shared.current.lock();
        if let Some(token) = current.take().filter(|token| !token.is_cancelled()) {
            token.cancel();
            self.shared.state.send_replace(SessionState::Cancelled);
            info!(api_id = %self.api_id, "Debug run cancelled");
        }
    }

    /// Cancel any run and return to an idle, empty state
    pub fn reset(&self) {
        self.shared.cancel_and_publish(SessionState::Idle);
    }

    /// Wait until the session leaves its loading states
    pub async fn wait_until_settled(&self) -> DebugResult<SessionState> {
        let mut receiver = self.subscribe();
        let state = receiver
            .wait_for(SessionState::is_settled)
            .await
            .map_err(|_| DebugError::internal("session state channel closed"))?;
        Ok(state.clone())
    }

    /// Inspect one timeline entry of the current result
    pub fn select(&self, index: usize) -> Option<Inspection> {
        self.modify_view(|view| view.select(index).cloned())
    }

    /// Inspect a range of policy entries of the current result
    pub fn select_range(&self, from: usize, to: usize) -> Option<Inspection> {
        self.modify_view(|view| view.select_range(from, to).cloned())
    }

    pub fn clear_selection(&self) {
        self.modify_view(|view| {
            view.clear_selection();
            Some(())
        });
    }

    fn modify_view<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&mut DebugView) -> Option<T>,
    {
        let _gate = self.shared.current.lock();
        let mut output = None;
        self.shared.state.send_if_modified(|state| match state {
            SessionState::Success(view) => {
                output = f(view.as_mut());
                true
            }
            _ => false,
        });
        output
    }
}

impl Drop for DebugSession {
    fn drop(&mut self) {
        if let Some(token) = self.shared.current.lock().take() {
            token.cancel();
        }
    }
}
