//! # Debug Session Integration Tests
//!
//! Runs the session state machine against an in-memory backend on paused tokio
//! time, so the 1s polling cadence and the 10s window elapse instantly.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use policy_debugger::client::{DebugBackend, DebugRequest, DebugSession, SessionState};
use policy_debugger::core::config::PollingConfig;
use policy_debugger::core::error::{
    DebugResult, DEBUG_EVENT_FAILED_MESSAGE, DEBUG_TIMEOUT_MESSAGE, UNABLE_TO_TRY_MESSAGE,
};
use policy_debugger::debug::event::{EventRecord, PolicyListItem};
use policy_debugger::DebugError;

/// Backend that hands out scripted event reads per submitted event id
#[derive(Default)]
struct ScriptedBackend {
    submissions: Mutex<Vec<DebugRequest>>,
    scripts: Mutex<HashMap<String, VecDeque<EventRecord>>>,
    submit_error: Mutex<Option<DebugError>>,
    fetch_delay: Option<Duration>,
}

impl ScriptedBackend {
    fn script(&self, event_id: &str, reads: Vec<EventRecord>) {
        self.scripts.lock().insert(event_id.to_string(), reads.into());
    }
}

#[async_trait]
impl DebugBackend for ScriptedBackend {
    async fn submit_debug(&self, _api_id: &str, request: &DebugRequest) -> DebugResult<String> {
        if let Some(error) = self.submit_error.lock().take() {
            return Err(error);
        }
        let mut submissions = self.submissions.lock();
        submissions.push(request.clone());
        Ok(format!("evt-{}", submissions.len()))
    }

    async fn fetch_event(&self, _api_id: &str, event_id: &str) -> DebugResult<EventRecord> {
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .scripts
            .lock()
            .get_mut(event_id)
            .and_then(|reads| reads.pop_front());
        Ok(next.unwrap_or_else(|| debug_record("DEBUGGING", "/")))
    }

    async fn list_policies(&self) -> DebugResult<Vec<PolicyListItem>> {
        Ok(vec![PolicyListItem {
            id: "transform-headers".to_string(),
            name: Some("Transform Headers".to_string()),
        }])
    }
}

fn debug_record(status: &str, path: &str) -> EventRecord {
    let payload = json!({
        "request": { "method": "GET", "path": path },
        "response": { "statusCode": 200 },
        "backendResponse": { "statusCode": 200 },
        "debugSteps": [{
            "policyId": "transform-headers",
            "policyInstanceId": "i-1",
            "scope": "ON_REQUEST",
            "status": "COMPLETED",
            "duration": 1000,
            "result": { "headers": { "x-debug": ["1"] } }
        }]
    });
    EventRecord {
        event_type: "DEBUG_API".to_string(),
        properties: [("API_DEBUG_STATUS".to_string(), status.to_string())]
            .into_iter()
            .collect(),
        payload: Some(payload.to_string()),
        ..Default::default()
    }
}

fn session(backend: Arc<ScriptedBackend>) -> DebugSession {
    DebugSession::new("api-1", backend, PollingConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_successful_run_builds_view() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.script(
        "evt-1",
        vec![
            EventRecord::default(),
            debug_record("DEBUGGING", "/"),
            debug_record("SUCCESS", "/orders"),
        ],
    );
    let session = session(backend.clone());
    assert_eq!(session.load_policies().await.unwrap(), 1);

    session.send(DebugRequest::new("GET", "/orders")).unwrap();
    assert!(session.state().is_loading());

    let state = session.wait_until_settled().await.unwrap();
    let view = state.view().expect("successful view");
    assert_eq!(view.response.event_id.as_deref(), Some("evt-1"));
    assert_eq!(view.response.summary().as_deref(), Some("Response 200 - OK  GET /orders"));
    assert_eq!(view.timeline.get(2).unwrap().title(), "Header  Transform Headers");
    assert_eq!(backend.submissions.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_polling_progress_is_published() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.script("evt-1", vec![debug_record("TO_DEBUG", "/"), debug_record("SUCCESS", "/")]);
    let session = session(backend);
    let mut states = session.subscribe();

    session.send(DebugRequest::default()).unwrap();

    let mut attempts = Vec::new();
    loop {
        states.changed().await.unwrap();
        let state = states.borrow_and_update().clone();
        match state {
            SessionState::Polling { attempt, slow, .. } => {
                assert!(!slow);
                attempts.push(attempt);
            }
            SessionState::Success(_) => break,
            SessionState::Sending => {}
            other => panic!("unexpected state {:?}", other),
        }
    }
    assert_eq!(attempts.last(), Some(&1));
}

#[tokio::test(start_paused = true)]
async fn test_error_event_fails_session() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.script("evt-1", vec![debug_record("ERROR", "/")]);
    let session = session(backend);

    session.send(DebugRequest::default()).unwrap();
    let state = session.wait_until_settled().await.unwrap();

    assert!(matches!(state, SessionState::Failed { .. }));
    assert_eq!(state.notification(), Some(DEBUG_EVENT_FAILED_MESSAGE));
    assert!(state.response().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_submission_failure_resets_to_empty() {
    let backend = Arc::new(ScriptedBackend::default());
    *backend.submit_error.lock() = Some(DebugError::backend(503, "unavailable"));
    let session = session(backend);

    session.send(DebugRequest::default()).unwrap();
    let state = session.wait_until_settled().await.unwrap();

    assert_eq!(state.notification(), Some(UNABLE_TO_TRY_MESSAGE));
    assert!(!state.is_loading());
    assert!(state.response().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_times_out_with_distinct_state() {
    let backend = Arc::new(ScriptedBackend::default());
    let session = session(backend);
    let started = tokio::time::Instant::now();

    session.send(DebugRequest::default()).unwrap();
    let state = session.wait_until_settled().await.unwrap();

    assert!(matches!(state, SessionState::TimedOut { waited_ms: 10_000, .. }));
    assert_eq!(state.notification(), Some(DEBUG_TIMEOUT_MESSAGE));
    assert!(started.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_slow_flag_with_extended_timeout() {
    let backend = Arc::new(ScriptedBackend::default());
    let config = PollingConfig {
        interval: Duration::from_secs(1),
        timeout: Duration::from_secs(30),
        slow_request_warning: Some(Duration::from_secs(20)),
    };
    let session = DebugSession::new("api-1", backend, config);
    let mut states = session.subscribe();

    session.send(DebugRequest::default()).unwrap();
    let state = states
        .wait_for(|state| matches!(state, SessionState::Polling { slow: true, .. }))
        .await
        .unwrap()
        .clone();
    assert!(matches!(state, SessionState::Polling { attempt: 20, .. }));

    session.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_run() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.script("evt-1", vec![debug_record("DEBUGGING", "/"), debug_record("SUCCESS", "/")]);
    let session = session(backend);

    session.send(DebugRequest::default()).unwrap();
    session.cancel();
    assert_eq!(session.state(), SessionState::Cancelled);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(session.state(), SessionState::Cancelled);

    // Cancelling an idle session does nothing
    session.reset();
    session.cancel();
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_new_request_supersedes_previous() {
    let backend = Arc::new(ScriptedBackend {
        fetch_delay: Some(Duration::from_millis(500)),
        ..Default::default()
    });
    backend.script("evt-1", vec![debug_record("SUCCESS", "/first")]);
    backend.script(
        "evt-2",
        vec![debug_record("DEBUGGING", "/"), debug_record("SUCCESS", "/second")],
    );
    let session = session(backend.clone());

    session.send(DebugRequest::new("GET", "/first")).unwrap();
    // Let the first run submit and start its first read
    tokio::time::sleep(Duration::from_millis(1200)).await;
    session.send(DebugRequest::new("GET", "/second")).unwrap();

    let state = session.wait_until_settled().await.unwrap();
    let view = state.view().expect("second run result");
    assert_eq!(view.response.request.path(), Some("/second"));

    // The first run never overwrites the newer result
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(session.state(), state);
    assert_eq!(backend.submissions.lock().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_selection_and_reset() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.script("evt-1", vec![debug_record("SUCCESS", "/")]);
    let session = session(backend.clone());

    session.send(DebugRequest::default()).unwrap();
    session.wait_until_settled().await.unwrap();

    let inspection = session.select(2).expect("policy entry inspection");
    assert_eq!(inspection.title, "Header  transform-headers");
    assert!(session.state().view().unwrap().selection.is_some());

    session.clear_selection();
    assert!(session.state().view().unwrap().inspection.is_none());

    // A new request starts with no selection
    backend.script("evt-2", vec![debug_record("SUCCESS", "/")]);
    session.select(2);
    session.send(DebugRequest::default()).unwrap();
    let state = session.wait_until_settled().await.unwrap();
    assert!(state.view().unwrap().selection.is_none());

    session.reset();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.select(2).is_none());
}

#[tokio::test]
async fn test_invalid_request_is_rejected() {
    let session = session(Arc::new(ScriptedBackend::default()));
    assert!(session.send(DebugRequest::new("GET", "no-slash")).is_err());
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn test_send_outside_runtime_is_rejected() {
    let session = session(Arc::new(ScriptedBackend::default()));

    let error = session.send(DebugRequest::default()).unwrap_err();

    assert!(matches!(error, DebugError::Internal { .. }));
    assert_eq!(session.state(), SessionState::Idle);
}
