//! # Management API Client
//!
//! The debug pipeline only depends on three capabilities of the management API,
//! captured by [`DebugBackend`]: submitting a debug request, reading a debug
//! event, and listing installed policies.
//!
//! ## Components
//! - [`http::ManagementClient`]: reqwest implementation of the backend
//! - [`poller::PollingOrchestrator`]: submit then poll until a result, an error or the deadline
//! - [`session::DebugSession`]: cancellable, last-request-wins session state machine

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::{DebugError, DebugResult};
use crate::debug::event::{EventRecord, PolicyListItem};
use crate::debug::snapshot::MultiValueMap;

pub mod http;
pub mod poller;
pub mod session;

pub use http::ManagementClient;
pub use poller::{PollProgress, PollingOrchestrator};
pub use session::{DebugSession, SessionState};

/// Backend capabilities used by the debug session
#[async_trait]
pub trait DebugBackend: Send + Sync {
    /// Submit a debug request and return the id of the event to poll
    async fn submit_debug(&self, api_id: &str, request: &DebugRequest) -> DebugResult<String>;

    /// Read the current state of a debug event
    async fn fetch_event(&self, api_id: &str, event_id: &str) -> DebugResult<EventRecord>;

    /// List installed policies, used for timeline labels
    async fn list_policies(&self) -> DebugResult<Vec<PolicyListItem>>;
}

/// Request replayed through the policy chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugRequest {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: MultiValueMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl DebugRequest {
    pub fn new<M: Into<String>, P: Into<String>>(method: M, path: P) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: MultiValueMap::new(),
            body: None,
        }
    }

    pub fn with_header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_body<B: Into<String>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Check the request before it is sent
    pub fn validate(&self) -> DebugResult<()> {
        match self.method.to_uppercase().as_str() {
            "GET" | "POST" | "PUT" | "DELETE" | "PATCH" | "HEAD" | "OPTIONS" | "TRACE"
            | "CONNECT" => {}
            _ => {
                return Err(DebugError::config(format!(
                    "Invalid HTTP method: {}",
                    self.method
                )))
            }
        }

        if !self.path.starts_with('/') {
            return Err(DebugError::config(format!(
                "Debug request path must start with '/': {}",
                self.path
            )));
        }

        Ok(())
    }
}

impl Default for DebugRequest {
    fn default() -> Self {
        Self::new("GET", "/")
    }
}
