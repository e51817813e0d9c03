//! # Debug Event Model
//!
//! Raw shapes received from the management API. The backend wraps each debug run in
//! an event envelope whose `payload` is itself a JSON string; [`EventRecord::into_debug_event`]
//! performs that second decoding step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::core::error::{DebugError, DebugResult};
use crate::debug::snapshot::{Attributes, RequestSnapshot, ResponseSnapshot};

/// Event type the backend uses for debug runs
pub const DEBUG_EVENT_TYPE: &str = "DEBUG_API";

/// Processing phase a policy step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Request,
    Response,
}

/// When in the request lifecycle a policy ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyScope {
    OnRequest,
    OnRequestContent,
    OnResponse,
    OnResponseContent,
}

impl PolicyScope {
    pub fn phase(&self) -> Phase {
        match self {
            PolicyScope::OnRequest | PolicyScope::OnRequestContent => Phase::Request,
            PolicyScope::OnResponse | PolicyScope::OnResponseContent => Phase::Response,
        }
    }

    /// `Body` for content scopes, `Header` otherwise
    pub fn label(&self) -> &'static str {
        match self {
            PolicyScope::OnRequestContent | PolicyScope::OnResponseContent => "Body",
            PolicyScope::OnRequest | PolicyScope::OnResponse => "Header",
        }
    }
}

/// Execution status of a single policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Completed,
    Error,
    Skipped,
}

/// Flow stage a policy was attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyStage {
    Platform,
    Security,
    Plan,
    Api,
}

impl fmt::Display for PolicyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyStage::Platform => write!(f, "Platform"),
            PolicyStage::Security => write!(f, "Security"),
            PolicyStage::Plan => write!(f, "Plan"),
            PolicyStage::Api => write!(f, "Api"),
        }
    }
}

/// Failure raised by a policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// One policy execution record, as captured by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugStepRaw {
    pub policy_id: String,
    pub policy_instance_id: String,
    pub scope: PolicyScope,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<PolicyStage>,
    /// Execution time in nanoseconds
    #[serde(default)]
    pub duration: u64,
    /// Fields the policy set; `null` or a non-object decodes as no change
    #[serde(default, deserialize_with = "result_map")]
    pub result: serde_json::Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
}

fn result_map<'de, D>(deserializer: D) -> Result<serde_json::Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    })
}

/// Decoded `payload` of a debug event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugEventPayload {
    #[serde(default)]
    pub request: RequestSnapshot,
    #[serde(default)]
    pub response: ResponseSnapshot,
    #[serde(default)]
    pub backend_response: ResponseSnapshot,
    #[serde(default)]
    pub initial_attributes: Attributes,
    #[serde(default)]
    pub debug_steps: Vec<DebugStepRaw>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocessor_step: Option<RequestSnapshot>,
}

/// Final status of a debug event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebugEventStatus {
    Success,
    Failed,
}

/// A completed debug run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugEvent {
    pub id: String,
    pub status: DebugEventStatus,
    pub payload: DebugEventPayload,
}

impl DebugEvent {
    /// Parse the JSON-encoded payload string carried by an event record
    pub fn parse_payload(raw: &str) -> DebugResult<DebugEventPayload> {
        serde_json::from_str(raw)
            .map_err(|e| DebugError::invalid_payload(format!("cannot decode payload: {}", e)))
    }
}

/// Debug status reported in the event properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiDebugStatus {
    ToDebug,
    Debugging,
    Success,
    Error,
}

impl std::str::FromStr for ApiDebugStatus {
    type Err = DebugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TO_DEBUG" => Ok(ApiDebugStatus::ToDebug),
            "DEBUGGING" => Ok(ApiDebugStatus::Debugging),
            "SUCCESS" => Ok(ApiDebugStatus::Success),
            "ERROR" => Ok(ApiDebugStatus::Error),
            other => Err(DebugError::invalid_payload(format!(
                "unknown debug status: {}",
                other
            ))),
        }
    }
}

/// Event envelope returned by `GET /apis/{id}/events/{eventId}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Epoch milliseconds on the wire
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl EventRecord {
    pub fn is_debug_event(&self) -> bool {
        self.event_type == DEBUG_EVENT_TYPE
    }

    /// Debug status from either the v2 or the v4 property name
    pub fn debug_status(&self) -> Option<ApiDebugStatus> {
        ["API_DEBUG_STATUS", "api_debug_status"]
            .iter()
            .find_map(|key| self.properties.get(*key))
            .and_then(|value| value.parse().ok())
    }

    /// Decode the payload of a finished event
    pub fn into_debug_event(self, event_id: &str) -> DebugResult<DebugEvent> {
        let status = match self.debug_status() {
            Some(ApiDebugStatus::Success) => DebugEventStatus::Success,
            Some(ApiDebugStatus::Error) => DebugEventStatus::Failed,
            other => {
                return Err(DebugError::invalid_payload(format!(
                    "event {} is not finished (status {:?})",
                    event_id, other
                )))
            }
        };

        let raw = self.payload.ok_or_else(|| {
            DebugError::invalid_payload(format!("event {} has no payload", event_id))
        })?;

        Ok(DebugEvent {
            id: self.id.unwrap_or_else(|| event_id.to_string()),
            status,
            payload: DebugEvent::parse_payload(&raw)?,
        })
    }
}

/// Policy entry from the policy catalog endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyListItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Display names of installed policies, keyed by policy id
#[derive(Debug, Clone, Default)]
pub struct PolicyCatalog {
    names: HashMap<String, String>,
}

impl PolicyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display name for `policy_id`, falling back to the id itself for unknown policies
    pub fn name_for<'a>(&'a self, policy_id: &'a str) -> &'a str {
        self.names
            .get(policy_id)
            .map(String::as_str)
            .unwrap_or(policy_id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl From<Vec<PolicyListItem>> for PolicyCatalog {
    fn from(items: Vec<PolicyListItem>) -> Self {
        let names = items
            .into_iter()
            .map(|item| {
                let name = match item.name.filter(|n| !n.is_empty()) {
                    Some(name) => name,
                    None => humanize_id(&item.id),
                };
                (item.id, name)
            })
            .collect();
        Self { names }
    }
}

/// `policy-override-request-method` -> `Policy Override Request Method`
fn humanize_id(id: &str) -> String {
    id.split(|c: char| c == '-' || c == '_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
