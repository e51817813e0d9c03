//! # Debug Response
//!
//! View model built from a finished debug event: the request as sent, the
//! cumulative request and response steps, and the phase boundaries used by the
//! timeline.
//!
//! The response phase is causally chained to the request phase: the first
//! response step starts from the attributes of the last request step, or from
//! the initial attributes when no request policy ran.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::debug::accumulator::{accumulate, PolicyDebugStep};
use crate::debug::event::{DebugEvent, DebugEventStatus};
use crate::debug::snapshot::{Attributes, PhaseSnapshot, RequestSnapshot, ResponseSnapshot};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DebugEventStatus>,
    /// Request as submitted by the client
    pub request: RequestSnapshot,
    /// Response returned to the client after every policy
    pub response: ResponseSnapshot,
    /// Response received from the backend before response policies
    pub backend_response: ResponseSnapshot,
    pub initial_attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocessor_step: Option<RequestSnapshot>,
    /// State entering the request policy chain
    pub request_input: RequestSnapshot,
    pub request_debug_steps: Vec<PolicyDebugStep<RequestSnapshot>>,
    /// State entering the response policy chain
    pub response_input: ResponseSnapshot,
    pub response_debug_steps: Vec<PolicyDebugStep<ResponseSnapshot>>,
}

impl DebugResponse {
    /// Empty, non-loading response shown after a failure
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.event_id.is_none()
    }

    /// Build the view model from a decoded debug event
    pub fn from_event(event: &DebugEvent) -> Self {
        let payload = &event.payload;

        let mut request_input = payload.request.clone();
        let mut initial_attributes = payload.initial_attributes.clone();
        if let Some(preprocessor) = &payload.preprocessor_step {
            request_input.merge(preprocessor);
            if let Some(attributes) = preprocessor.attributes() {
                initial_attributes.extend(attributes.clone());
            }
        }
        request_input.set_attributes(initial_attributes.clone());

        let request_debug_steps =
            accumulate(&payload.debug_steps, &request_input, &initial_attributes);

        let response_attributes = request_debug_steps
            .last()
            .and_then(|step| step.output.attributes().cloned())
            .unwrap_or_else(|| initial_attributes.clone());

        let mut response_input = payload.backend_response.clone();
        response_input.set_attributes(response_attributes.clone());

        let response_debug_steps =
            accumulate(&payload.debug_steps, &response_input, &response_attributes);

        info!(
            event_id = %event.id,
            request_steps = request_debug_steps.len(),
            response_steps = response_debug_steps.len(),
            "Debug response reconstructed"
        );

        Self {
            event_id: Some(event.id.clone()),
            status: Some(event.status),
            request: payload.request.clone(),
            response: payload.response.clone(),
            backend_response: payload.backend_response.clone(),
            initial_attributes: payload.initial_attributes.clone(),
            preprocessor_step: payload.preprocessor_step.clone(),
            request_input,
            request_debug_steps,
            response_input,
            response_debug_steps,
        }
    }

    /// State leaving the request policy chain
    pub fn request_output(&self) -> &RequestSnapshot {
        self.request_debug_steps
            .last()
            .map(|step| &step.output)
            .unwrap_or(&self.request_input)
    }

    /// State leaving the response policy chain
    pub fn response_output(&self) -> &ResponseSnapshot {
        self.response_debug_steps
            .last()
            .map(|step| &step.output)
            .unwrap_or(&self.response_input)
    }

    /// Header line such as `Response 200 - OK  GET /`
    pub fn summary(&self) -> Option<String> {
        let status = self.response.status_line()?;
        let method = self.request.method().unwrap_or_default();
        let path = self.request.path().unwrap_or_default();
        Some(format!("Response {}  {} {}", status, method, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::event::DebugEventPayload;
    use serde_json::json;

    fn event(payload: serde_json::Value) -> DebugEvent {
        DebugEvent {
            id: "evt-1".to_string(),
            status: DebugEventStatus::Success,
            payload: serde_json::from_value::<DebugEventPayload>(payload).unwrap(),
        }
    }

    #[test]
    fn test_response_only_steps_inherit_initial_attributes() {
        let event = event(json!({
            "request": { "method": "GET", "path": "/" },
            "backendResponse": { "statusCode": 200 },
            "initialAttributes": { "gravitee.attribute.api": "api-1" },
            "debugSteps": [{
                "policyId": "transform-headers",
                "policyInstanceId": "i-1",
                "scope": "ON_RESPONSE",
                "status": "COMPLETED",
                "duration": 10,
                "result": { "headers": { "x-out": "1" } }
            }]
        }));

        let response = DebugResponse::from_event(&event);

        assert!(response.request_debug_steps.is_empty());
        assert_eq!(response.response_debug_steps.len(), 1);
        assert_eq!(
            response.response_debug_steps[0].output.attributes(),
            Some(&event.payload.initial_attributes)
        );
        assert_eq!(response.response_output().status_code(), Some(200));
    }

    #[test]
    fn test_response_phase_chains_request_attributes() {
        let event = event(json!({
            "request": { "method": "GET", "path": "/" },
            "initialAttributes": { "a": "1" },
            "debugSteps": [
                {
                    "policyId": "policy-assign-attributes",
                    "policyInstanceId": "i-1",
                    "scope": "ON_REQUEST",
                    "status": "COMPLETED",
                    "duration": 10,
                    "result": { "attributes": { "a": "1", "dev": "Gaetan" } }
                },
                {
                    "policyId": "transform-headers",
                    "policyInstanceId": "i-2",
                    "scope": "ON_RESPONSE",
                    "status": "COMPLETED",
                    "duration": 10,
                    "result": {}
                }
            ]
        }));

        let response = DebugResponse::from_event(&event);
        let attributes = response.response_debug_steps[0]
            .output
            .attributes()
            .cloned()
            .unwrap();
        assert_eq!(attributes.get("dev"), Some(&json!("Gaetan")));
        assert_eq!(response.response_input.attributes(), Some(&attributes));
    }

    #[test]
    fn test_preprocessor_step_feeds_request_input() {
        let event = event(json!({
            "request": { "method": "GET", "path": "/" },
            "initialAttributes": { "a": "1" },
            "preprocessorStep": {
                "headers": { "X-Gravitee-Transaction-Id": "tx" },
                "attributes": { "gravitee.attribute.plan": "plan-1" }
            }
        }));

        let response = DebugResponse::from_event(&event);
        let input = &response.request_input;
        assert!(input.headers().unwrap().contains_key("X-Gravitee-Transaction-Id"));
        let attributes = input.attributes().unwrap();
        assert_eq!(attributes.len(), 2);
        assert_eq!(response.request_output(), input);
    }

    #[test]
    fn test_malformed_results_keep_their_steps() {
        let event = event(json!({
            "request": { "method": "GET", "path": "/" },
            "backendResponse": { "statusCode": 200 },
            "debugSteps": [
                {
                    "policyId": "mock",
                    "policyInstanceId": "i-1",
                    "scope": "ON_REQUEST",
                    "status": "COMPLETED",
                    "duration": 10,
                    "result": null
                },
                {
                    "policyId": "transform-headers",
                    "policyInstanceId": "i-2",
                    "scope": "ON_RESPONSE",
                    "status": "COMPLETED",
                    "duration": 10,
                    "result": { "statusCode": "teapot", "headers": { "x-out": "1" } }
                }
            ]
        }));

        let response = DebugResponse::from_event(&event);

        assert_eq!(response.request_debug_steps.len(), 1);
        assert_eq!(response.request_output().path(), Some("/"));
        assert_eq!(response.response_debug_steps.len(), 1);
        let output = response.response_output();
        assert_eq!(output.status_code(), Some(200));
        assert!(output.headers().unwrap().contains_key("x-out"));
    }

    #[test]
    fn test_summary() {
        let event = event(json!({
            "request": { "method": "GET", "path": "/" },
            "response": { "statusCode": 200 }
        }));
        let response = DebugResponse::from_event(&event);
        assert_eq!(response.summary().as_deref(), Some("Response 200 - OK  GET /"));
        assert_eq!(DebugResponse::empty().summary(), None);
        assert!(DebugResponse::empty().is_empty());
    }
}
