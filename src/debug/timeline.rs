//! # Debug Timeline
//!
//! Flat, chronological view of a debug run: fixed anchors around the policy
//! steps of each phase.
//!
//! ```text
//! CLIENT_APP, REQUEST_INPUT, <request policies>, REQUEST_OUTPUT, BACKEND_TARGET,
//! RESPONSE_INPUT, <response policies>, RESPONSE_OUTPUT, CLIENT_APP
//! ```
//!
//! Selecting an entry resolves an [`Inspection`]: the grouped tree comparing the
//! state before and after that point.

use serde::{Deserialize, Serialize};

use crate::debug::accumulator::PolicyDebugStep;
use crate::debug::event::{Phase, PolicyCatalog, PolicyScope, PolicyStage, StepError, StepStatus};
use crate::debug::response::DebugResponse;
use crate::debug::snapshot::PhaseSnapshot;
use crate::debug::tree::{build_tree, TreeNode};

/// Kind of timeline entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineMode {
    ClientApp,
    RequestInput,
    RequestPolicy,
    RequestOutput,
    BackendTarget,
    ResponseInput,
    ResponsePolicy,
    ResponseOutput,
}

impl TimelineMode {
    fn anchor_label(&self) -> &'static str {
        match self {
            TimelineMode::ClientApp => "Client APP",
            TimelineMode::RequestInput => "Request Input",
            TimelineMode::RequestOutput => "Request Output",
            TimelineMode::BackendTarget => "Backend Target",
            TimelineMode::ResponseInput => "Response Input",
            TimelineMode::ResponseOutput => "Response Output",
            TimelineMode::RequestPolicy | TimelineMode::ResponsePolicy => "Policy",
        }
    }

    pub fn is_policy(&self) -> bool {
        matches!(self, TimelineMode::RequestPolicy | TimelineMode::ResponsePolicy)
    }
}

/// Policy details carried by a policy entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePolicy {
    /// Position among the steps of its phase
    pub index: usize,
    pub step_id: String,
    pub policy_id: String,
    pub policy_name: String,
    pub scope: PolicyScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<PolicyStage>,
    pub status: StepStatus,
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub mode: TimelineMode,
    /// e.g. `Request Input` or `Plan > Header`
    pub label: String,
    pub clickable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<TimelinePolicy>,
}

impl TimelineEntry {
    fn anchor(mode: TimelineMode) -> Self {
        Self {
            mode,
            label: mode.anchor_label().to_string(),
            clickable: !matches!(mode, TimelineMode::ClientApp | TimelineMode::BackendTarget),
            policy: None,
        }
    }

    fn policy<S>(
        mode: TimelineMode,
        index: usize,
        step: &PolicyDebugStep<S>,
        catalog: &PolicyCatalog,
    ) -> Self {
        let label = match step.stage {
            Some(stage) => format!("{} > {}", stage, step.scope.label()),
            None => step.scope.label().to_string(),
        };
        Self {
            mode,
            label,
            clickable: step.status != StepStatus::Skipped,
            policy: Some(TimelinePolicy {
                index,
                step_id: step.id.clone(),
                policy_id: step.policy_id.clone(),
                policy_name: catalog.name_for(&step.policy_id).to_string(),
                scope: step.scope,
                stage: step.stage,
                status: step.status,
                duration_ms: step.duration_ms(),
                condition: step.condition.clone(),
                error: step.error.clone(),
            }),
        }
    }

    /// Label followed by the policy name, as displayed on a timeline card
    pub fn title(&self) -> String {
        match &self.policy {
            Some(policy) => format!("{}  {}", self.label, policy.policy_name),
            None => self.label.clone(),
        }
    }
}

/// Grouped tree resolved for a selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub phase: Phase,
    pub title: String,
    pub tree: Vec<TreeNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn build(response: &DebugResponse, catalog: &PolicyCatalog) -> Self {
        let mut entries = vec![
            TimelineEntry::anchor(TimelineMode::ClientApp),
            TimelineEntry::anchor(TimelineMode::RequestInput),
        ];
        entries.extend(response.request_debug_steps.iter().enumerate().map(|(i, step)| {
            TimelineEntry::policy(TimelineMode::RequestPolicy, i, step, catalog)
        }));
        entries.push(TimelineEntry::anchor(TimelineMode::RequestOutput));
        entries.push(TimelineEntry::anchor(TimelineMode::BackendTarget));
        entries.push(TimelineEntry::anchor(TimelineMode::ResponseInput));
        entries.extend(response.response_debug_steps.iter().enumerate().map(|(i, step)| {
            TimelineEntry::policy(TimelineMode::ResponsePolicy, i, step, catalog)
        }));
        entries.push(TimelineEntry::anchor(TimelineMode::ResponseOutput));
        entries.push(TimelineEntry::anchor(TimelineMode::ClientApp));

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn modes(&self) -> Vec<TimelineMode> {
        self.entries.iter().map(|e| e.mode).collect()
    }

    pub fn get(&self, index: usize) -> Option<&TimelineEntry> {
        self.entries.get(index)
    }

    /// Resolve the inspector content for a single entry.
    ///
    /// Policy entries compare the state before the step with its output; phase
    /// anchors show the phase boundary. `CLIENT_APP`, `BACKEND_TARGET` and
    /// skipped policies resolve to nothing.
    pub fn inspect(&self, response: &DebugResponse, index: usize) -> Option<Inspection> {
        let entry = self.entries.get(index)?;
        if !entry.clickable {
            return None;
        }

        match entry.mode {
            TimelineMode::RequestInput => Some(Inspection {
                phase: Phase::Request,
                title: entry.title(),
                tree: build_tree(None, Some(&response.request_input)),
            }),
            TimelineMode::RequestOutput => Some(Inspection {
                phase: Phase::Request,
                title: entry.title(),
                tree: build_tree(Some(&response.request_input), Some(response.request_output())),
            }),
            TimelineMode::ResponseInput => Some(Inspection {
                phase: Phase::Response,
                title: entry.title(),
                tree: build_tree(None, Some(&response.response_input)),
            }),
            TimelineMode::ResponseOutput => Some(Inspection {
                phase: Phase::Response,
                title: entry.title(),
                tree: build_tree(Some(&response.response_input), Some(response.response_output())),
            }),
            TimelineMode::RequestPolicy | TimelineMode::ResponsePolicy => {
                let step = entry.policy.as_ref()?.index;
                self.inspect_steps(response, entry.mode, step, step, entry.title())
            }
            TimelineMode::ClientApp | TimelineMode::BackendTarget => None,
        }
    }

    /// Resolve the overview for two policy entries of the same phase: the state
    /// before the first compared with the state after the last. Skipped entries
    /// cannot bound a range.
    pub fn inspect_range(
        &self,
        response: &DebugResponse,
        from: usize,
        to: usize,
    ) -> Option<Inspection> {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        let first = self.entries.get(from)?;
        let last = self.entries.get(to)?;
        if !first.mode.is_policy() || first.mode != last.mode {
            return None;
        }
        if !first.clickable || !last.clickable {
            return None;
        }

        let title = format!("{} → {}", first.title(), last.title());
        self.inspect_steps(
            response,
            first.mode,
            first.policy.as_ref()?.index,
            last.policy.as_ref()?.index,
            title,
        )
    }

    fn inspect_steps(
        &self,
        response: &DebugResponse,
        mode: TimelineMode,
        from: usize,
        to: usize,
        title: String,
    ) -> Option<Inspection> {
        match mode {
            TimelineMode::RequestPolicy => Some(Inspection {
                phase: Phase::Request,
                title,
                tree: compare_steps(&response.request_debug_steps, &response.request_input, from, to)?,
            }),
            TimelineMode::ResponsePolicy => Some(Inspection {
                phase: Phase::Response,
                title,
                tree: compare_steps(&response.response_debug_steps, &response.response_input, from, to)?,
            }),
            _ => None,
        }
    }
}

fn compare_steps<S: PhaseSnapshot>(
    steps: &[PolicyDebugStep<S>],
    phase_input: &S,
    from: usize,
    to: usize,
) -> Option<Vec<TreeNode>> {
    let before = match from {
        0 => phase_input,
        n => &steps.get(n - 1)?.output,
    };
    let after = &steps.get(to)?.output;
    Some(build_tree(Some(before), Some(after)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::event::{DebugEvent, DebugEventStatus};
    use crate::debug::tree::ATTRIBUTES_GROUP;
    use serde_json::json;

    fn response(steps: serde_json::Value) -> DebugResponse {
        let event = DebugEvent {
            id: "evt".to_string(),
            status: DebugEventStatus::Success,
            payload: serde_json::from_value(json!({
                "request": { "method": "GET", "path": "/" },
                "backendResponse": { "statusCode": 200 },
                "debugSteps": steps,
            }))
            .unwrap(),
        };
        DebugResponse::from_event(&event)
    }

    #[test]
    fn test_empty_timeline_has_only_anchors() {
        let timeline = Timeline::build(&response(json!([])), &PolicyCatalog::new());
        assert_eq!(
            timeline.modes(),
            vec![
                TimelineMode::ClientApp,
                TimelineMode::RequestInput,
                TimelineMode::RequestOutput,
                TimelineMode::BackendTarget,
                TimelineMode::ResponseInput,
                TimelineMode::ResponseOutput,
                TimelineMode::ClientApp,
            ]
        );
    }

    #[test]
    fn test_policy_entries() {
        let response = response(json!([
            {
                "policyId": "key-less", "policyInstanceId": "1", "scope": "ON_REQUEST",
                "status": "COMPLETED", "stage": "PLAN", "duration": 2_500_000, "result": {}
            },
            {
                "policyId": "transform-headers", "policyInstanceId": "2", "scope": "ON_REQUEST",
                "status": "SKIPPED", "stage": "API", "duration": 0, "result": {},
                "condition": "{#request.headers['x'] != null}"
            },
            {
                "policyId": "policy-assign-content", "policyInstanceId": "3",
                "scope": "ON_RESPONSE_CONTENT", "status": "COMPLETED", "stage": "API",
                "duration": 1_000_000, "result": { "body": "{}" }
            }
        ]));
        let timeline = Timeline::build(&response, &PolicyCatalog::new());

        assert_eq!(timeline.len(), 10);
        let keyless = timeline.get(2).unwrap();
        assert_eq!(keyless.mode, TimelineMode::RequestPolicy);
        assert_eq!(keyless.title(), "Plan > Header  key-less");
        assert_eq!(keyless.policy.as_ref().unwrap().duration_ms, 2.5);

        let skipped = timeline.get(3).unwrap();
        assert!(!skipped.clickable);
        assert!(timeline.inspect(&response, 3).is_none());

        let content = timeline.get(7).unwrap();
        assert_eq!(content.mode, TimelineMode::ResponsePolicy);
        assert_eq!(content.title(), "Api > Body  policy-assign-content");
    }

    #[test]
    fn test_inspect_policy_step_shows_its_output() {
        let response = response(json!([
            {
                "policyId": "policy-assign-attributes", "policyInstanceId": "1",
                "scope": "ON_REQUEST", "status": "COMPLETED", "duration": 1,
                "result": { "attributes": { "dev": "Gaetan" } }
            }
        ]));
        let timeline = Timeline::build(&response, &PolicyCatalog::new());

        let inspection = timeline.inspect(&response, 2).unwrap();
        assert_eq!(inspection.phase, Phase::Request);
        let attributes = inspection
            .tree
            .iter()
            .find(|n| n.name == ATTRIBUTES_GROUP)
            .unwrap();
        let rows = attributes.children[0].table_rows();
        assert_eq!(rows[0].key, "dev");
        assert_eq!(rows[0].output.as_deref(), Some("Gaetan"));
    }

    #[test]
    fn test_anchor_selection() {
        let response = response(json!([]));
        let timeline = Timeline::build(&response, &PolicyCatalog::new());

        assert!(timeline.inspect(&response, 0).is_none());
        assert!(timeline.inspect(&response, 3).is_none());
        assert!(timeline.inspect(&response, 99).is_none());

        let request_input = timeline.inspect(&response, 1).unwrap();
        assert!(!request_input.tree.is_empty());
        let response_output = timeline.inspect(&response, 5).unwrap();
        assert_eq!(response_output.phase, Phase::Response);
    }

    #[test]
    fn test_range_selection() {
        let response = response(json!([
            {
                "policyId": "a", "policyInstanceId": "1", "scope": "ON_REQUEST",
                "status": "COMPLETED", "duration": 1, "result": { "method": "POST" }
            },
            {
                "policyId": "b", "policyInstanceId": "2", "scope": "ON_REQUEST",
                "status": "COMPLETED", "duration": 1, "result": { "path": "/v2" }
            },
            {
                "policyId": "c", "policyInstanceId": "3", "scope": "ON_RESPONSE",
                "status": "COMPLETED", "duration": 1, "result": {}
            }
        ]));
        let timeline = Timeline::build(&response, &PolicyCatalog::new());

        let overview = timeline.inspect_range(&response, 3, 2).unwrap();
        let rows = overview.tree.iter().find(|n| n.name == "HTTP properties").unwrap().children[0]
            .table_rows();
        let changed: Vec<&str> = rows
            .iter()
            .filter(|r| r.diff.is_some())
            .map(|r| r.key.as_str())
            .collect();
        assert_eq!(changed, vec!["method", "path"]);

        // Request and response steps cannot be mixed
        assert!(timeline.inspect_range(&response, 2, 7).is_none());
    }

    #[test]
    fn test_range_bounds_must_be_clickable() {
        let response = response(json!([
            {
                "policyId": "a", "policyInstanceId": "1", "scope": "ON_REQUEST",
                "status": "COMPLETED", "duration": 1, "result": { "method": "POST" }
            },
            {
                "policyId": "b", "policyInstanceId": "2", "scope": "ON_REQUEST",
                "status": "SKIPPED", "duration": 0, "result": {}
            },
            {
                "policyId": "c", "policyInstanceId": "3", "scope": "ON_REQUEST",
                "status": "COMPLETED", "duration": 1, "result": { "path": "/v2" }
            }
        ]));
        let timeline = Timeline::build(&response, &PolicyCatalog::new());
        assert!(!timeline.get(3).unwrap().clickable);

        assert!(timeline.inspect_range(&response, 2, 3).is_none());
        assert!(timeline.inspect_range(&response, 3, 4).is_none());
        assert!(timeline.inspect_range(&response, 3, 3).is_none());

        // A skipped step inside the range is fine
        assert!(timeline.inspect_range(&response, 2, 4).is_some());
    }
}
