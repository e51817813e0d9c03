//! # Step Accumulator
//!
//! Folds the raw policy results of one phase into cumulative snapshots: each
//! step's output is the previous output with the step's result merged on top.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::debug::event::{DebugStepRaw, PolicyScope, PolicyStage, StepError, StepStatus};
use crate::debug::snapshot::{Attributes, PhaseSnapshot};

/// A policy step together with the cumulative state after it ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDebugStep<S> {
    /// Generated per accumulation, unique within a call
    pub id: String,
    pub policy_id: String,
    pub policy_instance_id: String,
    pub scope: PolicyScope,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<PolicyStage>,
    /// Execution time in nanoseconds
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    pub output: S,
}

impl<S> PolicyDebugStep<S> {
    /// Duration converted from nanoseconds to milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.duration as f64 / 1_000_000.0
    }
}

/// Accumulate the steps of `S::PHASE` found in `steps`, in their original order.
///
/// The first snapshot is `initial` with its attributes replaced by
/// `initial_attributes`, then patched by the first result. Every following
/// snapshot is the previous one patched by the current result. Steps of the
/// other phase are ignored, so a request accumulation never sees response scopes.
///
/// A result that does not decode never drops its step: the keys that decode on
/// their own still apply and the rest are logged and skipped.
pub fn accumulate<S: PhaseSnapshot>(
    steps: &[DebugStepRaw],
    initial: &S,
    initial_attributes: &Attributes,
) -> Vec<PolicyDebugStep<S>> {
    let mut accumulated: Vec<PolicyDebugStep<S>> = Vec::new();

    for step in steps.iter().filter(|s| s.scope.phase() == S::PHASE) {
        let patch: S = decode_patch(step);

        let mut output = match accumulated.last() {
            Some(previous) => previous.output.clone(),
            None => {
                let mut base = initial.clone();
                base.set_attributes(initial_attributes.clone());
                base
            }
        };
        output.merge(&patch);

        accumulated.push(PolicyDebugStep {
            id: Uuid::new_v4().to_string(),
            policy_id: step.policy_id.clone(),
            policy_instance_id: step.policy_instance_id.clone(),
            scope: step.scope,
            status: step.status,
            stage: step.stage,
            duration: step.duration,
            condition: step.condition.clone(),
            error: step.error.clone(),
            output,
        });
    }

    debug!(
        phase = ?S::PHASE,
        steps = accumulated.len(),
        "Accumulated policy debug steps"
    );

    accumulated
}

/// Decode a step result, falling back to key-by-key decoding when the whole map is rejected
fn decode_patch<S: PhaseSnapshot>(step: &DebugStepRaw) -> S {
    let error = match S::from_result(&step.result) {
        Ok(patch) => return patch,
        Err(e) => e,
    };
    warn!(
        policy_id = %step.policy_id,
        policy_instance_id = %step.policy_instance_id,
        error = %error,
        "Malformed policy result, keeping the fields that decode"
    );

    let mut patch = S::default();
    for (key, value) in &step.result {
        let single: serde_json::Map<_, _> = [(key.clone(), value.clone())].into_iter().collect();
        match S::from_result(&single) {
            Ok(field) => patch.merge(&field),
            Err(e) => warn!(
                policy_instance_id = %step.policy_instance_id,
                key = %key,
                error = %e,
                "Skipping malformed result field"
            ),
        }
    }
    patch
}
