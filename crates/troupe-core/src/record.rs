// Workflow execution records
//
// A record snapshots the spec at initiation time and accumulates context,
// outputs, errors and per-step run status as the router processes reports.
// The snapshot is frozen after creation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::TypedResult;
use crate::resources::WorkflowSpec;

/// The outcome of one run of a step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StepResult {
    #[serde(default)]
    pub outputs: BTreeMap<String, TypedResult>,
    /// Non-empty when the run failed
    #[serde(default)]
    pub error: String,
}

/// Accumulated run history for a step within one record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StepRunStatus {
    /// The number of times the step has been triggered and reported
    #[serde(default)]
    pub runs: u32,
    #[serde(default)]
    pub results: Vec<StepResult>,
}

impl StepRunStatus {
    pub fn last_result(&self) -> Option<&StepResult> {
        self.results.last()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WorkflowRecord {
    /// Unique per workflow; doubles as the routing id on workflow messages
    pub id: String,
    /// The name of the workflow
    pub name: String,
    /// The spec as it was when the workflow was initiated; never mutated
    pub spec: WorkflowSpec,
    /// The associated workspace, if any
    #[serde(default)]
    pub workspace: String,
    /// Final outputs keyed by declared workflow output name
    #[serde(default)]
    pub outputs: BTreeMap<String, TypedResult>,
    /// Final errors keyed by declared workflow output name
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
    /// Values addressable by steps: "workflow.<input>" and "<step>.<output>"
    #[serde(default)]
    pub context: BTreeMap<String, TypedResult>,
    #[serde(default)]
    pub run_status: BTreeMap<String, StepRunStatus>,
}

impl WorkflowRecord {
    pub fn new(
        spec: WorkflowSpec,
        context: BTreeMap<String, TypedResult>,
        workspace: impl Into<String>,
    ) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), spec, context, workspace)
    }

    /// Build a record with a caller-supplied id. The router derives the id
    /// from the initiate message so redelivered messages collide instead of
    /// spawning duplicate executions.
    pub fn with_id(
        id: impl Into<String>,
        spec: WorkflowSpec,
        context: BTreeMap<String, TypedResult>,
        workspace: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: spec.name.clone(),
            spec,
            workspace: workspace.into(),
            outputs: BTreeMap::new(),
            errors: BTreeMap::new(),
            context,
            run_status: BTreeMap::new(),
        }
    }

    /// Whether every declared workflow output has either a value or an error
    pub fn is_complete(&self) -> bool {
        self.spec
            .outputs
            .iter()
            .all(|o| self.outputs.contains_key(&o.name) || self.errors.contains_key(&o.name))
    }

    pub fn runs_for(&self, step: &str) -> u32 {
        self.run_status.get(step).map(|s| s.runs).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TypedArgument;
    use crate::resources::WorkflowDerivedState;

    fn spec_with_outputs(outputs: &[&str]) -> WorkflowSpec {
        WorkflowSpec {
            name: "wf".to_string(),
            description: String::new(),
            team: "red".to_string(),
            inputs: vec![],
            outputs: outputs.iter().map(|o| TypedArgument::text(*o)).collect(),
            steps: BTreeMap::new(),
            derived_state: WorkflowDerivedState::default(),
        }
    }

    #[test]
    fn completion_requires_every_declared_output() {
        let mut record = WorkflowRecord::new(spec_with_outputs(&["a", "b"]), BTreeMap::new(), "");
        assert!(!record.is_complete());

        record
            .outputs
            .insert("a".to_string(), TypedResult::text("done"));
        assert!(!record.is_complete());

        record.errors.insert("b".to_string(), "boom".to_string());
        assert!(record.is_complete());
    }

    #[test]
    fn record_ids_are_unique() {
        let a = WorkflowRecord::new(spec_with_outputs(&[]), BTreeMap::new(), "");
        let b = WorkflowRecord::new(spec_with_outputs(&[]), BTreeMap::new(), "");
        assert_ne!(a.id, b.id);
    }
}
