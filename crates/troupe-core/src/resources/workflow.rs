// Workflow resource: a declarative DAG of steps executed by a team
//
// The step graph is validated and topologically sorted when the spec is
// written; the runtime engine is driven by context-presence, so the sort is
// presentational but must agree with the graph the engine explores.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::common::TypedArgument;
use crate::error::Result;
use crate::graph::sort_dependencies;

use super::{default_api_version, Resource, ResourceType};

/// Retry configuration for a single step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StepRunConfig {
    /// How many times to re-trigger the step after a failed run
    #[serde(default)]
    pub num_retries: u32,
}

/// One node in the workflow DAG
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WorkflowStep {
    /// The team role that executes the action
    pub role: String,
    /// The action the agent runs
    pub action: String,
    /// action input name -> workflow value path ("workflow.<input>" or "<step>.<output>")
    #[serde(rename = "inputMap", default)]
    pub input_map: BTreeMap<String, String>,
    /// action output name -> declared workflow output
    #[serde(rename = "outputMap", default)]
    pub output_map: BTreeMap<String, String>,
    #[serde(rename = "runConfig", default)]
    pub run_config: StepRunConfig,
}

impl WorkflowStep {
    /// The set of upstream steps this step consumes values from.
    /// `workflow.<input>` references are not dependencies.
    pub fn dependencies(&self) -> BTreeSet<String> {
        self.input_map
            .values()
            .filter_map(|path| {
                let step = path.split('.').next().unwrap_or(path);
                (step != "workflow").then(|| step.to_string())
            })
            .collect()
    }
}

/// State derived from the spec at write time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WorkflowDerivedState {
    /// Steps in a dependency-respecting order
    #[serde(default)]
    pub sorted_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WorkflowSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// The team that executes the workflow
    pub team: String,
    #[serde(default)]
    pub inputs: Vec<TypedArgument>,
    #[serde(default)]
    pub outputs: Vec<TypedArgument>,
    #[serde(default)]
    pub steps: BTreeMap<String, WorkflowStep>,
    #[serde(default)]
    pub derived_state: WorkflowDerivedState,
}

impl WorkflowSpec {
    /// step name -> names of steps it depends on
    pub fn dependency_graph(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.steps
            .iter()
            .map(|(name, step)| (name.clone(), step.dependencies()))
            .collect()
    }

    /// Recompute `derived_state.sorted_steps`. Fails on a dependency cycle,
    /// in which case the spec must not be persisted.
    pub fn update_derived_state(&mut self) -> Result<()> {
        let sorted = sort_dependencies(&self.dependency_graph())?;
        self.derived_state = WorkflowDerivedState {
            sorted_steps: sorted,
        };
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WorkflowStatus {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WorkflowResource {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "WorkflowResource::kind_name")]
    pub kind: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub spec: WorkflowSpec,
    pub status: WorkflowStatus,
}

impl WorkflowResource {
    fn kind_name() -> String {
        Self::KIND.to_string()
    }
}

impl Resource for WorkflowResource {
    const KIND: &'static str = "Workflow";

    type Spec = WorkflowSpec;

    fn resource_type() -> ResourceType {
        ResourceType::Workflow
    }

    fn name(&self) -> &str {
        &self.spec.name
    }

    fn spec_name(spec: &WorkflowSpec) -> &str {
        &spec.name
    }

    fn initial_state(spec: WorkflowSpec) -> Self {
        let status = WorkflowStatus {
            name: spec.name.clone(),
            status: "pending".to_string(),
        };
        Self {
            api_version: default_api_version(),
            kind: Self::kind_name(),
            metadata: HashMap::new(),
            spec,
            status,
        }
    }

    fn set_spec(&mut self, spec: WorkflowSpec) {
        self.spec = spec;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(role: &str, inputs: &[(&str, &str)]) -> WorkflowStep {
        WorkflowStep {
            role: role.to_string(),
            action: "Act".to_string(),
            input_map: inputs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            output_map: BTreeMap::new(),
            run_config: StepRunConfig::default(),
        }
    }

    #[test]
    fn workflow_inputs_are_not_dependencies() {
        let s = step("R", &[("a", "workflow.q"), ("b", "s1.out")]);
        let deps = s.dependencies();
        assert_eq!(deps.len(), 1);
        assert!(deps.contains("s1"));
    }

    #[test]
    fn derived_state_sorts_steps_by_dependency() {
        let mut spec = WorkflowSpec {
            name: "wf".to_string(),
            description: String::new(),
            team: "red".to_string(),
            inputs: vec![TypedArgument::text("q")],
            outputs: vec![],
            steps: BTreeMap::from([
                ("s2".to_string(), step("R", &[("in", "s1.out")])),
                ("s1".to_string(), step("R", &[("in", "workflow.q")])),
            ]),
            derived_state: WorkflowDerivedState::default(),
        };
        spec.update_derived_state().unwrap();
        let sorted = &spec.derived_state.sorted_steps;
        let s1_pos = sorted.iter().position(|s| s == "s1").unwrap();
        let s2_pos = sorted.iter().position(|s| s == "s2").unwrap();
        assert!(s1_pos < s2_pos);
    }

    #[test]
    fn cyclic_steps_fail_derivation() {
        let mut spec = WorkflowSpec {
            name: "wf".to_string(),
            description: String::new(),
            team: "red".to_string(),
            inputs: vec![],
            outputs: vec![],
            steps: BTreeMap::from([
                ("s1".to_string(), step("R", &[("x", "s2.y")])),
                ("s2".to_string(), step("R", &[("y", "s1.x")])),
            ]),
            derived_state: WorkflowDerivedState::default(),
        };
        assert!(spec.update_derived_state().is_err());
    }
}
