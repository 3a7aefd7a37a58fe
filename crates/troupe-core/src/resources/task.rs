// Task resource: a unit of work assigned to an agent by the task controller

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{default_api_version, Resource, ResourceType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Where a task is currently running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskAssignment {
    pub team_name: String,
    pub role_name: String,
    pub agent_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskStatus {
    pub name: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<TaskAssignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaskResource {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "TaskResource::kind_name")]
    pub kind: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub spec: TaskSpec,
    pub status: TaskStatus,
}

impl TaskResource {
    fn kind_name() -> String {
        Self::KIND.to_string()
    }
}

impl Resource for TaskResource {
    const KIND: &'static str = "Task";

    type Spec = TaskSpec;

    fn resource_type() -> ResourceType {
        ResourceType::Task
    }

    fn name(&self) -> &str {
        &self.spec.name
    }

    fn spec_name(spec: &TaskSpec) -> &str {
        &spec.name
    }

    fn initial_state(spec: TaskSpec) -> Self {
        let status = TaskStatus {
            name: spec.name.clone(),
            status: "pending".to_string(),
            assignment: None,
        };
        Self {
            api_version: default_api_version(),
            kind: Self::kind_name(),
            metadata: HashMap::new(),
            spec,
            status,
        }
    }

    fn set_spec(&mut self, spec: TaskSpec) {
        self.spec = spec;
    }
}
