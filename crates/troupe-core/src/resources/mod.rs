// Declarative resource model
//
// Every persisted resource carries the api_version/kind/metadata envelope and
// splits into a spec (operator intent) and a status (observed state). Specs
// are written by the HTTP surface; statuses are only written by status ingest.

pub mod agent;
pub mod identity;
pub mod task;
pub mod team;
pub mod workflow;
pub mod workspace;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, Result};

pub use agent::{AgentCapabilities, AgentContainer, AgentResource, AgentSpec, AgentStatus};
pub use identity::{IdentityResource, IdentitySpec, IdentityStatus};
pub use task::{TaskAssignment, TaskResource, TaskSpec, TaskStatus};
pub use team::{Layout, Member, Role, TeamResource, TeamSpec, TeamStatus, TeamWorkflow};
pub use workflow::{
    StepRunConfig, WorkflowDerivedState, WorkflowResource, WorkflowSpec, WorkflowStatus,
    WorkflowStep,
};
pub use workspace::{GithubWorkspace, WorkspaceResource, WorkspaceSpec, WorkspaceStatus};

pub const API_VERSION: &str = "v0.1";

pub(crate) fn default_api_version() -> String {
    API_VERSION.to_string()
}

/// The kinds of resources stored under the registry root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ResourceType {
    #[serde(rename = "AGENT")]
    Agent,
    #[serde(rename = "IDENTITY")]
    Identity,
    #[serde(rename = "TEAM")]
    Team,
    #[serde(rename = "WORKFLOW")]
    Workflow,
    #[serde(rename = "TASK")]
    Task,
    #[serde(rename = "WORKSPACE")]
    Workspace,
}

impl ResourceType {
    /// The path segment used for this kind under the registry root
    pub fn key_prefix(&self) -> &'static str {
        match self {
            ResourceType::Agent => "agents",
            ResourceType::Identity => "identities",
            ResourceType::Team => "teams",
            ResourceType::Workflow => "workflows",
            ResourceType::Task => "tasks",
            ResourceType::Workspace => "workspaces",
        }
    }

    pub fn from_key_prefix(prefix: &str) -> Result<Self> {
        match prefix {
            "agents" => Ok(ResourceType::Agent),
            "identities" => Ok(ResourceType::Identity),
            "teams" => Ok(ResourceType::Team),
            "workflows" => Ok(ResourceType::Workflow),
            "tasks" => Ok(ResourceType::Task),
            "workspaces" => Ok(ResourceType::Workspace),
            other => Err(Error::invalid_event(format!(
                "unknown resource key prefix '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceType::Agent => "AGENT",
            ResourceType::Identity => "IDENTITY",
            ResourceType::Team => "TEAM",
            ResourceType::Workflow => "WORKFLOW",
            ResourceType::Task => "TASK",
            ResourceType::Workspace => "WORKSPACE",
        };
        f.write_str(s)
    }
}

/// A storable resource kind: names its registry prefix, builds its initial
/// state from a spec, and lets the registry swap specs while preserving status
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: &'static str;

    type Spec: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    fn resource_type() -> ResourceType;

    fn name(&self) -> &str;

    fn spec_name(spec: &Self::Spec) -> &str;

    /// Construct the resource as it should first be persisted
    fn initial_state(spec: Self::Spec) -> Self;

    /// Replace the spec, leaving the status untouched
    fn set_spec(&mut self, spec: Self::Spec);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_prefix_round_trips_for_every_kind() {
        for rt in [
            ResourceType::Agent,
            ResourceType::Identity,
            ResourceType::Team,
            ResourceType::Workflow,
            ResourceType::Task,
            ResourceType::Workspace,
        ] {
            assert_eq!(ResourceType::from_key_prefix(rt.key_prefix()).unwrap(), rt);
        }
    }

    #[test]
    fn unknown_prefix_is_invalid_event() {
        let err = ResourceType::from_key_prefix("gadgets").unwrap_err();
        assert!(matches!(err, Error::InvalidEvent(_)));
    }

    #[test]
    fn resource_type_serializes_screaming() {
        let json = serde_json::to_string(&ResourceType::Agent).unwrap();
        assert_eq!(json, "\"AGENT\"");
    }
}
