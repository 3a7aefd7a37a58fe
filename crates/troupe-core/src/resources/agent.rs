// Agent resource: a remote worker process addressable by name

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{default_api_version, Resource, ResourceType};

/// Capability flags granted to an agent container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AgentCapabilities {
    /// Whether the agent has outbound network access
    #[serde(default)]
    pub network_access: bool,
    /// Whether the agent can message other agents
    #[serde(default)]
    pub messaging_access: bool,
}

/// Declared configuration of an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AgentSpec {
    /// A name to identify the agent, unique per namespace
    pub name: String,
    /// The container image to run for this agent
    pub image: String,
    #[serde(default)]
    pub capabilities: AgentCapabilities,
}

/// The container observed to be running an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AgentContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    pub capabilities: AgentCapabilities,
}

/// Observed state of an agent, written only by status ingest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AgentStatus {
    pub name: String,
    /// pending | running | deleted | ...
    pub status: String,
    #[serde(default)]
    pub host_ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<AgentContainer>,
}

impl AgentStatus {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: "pending".to_string(),
            host_ip: String::new(),
            container: None,
        }
    }

    pub fn deleted(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: "deleted".to_string(),
            host_ip: String::new(),
            container: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AgentResource {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "AgentResource::kind_name")]
    pub kind: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub spec: AgentSpec,
    pub status: AgentStatus,
}

impl AgentResource {
    fn kind_name() -> String {
        Self::KIND.to_string()
    }
}

impl Resource for AgentResource {
    const KIND: &'static str = "Agent";

    type Spec = AgentSpec;

    fn resource_type() -> ResourceType {
        ResourceType::Agent
    }

    fn name(&self) -> &str {
        &self.spec.name
    }

    fn spec_name(spec: &AgentSpec) -> &str {
        &spec.name
    }

    fn initial_state(spec: AgentSpec) -> Self {
        let status = AgentStatus::pending(&spec.name);
        Self {
            api_version: default_api_version(),
            kind: Self::kind_name(),
            metadata: HashMap::new(),
            spec,
            status,
        }
    }

    fn set_spec(&mut self, spec: AgentSpec) {
        self.spec = spec;
    }
}
