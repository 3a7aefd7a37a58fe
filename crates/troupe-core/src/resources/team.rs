// Team resource: a layout of roles staffed by identity/agent pairs

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::common::TypedArgument;
use crate::error::{Error, Result};

use super::{default_api_version, Resource, ResourceType};

/// A role in the team layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub name: String,
    pub description: String,
}

/// How the team is organized: its roles and their groupings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Layout {
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Groups of roles that collaborate as peers
    #[serde(default)]
    pub peer_groups: BTreeMap<String, Vec<String>>,
    /// Groups of roles with a managing role
    #[serde(default)]
    pub management_groups: BTreeMap<String, Vec<String>>,
}

/// A role assignment: which identity and agent staff the role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Member {
    pub identity: String,
    pub agent: String,
}

/// A workflow the team declares it can execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TeamWorkflow {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<TypedArgument>,
    #[serde(default)]
    pub outputs: Vec<TypedArgument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TeamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub team_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub layout: Layout,
    /// role name -> member staffing it
    #[serde(default)]
    pub members: BTreeMap<String, Member>,
    #[serde(default)]
    pub workflows: Vec<TeamWorkflow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TeamStatus {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub members: BTreeMap<String, Member>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TeamResource {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "TeamResource::kind_name")]
    pub kind: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub spec: TeamSpec,
    pub status: TeamStatus,
}

impl TeamResource {
    fn kind_name() -> String {
        Self::KIND.to_string()
    }

    /// The member staffing `role`, checked lazily when a workflow triggers
    pub fn get_member(&self, role: &str) -> Result<&Member> {
        self.spec
            .members
            .get(role)
            .ok_or_else(|| Error::not_found(format!("member for role '{role}'")))
    }

    /// The layout description for `role`, sent to agents as role context
    pub fn get_role_description(&self, role: &str) -> Result<&str> {
        self.spec
            .layout
            .roles
            .iter()
            .find(|r| r.name == role)
            .map(|r| r.description.as_str())
            .ok_or_else(|| Error::not_found(format!("role '{role}' in team layout")))
    }
}

impl Resource for TeamResource {
    const KIND: &'static str = "Team";

    type Spec = TeamSpec;

    fn resource_type() -> ResourceType {
        ResourceType::Team
    }

    fn name(&self) -> &str {
        &self.spec.name
    }

    fn spec_name(spec: &TeamSpec) -> &str {
        &spec.name
    }

    fn initial_state(spec: TeamSpec) -> Self {
        let status = TeamStatus {
            name: spec.name.clone(),
            status: "active".to_string(),
            members: spec.members.clone(),
        };
        Self {
            api_version: default_api_version(),
            kind: Self::kind_name(),
            metadata: HashMap::new(),
            spec,
            status,
        }
    }

    fn set_spec(&mut self, spec: TeamSpec) {
        self.spec = spec;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team_with_role() -> TeamResource {
        let mut members = BTreeMap::new();
        members.insert(
            "Builder".to_string(),
            Member {
                identity: "alice".to_string(),
                agent: "agent-1".to_string(),
            },
        );
        TeamResource::initial_state(TeamSpec {
            name: "red".to_string(),
            team_type: "dev".to_string(),
            description: String::new(),
            layout: Layout {
                roles: vec![Role {
                    name: "Builder".to_string(),
                    description: "Builds features".to_string(),
                }],
                peer_groups: BTreeMap::new(),
                management_groups: BTreeMap::new(),
            },
            members,
            workflows: vec![],
        })
    }

    #[test]
    fn member_lookup_resolves_agent() {
        let team = team_with_role();
        assert_eq!(team.get_member("Builder").unwrap().agent, "agent-1");
        assert!(team.get_member("Reviewer").is_err());
    }

    #[test]
    fn role_description_comes_from_layout() {
        let team = team_with_role();
        assert_eq!(
            team.get_role_description("Builder").unwrap(),
            "Builds features"
        );
    }
}
