// Identity resource: a persona that team roles are staffed with

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{default_api_version, Resource, ResourceType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IdentitySpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IdentityStatus {
    pub name: String,
    /// active | ...
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IdentityResource {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "IdentityResource::kind_name")]
    pub kind: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub spec: IdentitySpec,
    pub status: IdentityStatus,
}

impl IdentityResource {
    fn kind_name() -> String {
        Self::KIND.to_string()
    }
}

impl Resource for IdentityResource {
    const KIND: &'static str = "Identity";

    type Spec = IdentitySpec;

    fn resource_type() -> ResourceType {
        ResourceType::Identity
    }

    fn name(&self) -> &str {
        &self.spec.name
    }

    fn spec_name(spec: &IdentitySpec) -> &str {
        &spec.name
    }

    fn initial_state(spec: IdentitySpec) -> Self {
        let status = IdentityStatus {
            name: spec.name.clone(),
            status: "active".to_string(),
        };
        Self {
            api_version: default_api_version(),
            kind: Self::kind_name(),
            metadata: HashMap::new(),
            spec,
            status,
        }
    }

    fn set_spec(&mut self, spec: IdentitySpec) {
        self.spec = spec;
    }
}
