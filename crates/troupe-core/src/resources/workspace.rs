// Workspace resource: where a workflow's outputs land (e.g. a git branch)

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{default_api_version, Resource, ResourceType};

/// Details of a workspace backed by a GitHub App installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GithubWorkspace {
    pub installation_id: u64,
    /// "owner/repo"
    pub repository_name: String,
    pub branch_name: String,
    /// The commit the working branch is based on
    #[serde(default)]
    pub base_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WorkspaceSpec {
    pub name: String,
    /// The kind of workspace ("github")
    #[serde(rename = "kind")]
    pub workspace_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_info: Option<GithubWorkspace>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WorkspaceStatus {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WorkspaceResource {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "WorkspaceResource::kind_name")]
    pub kind: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub spec: WorkspaceSpec,
    pub status: WorkspaceStatus,
}

impl WorkspaceResource {
    fn kind_name() -> String {
        Self::KIND.to_string()
    }

    pub fn github(
        name: impl Into<String>,
        installation_id: u64,
        repository_name: impl Into<String>,
        branch_name: impl Into<String>,
        base_hash: impl Into<String>,
    ) -> Self {
        Self::initial_state(WorkspaceSpec {
            name: name.into(),
            workspace_kind: "github".to_string(),
            github_info: Some(GithubWorkspace {
                installation_id,
                repository_name: repository_name.into(),
                branch_name: branch_name.into(),
                base_hash: base_hash.into(),
            }),
        })
    }
}

impl Resource for WorkspaceResource {
    const KIND: &'static str = "Workspace";

    type Spec = WorkspaceSpec;

    fn resource_type() -> ResourceType {
        ResourceType::Workspace
    }

    fn name(&self) -> &str {
        &self.spec.name
    }

    fn spec_name(spec: &WorkspaceSpec) -> &str {
        &spec.name
    }

    fn initial_state(spec: WorkspaceSpec) -> Self {
        let status = WorkspaceStatus {
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

    fn set_spec(&mut self, spec: WorkspaceSpec) {
        self.spec = spec;
    }
}
