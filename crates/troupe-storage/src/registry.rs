// Typed resource registry over the KV store
//
// One registry per resource kind, all with the same shape: optimistic
// create, namespaced keys, prefix-scan list, spec-replacing update that
// preserves status. Updates are blind puts (last writer wins on the spec);
// the informer reconverges readers afterwards.

use std::marker::PhantomData;

use troupe_core::resources::{Resource, ResourceType};
use troupe_core::serialization::{deserialize, serialize};
use troupe_core::{Error, Result};

use crate::kv::KvStore;

/// Root prefix for all declarative resources
pub const REGISTRY_ROOT: &str = "/resources";

pub fn resource_key(resource_type: ResourceType, namespace: &str, name: &str) -> String {
    format!(
        "{REGISTRY_ROOT}/{}/{namespace}/{name}",
        resource_type.key_prefix()
    )
}

pub fn resource_prefix(resource_type: ResourceType, namespace: &str) -> String {
    format!("{REGISTRY_ROOT}/{}/{namespace}/", resource_type.key_prefix())
}

#[derive(Clone)]
pub struct Registry<R: Resource> {
    kv: KvStore,
    _kind: PhantomData<fn() -> R>,
}

impl<R: Resource> Registry<R> {
    pub fn new(kv: KvStore) -> Self {
        Self {
            kv,
            _kind: PhantomData,
        }
    }

    fn key(&self, name: &str, namespace: &str) -> String {
        resource_key(R::resource_type(), namespace, name)
    }

    pub async fn create(&self, spec: R::Spec, namespace: &str) -> Result<R> {
        let name = R::spec_name(&spec).to_string();
        let resource = R::initial_state(spec);
        let created = self
            .kv
            .put_if_absent(&self.key(&name, namespace), serialize(&resource)?)
            .await?;
        if !created {
            return Err(Error::already_exists(format!("{} '{name}'", R::KIND)));
        }
        tracing::debug!(kind = R::KIND, name = %name, "created resource");
        Ok(resource)
    }

    pub async fn get(&self, name: &str, namespace: &str) -> Result<R> {
        let data = self
            .kv
            .get(&self.key(name, namespace))
            .await?
            .ok_or_else(|| Error::not_found(format!("{} '{name}'", R::KIND)))?;
        deserialize(&data)
    }

    pub async fn list(&self, namespace: &str) -> Result<Vec<R>> {
        let prefix = resource_prefix(R::resource_type(), namespace);
        let entries = self.kv.get_prefix(&prefix).await?;
        let mut resources = Vec::with_capacity(entries.len());
        for (key, data) in entries {
            match deserialize::<R>(&data) {
                Ok(resource) => resources.push(resource),
                Err(e) => {
                    tracing::warn!(kind = R::KIND, key = %key, "skipping malformed entry: {e}");
                }
            }
        }
        Ok(resources)
    }

    /// Replace the spec of an existing resource, preserving its status
    pub async fn update(&self, spec: R::Spec, namespace: &str) -> Result<R> {
        let name = R::spec_name(&spec).to_string();
        let mut resource = self.get(&name, namespace).await?;
        resource.set_spec(spec);
        self.kv
            .put(&self.key(&name, namespace), serialize(&resource)?)
            .await?;
        tracing::debug!(kind = R::KIND, name = %name, "updated resource");
        Ok(resource)
    }

    pub async fn delete(&self, name: &str, namespace: &str) -> Result<bool> {
        let deleted = self.kv.delete(&self.key(name, namespace)).await?;
        if deleted {
            tracing::debug!(kind = R::KIND, name = %name, "deleted resource");
        }
        Ok(deleted)
    }

    /// Write a resource back as-is. Used by status ingest, which owns the
    /// status half of the document.
    pub async fn put(&self, resource: &R, namespace: &str) -> Result<()> {
        self.kv
            .put(&self.key(resource.name(), namespace), serialize(resource)?)
            .await
    }
}

use troupe_core::resources::{
    AgentResource, IdentityResource, TaskResource, TeamResource, WorkflowResource, WorkflowSpec,
    WorkspaceResource,
};

pub type AgentRegistry = Registry<AgentResource>;
pub type IdentityRegistry = Registry<IdentityResource>;
pub type TeamRegistry = Registry<TeamResource>;
pub type TaskRegistry = Registry<TaskResource>;

/// Workflow registry: same CRUD shape, but the step graph is validated and
/// the sorted order derived before anything is written. A cyclic graph never
/// reaches the store.
#[derive(Clone)]
pub struct WorkflowRegistry {
    inner: Registry<WorkflowResource>,
}

impl WorkflowRegistry {
    pub fn new(kv: KvStore) -> Self {
        Self {
            inner: Registry::new(kv),
        }
    }

    pub async fn create(&self, mut spec: WorkflowSpec, namespace: &str) -> Result<WorkflowResource> {
        spec.update_derived_state()?;
        self.inner.create(spec, namespace).await
    }

    pub async fn get(&self, name: &str, namespace: &str) -> Result<WorkflowResource> {
        self.inner.get(name, namespace).await
    }

    pub async fn list(&self, namespace: &str) -> Result<Vec<WorkflowResource>> {
        self.inner.list(namespace).await
    }

    pub async fn update(&self, mut spec: WorkflowSpec, namespace: &str) -> Result<WorkflowResource> {
        spec.update_derived_state()?;
        self.inner.update(spec, namespace).await
    }

    pub async fn delete(&self, name: &str, namespace: &str) -> Result<bool> {
        self.inner.delete(name, namespace).await
    }
}

/// Workspace registry: workspaces are created by the integration adapter,
/// which wants create-or-replace semantics.
#[derive(Clone)]
pub struct WorkspaceRegistry {
    inner: Registry<WorkspaceResource>,
}

impl WorkspaceRegistry {
    pub fn new(kv: KvStore) -> Self {
        Self {
            inner: Registry::new(kv),
        }
    }

    pub async fn get(&self, name: &str, namespace: &str) -> Result<WorkspaceResource> {
        self.inner.get(name, namespace).await
    }

    pub async fn list(&self, namespace: &str) -> Result<Vec<WorkspaceResource>> {
        self.inner.list(namespace).await
    }

    pub async fn update_or_create(
        &self,
        workspace: WorkspaceResource,
        namespace: &str,
    ) -> Result<WorkspaceResource> {
        self.inner.put(&workspace, namespace).await?;
        tracing::debug!(name = %workspace.spec.name, "upserted workspace");
        Ok(workspace)
    }

    pub async fn delete(&self, name: &str, namespace: &str) -> Result<bool> {
        self.inner.delete(name, namespace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use troupe_core::resources::{AgentSpec, StepRunConfig, WorkflowStep};
    use troupe_core::DEFAULT_NAMESPACE;

    fn agent_spec(name: &str) -> AgentSpec {
        AgentSpec {
            name: name.to_string(),
            image: "troupe/agent:latest".to_string(),
            capabilities: Default::default(),
        }
    }

    #[tokio::test]
    async fn create_then_get_returns_initial_status() {
        let registry = AgentRegistry::new(KvStore::in_memory());
        registry
            .create(agent_spec("alice"), DEFAULT_NAMESPACE)
            .await
            .unwrap();

        let fetched = registry.get("alice", DEFAULT_NAMESPACE).await.unwrap();
        assert_eq!(fetched.spec, agent_spec("alice"));
        assert_eq!(fetched.status.status, "pending");
    }

    #[tokio::test]
    async fn duplicate_create_is_already_exists() {
        let registry = AgentRegistry::new(KvStore::in_memory());
        registry
            .create(agent_spec("alice"), DEFAULT_NAMESPACE)
            .await
            .unwrap();
        let err = registry
            .create(agent_spec("alice"), DEFAULT_NAMESPACE)
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn concurrent_create_has_exactly_one_winner() {
        let registry = AgentRegistry::new(KvStore::in_memory());
        let a = registry.create(agent_spec("alice"), DEFAULT_NAMESPACE);
        let b = registry.create(agent_spec("alice"), DEFAULT_NAMESPACE);
        let (ra, rb) = tokio::join!(a, b);
        assert_ne!(ra.is_ok(), rb.is_ok());
        assert!(registry.get("alice", DEFAULT_NAMESPACE).await.is_ok());
    }

    #[tokio::test]
    async fn update_preserves_status() {
        let registry = AgentRegistry::new(KvStore::in_memory());
        let mut created = registry
            .create(agent_spec("alice"), DEFAULT_NAMESPACE)
            .await
            .unwrap();
        created.status.status = "running".to_string();
        registry.put(&created, DEFAULT_NAMESPACE).await.unwrap();

        let mut spec = agent_spec("alice");
        spec.image = "troupe/agent:v2".to_string();
        let updated = registry.update(spec, DEFAULT_NAMESPACE).await.unwrap();
        assert_eq!(updated.spec.image, "troupe/agent:v2");
        assert_eq!(updated.status.status, "running");
    }

    #[tokio::test]
    async fn update_of_missing_resource_is_not_found() {
        let registry = AgentRegistry::new(KvStore::in_memory());
        let err = registry
            .update(agent_spec("ghost"), DEFAULT_NAMESPACE)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let registry = AgentRegistry::new(KvStore::in_memory());
        registry.create(agent_spec("alice"), "default").await.unwrap();
        registry.create(agent_spec("alice"), "staging").await.unwrap();
        assert_eq!(registry.list("default").await.unwrap().len(), 1);
        assert!(registry.delete("alice", "staging").await.unwrap());
        assert_eq!(registry.list("default").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_entries_are_skipped_on_list() {
        let kv = KvStore::in_memory();
        let registry = AgentRegistry::new(kv.clone());
        registry
            .create(agent_spec("alice"), DEFAULT_NAMESPACE)
            .await
            .unwrap();
        kv.put(
            "/resources/agents/default/broken",
            b"not even json".to_vec(),
        )
        .await
        .unwrap();

        let listed = registry.list(DEFAULT_NAMESPACE).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    fn cyclic_workflow() -> WorkflowSpec {
        WorkflowSpec {
            name: "looped".to_string(),
            description: String::new(),
            team: "red".to_string(),
            inputs: vec![],
            outputs: vec![],
            steps: BTreeMap::from([
                (
                    "s1".to_string(),
                    WorkflowStep {
                        role: "R".to_string(),
                        action: "A".to_string(),
                        input_map: BTreeMap::from([("x".to_string(), "s2.y".to_string())]),
                        output_map: BTreeMap::new(),
                        run_config: StepRunConfig::default(),
                    },
                ),
                (
                    "s2".to_string(),
                    WorkflowStep {
                        role: "R".to_string(),
                        action: "A".to_string(),
                        input_map: BTreeMap::from([("y".to_string(), "s1.x".to_string())]),
                        output_map: BTreeMap::new(),
                        run_config: StepRunConfig::default(),
                    },
                ),
            ]),
            derived_state: Default::default(),
        }
    }

    #[tokio::test]
    async fn cyclic_workflow_create_writes_nothing() {
        let kv = KvStore::in_memory();
        let registry = WorkflowRegistry::new(kv.clone());
        let err = registry
            .create(cyclic_workflow(), DEFAULT_NAMESPACE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResource(_)));
        assert!(kv.get_prefix("/resources/workflows/").await.unwrap().is_empty());
    }
}
