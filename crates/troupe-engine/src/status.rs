// Status ingest
//
// Agent runtimes push status events; this is the only writer of resource
// statuses. PUT replaces the agent's status wholesale (host_ip injected from
// the request peer); DELETE idempotently parks the status at "deleted".

use troupe_core::resources::AgentStatus;
use troupe_core::{Error, Result, StatusEvent};
use troupe_storage::AgentRegistry;

const AGENT_RESOURCE_TYPE: &str = "AGENT";

#[derive(Clone)]
pub struct StatusIngest {
    agents: AgentRegistry,
}

impl StatusIngest {
    pub fn new(agents: AgentRegistry) -> Self {
        Self { agents }
    }

    pub async fn apply(&self, event: StatusEvent) -> Result<()> {
        if event.resource_type() != AGENT_RESOURCE_TYPE {
            return Err(Error::invalid_event(format!(
                "status update for unknown resource type '{}'",
                event.resource_type()
            )));
        }

        match event {
            StatusEvent::Put(put) => {
                // NotFound bubbles to the caller: an unknown agent cannot
                // accept a status
                let mut agent = self.agents.get(&put.name, &put.namespace).await?;
                let mut status: AgentStatus = serde_json::from_value(put.status)
                    .map_err(|e| Error::invalid_event(format!("bad agent status: {e}")))?;
                status.host_ip = put.host_ip;
                agent.status = status;
                self.agents.put(&agent, &put.namespace).await?;
                tracing::debug!(agent = %put.name, "applied agent status update");
                Ok(())
            }
            StatusEvent::Delete(delete) => {
                match self.agents.get(&delete.name, &delete.namespace).await {
                    Ok(mut agent) => {
                        agent.status = AgentStatus::deleted(&delete.name);
                        self.agents.put(&agent, &delete.namespace).await?;
                        tracing::debug!(agent = %delete.name, "marked agent deleted");
                        Ok(())
                    }
                    // Already gone: deletion is idempotent
                    Err(e) if e.is_not_found() => Ok(()),
                    Err(e) => Err(e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use troupe_core::events::{DeleteStatusEvent, PutStatusEvent};
    use troupe_core::resources::AgentSpec;
    use troupe_core::DEFAULT_NAMESPACE;
    use troupe_storage::KvStore;

    fn spec(name: &str) -> AgentSpec {
        AgentSpec {
            name: name.to_string(),
            image: "img".to_string(),
            capabilities: Default::default(),
        }
    }

    fn put_event(name: &str, status: serde_json::Value) -> StatusEvent {
        StatusEvent::Put(PutStatusEvent {
            host_ip: "10.0.0.9".to_string(),
            resource_type: "AGENT".to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            name: name.to_string(),
            status,
        })
    }

    #[tokio::test]
    async fn put_overwrites_status_and_injects_host_ip() {
        let registry = AgentRegistry::new(KvStore::in_memory());
        registry.create(spec("alice"), DEFAULT_NAMESPACE).await.unwrap();

        let ingest = StatusIngest::new(registry.clone());
        ingest
            .apply(put_event(
                "alice",
                serde_json::json!({"name": "alice", "status": "running"}),
            ))
            .await
            .unwrap();

        let agent = registry.get("alice", DEFAULT_NAMESPACE).await.unwrap();
        assert_eq!(agent.status.status, "running");
        assert_eq!(agent.status.host_ip, "10.0.0.9");
        // Spec untouched
        assert_eq!(agent.spec, spec("alice"));
    }

    #[tokio::test]
    async fn put_for_unknown_agent_is_not_found() {
        let ingest = StatusIngest::new(AgentRegistry::new(KvStore::in_memory()));
        let err = ingest
            .apply(put_event(
                "ghost",
                serde_json::json!({"name": "ghost", "status": "running"}),
            ))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn malformed_status_is_invalid_event() {
        let registry = AgentRegistry::new(KvStore::in_memory());
        registry.create(spec("alice"), DEFAULT_NAMESPACE).await.unwrap();

        let ingest = StatusIngest::new(registry);
        let err = ingest
            .apply(put_event("alice", serde_json::json!({"status": 42})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEvent(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let registry = AgentRegistry::new(KvStore::in_memory());
        registry.create(spec("alice"), DEFAULT_NAMESPACE).await.unwrap();

        let ingest = StatusIngest::new(registry.clone());
        let delete = StatusEvent::Delete(DeleteStatusEvent {
            host_ip: String::new(),
            resource_type: "AGENT".to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            name: "alice".to_string(),
        });
        ingest.apply(delete.clone()).await.unwrap();
        assert_eq!(
            registry
                .get("alice", DEFAULT_NAMESPACE)
                .await
                .unwrap()
                .status
                .status,
            "deleted"
        );

        // And again for an agent that no longer exists
        registry.delete("alice", DEFAULT_NAMESPACE).await.unwrap();
        ingest.apply(delete).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_resource_type_is_rejected() {
        let ingest = StatusIngest::new(AgentRegistry::new(KvStore::in_memory()));
        let err = ingest
            .apply(StatusEvent::Put(PutStatusEvent {
                host_ip: String::new(),
                resource_type: "TOASTER".to_string(),
                namespace: DEFAULT_NAMESPACE.to_string(),
                name: "x".to_string(),
                status: serde_json::json!({}),
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEvent(_)));
    }
}
