// Per-kind informers
//
// An informer keeps a local cache of one resource kind, seeded by a list on
// setup and kept current by the raw watcher. Event listeners fire on the
// watcher context after the cache has been updated, so a listener that reads
// the cache sees the state implied by its event.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use troupe_core::resources::Resource;
use troupe_core::{ResourceEvent, ResourceType, Result};
use troupe_storage::Registry;

use crate::watcher::{ListenerId, ResourceWatcher};

pub type InformerListener = Box<dyn Fn(&ResourceEvent) + Send + Sync>;

pub struct Informer<R: Resource> {
    cache: Arc<RwLock<HashMap<String, R>>>,
    registry: Registry<R>,
    watcher: Arc<ResourceWatcher>,
    namespace: String,
    /// Kinds forwarded to event listeners; always includes this informer's
    /// own kind, reactors may ask for more (e.g. agent deletions).
    forward_types: Vec<ResourceType>,
    event_listeners: Arc<Mutex<Vec<InformerListener>>>,
    watch_registration: Mutex<Option<ListenerId>>,
}

impl<R: Resource> Informer<R> {
    pub fn new(registry: Registry<R>, watcher: Arc<ResourceWatcher>, namespace: &str) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            registry,
            watcher,
            namespace: namespace.to_string(),
            forward_types: vec![R::resource_type()],
            event_listeners: Arc::new(Mutex::new(Vec::new())),
            watch_registration: Mutex::new(None),
        }
    }

    /// Also forward events of `resource_type` to listeners (cache untouched)
    pub fn forwarding(mut self, resource_type: ResourceType) -> Self {
        if !self.forward_types.contains(&resource_type) {
            self.forward_types.push(resource_type);
        }
        self
    }

    /// Seed the cache and subscribe to the watcher
    pub async fn setup(&self) -> Result<()> {
        let resources = self.registry.list(&self.namespace).await?;
        {
            let mut cache = self.cache.write();
            cache.clear();
            for resource in resources {
                cache.insert(resource.name().to_string(), resource);
            }
        }
        tracing::debug!(
            kind = R::KIND,
            seeded = self.cache.read().len(),
            "informer cache seeded"
        );

        let cache = self.cache.clone();
        let listeners = self.event_listeners.clone();
        let namespace = self.namespace.clone();
        let forward_types = self.forward_types.clone();
        let id = self.watcher.add_listener(Box::new(move |event| {
            handle_event::<R>(&cache, &listeners, &namespace, &forward_types, event);
            Ok(())
        }));
        *self.watch_registration.lock() = Some(id);
        Ok(())
    }

    /// Unsubscribe from the watcher
    pub fn teardown(&self) {
        if let Some(id) = self.watch_registration.lock().take() {
            self.watcher.remove_listener(id);
        }
    }

    /// Snapshot of the cached resources
    pub fn list_resources(&self) -> Vec<R> {
        self.cache.read().values().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<R> {
        self.cache.read().get(name).cloned()
    }

    pub fn add_event_listener(&self, listener: InformerListener) {
        self.event_listeners.lock().push(listener);
    }
}

fn handle_event<R: Resource>(
    cache: &RwLock<HashMap<String, R>>,
    listeners: &Mutex<Vec<InformerListener>>,
    namespace: &str,
    forward_types: &[ResourceType],
    event: &ResourceEvent,
) {
    if event.namespace() != namespace {
        return;
    }

    if event.resource_type() == R::resource_type() {
        match event {
            ResourceEvent::Put(put) => {
                match serde_json::from_value::<R>(put.resource.clone()) {
                    Ok(resource) => {
                        cache.write().insert(put.name.clone(), resource);
                    }
                    Err(e) => {
                        tracing::warn!(
                            kind = R::KIND,
                            name = %put.name,
                            "informer could not parse resource from event: {e}"
                        );
                        return;
                    }
                }
            }
            ResourceEvent::Delete(delete) => {
                cache.write().remove(&delete.name);
            }
        }
    } else if !forward_types.contains(&event.resource_type()) {
        return;
    }

    for listener in listeners.lock().iter() {
        listener(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use troupe_core::resources::{AgentSpec, TaskResource, TaskSpec};
    use troupe_core::DEFAULT_NAMESPACE;
    use troupe_storage::{AgentRegistry, KvStore, TaskRegistry};

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    fn task_spec(name: &str) -> TaskSpec {
        TaskSpec {
            name: name.to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn cache_converges_with_store_state() {
        let kv = KvStore::in_memory();
        let registry = TaskRegistry::new(kv.clone());
        let watcher = Arc::new(ResourceWatcher::new(kv.clone()));
        watcher.start();

        // Pre-existing resource is picked up by the seed list
        registry.create(task_spec("t1"), DEFAULT_NAMESPACE).await.unwrap();

        let informer = Informer::<TaskResource>::new(registry.clone(), watcher.clone(), "default");
        informer.setup().await.unwrap();
        assert_eq!(informer.list_resources().len(), 1);

        // Create, update, delete flow through the watch into the cache
        registry.create(task_spec("t2"), DEFAULT_NAMESPACE).await.unwrap();
        registry.create(task_spec("t3"), DEFAULT_NAMESPACE).await.unwrap();
        settle().await;
        assert_eq!(informer.list_resources().len(), 3);

        let mut updated = task_spec("t2");
        updated.description = "revised".to_string();
        registry.update(updated, DEFAULT_NAMESPACE).await.unwrap();
        registry.delete("t1", DEFAULT_NAMESPACE).await.unwrap();
        settle().await;

        let cached = informer.list_resources();
        assert_eq!(cached.len(), 2);
        assert_eq!(
            informer.get("t2").unwrap().spec.description,
            "revised".to_string()
        );
        assert!(informer.get("t1").is_none());

        watcher.stop().await;
    }

    #[tokio::test]
    async fn listeners_see_one_event_per_transition_in_order() {
        let kv = KvStore::in_memory();
        let registry = TaskRegistry::new(kv.clone());
        let watcher = Arc::new(ResourceWatcher::new(kv.clone()));
        watcher.start();

        let informer = Informer::<TaskResource>::new(registry.clone(), watcher.clone(), "default");
        informer.setup().await.unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        informer.add_event_listener(Box::new(move |event| {
            let kind = if event.is_delete() { "DELETE" } else { "PUT" };
            sink.lock().push(format!("{kind} {}", event.name()));
        }));

        registry.create(task_spec("t1"), DEFAULT_NAMESPACE).await.unwrap();
        let mut updated = task_spec("t1");
        updated.description = "v2".to_string();
        registry.update(updated, DEFAULT_NAMESPACE).await.unwrap();
        registry.delete("t1", DEFAULT_NAMESPACE).await.unwrap();
        settle().await;

        assert_eq!(
            *events.lock(),
            vec!["PUT t1", "PUT t1", "DELETE t1"]
        );
        watcher.stop().await;
    }

    #[tokio::test]
    async fn forwarded_kinds_reach_listeners_without_touching_cache() {
        let kv = KvStore::in_memory();
        let tasks = TaskRegistry::new(kv.clone());
        let agents = AgentRegistry::new(kv.clone());
        let watcher = Arc::new(ResourceWatcher::new(kv.clone()));
        watcher.start();

        let informer = Informer::<TaskResource>::new(tasks, watcher.clone(), "default")
            .forwarding(ResourceType::Agent);
        informer.setup().await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        informer.add_event_listener(Box::new(move |event| {
            sink.lock().push(event.resource_type());
        }));

        agents
            .create(
                AgentSpec {
                    name: "alice".to_string(),
                    image: "img".to_string(),
                    capabilities: Default::default(),
                },
                DEFAULT_NAMESPACE,
            )
            .await
            .unwrap();
        settle().await;

        assert_eq!(*seen.lock(), vec![ResourceType::Agent]);
        assert!(informer.list_resources().is_empty());
        watcher.stop().await;
    }
}
