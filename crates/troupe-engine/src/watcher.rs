// Raw resource watcher
//
// One long-lived subscription against the registry root converts KV watch
// events into typed ResourceEvents and fans them out to listeners. Listener
// callbacks run synchronously on the watcher task: informer cache mutation
// and listener dispatch happen here, anything needing async I/O must be
// spawned by the listener itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use troupe_core::serialization::deserialize_value;
use troupe_core::{
    DeleteResourceEvent, Error, PutResourceEvent, ResourceEvent, ResourceType, Result,
};
use troupe_storage::{KvStore, WatchEvent, WatchEventKind, REGISTRY_ROOT};

/// How often watch establishment is retried before the watcher gives up
const MAX_ESTABLISH_ATTEMPTS: u32 = 10;
const BACKOFF_BASE: Duration = Duration::from_millis(200);
const BACKOFF_CAP: Duration = Duration::from_secs(10);

pub type ResourceListener = Box<dyn Fn(&ResourceEvent) -> Result<()> + Send + Sync>;

/// Identifies a registered listener so it can be removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

impl ListenerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

pub struct ResourceWatcher {
    kv: KvStore,
    listeners: Arc<Mutex<Vec<(ListenerId, ResourceListener)>>>,
    shutdown: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Exit the process when the retry budget is exhausted (operator opt-in);
    /// the default is to log and keep running degraded.
    crash_on_failure: bool,
}

impl ResourceWatcher {
    pub fn new(kv: KvStore) -> Self {
        Self {
            kv,
            listeners: Arc::new(Mutex::new(Vec::new())),
            shutdown: Arc::new(Notify::new()),
            task: Mutex::new(None),
            crash_on_failure: false,
        }
    }

    pub fn with_crash_on_failure(mut self, crash: bool) -> Self {
        self.crash_on_failure = crash;
        self
    }

    pub fn add_listener(&self, listener: ResourceListener) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.lock().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    /// Spawn the watch loop in its own task
    pub fn start(&self) {
        let kv = self.kv.clone();
        let listeners = self.listeners.clone();
        let shutdown = self.shutdown.clone();
        let crash_on_failure = self.crash_on_failure;

        let handle = tokio::spawn(async move {
            let mut attempts: u32 = 0;
            loop {
                let mut stream = match kv.watch_prefix(REGISTRY_ROOT).await {
                    Ok(stream) => {
                        attempts = 0;
                        stream
                    }
                    Err(e) => {
                        attempts += 1;
                        if attempts >= MAX_ESTABLISH_ATTEMPTS {
                            tracing::error!(
                                "resource watcher unavailable after {attempts} attempts: {e}"
                            );
                            if crash_on_failure {
                                std::process::exit(1);
                            }
                            return;
                        }
                        let delay = establish_backoff(attempts);
                        tracing::warn!(
                            attempt = attempts,
                            "could not establish resource watch, retrying in {delay:?}: {e}"
                        );
                        tokio::select! {
                            _ = shutdown.notified() => return,
                            _ = tokio::time::sleep(delay) => continue,
                        }
                    }
                };

                tracing::info!("resource watcher established on {REGISTRY_ROOT}");
                loop {
                    tokio::select! {
                        _ = shutdown.notified() => {
                            tracing::info!("resource watcher stopped");
                            return;
                        }
                        event = stream.next() => match event {
                            Some(event) => dispatch(&listeners, event),
                            None => {
                                tracing::warn!("resource watch stream ended, re-establishing");
                                break;
                            }
                        }
                    }
                }
            }
        });

        *self.task.lock() = Some(handle);
    }

    /// Cancel the watch loop and wait for it to wind down.
    /// notify_one stores a permit, so a stop issued while the loop is busy
    /// dispatching still lands on its next select.
    pub async fn stop(&self) {
        self.shutdown.notify_one();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

fn establish_backoff(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE.saturating_mul(2u32.saturating_pow(attempt.min(16)));
    let capped = exp.min(BACKOFF_CAP);
    let jitter = rand::thread_rng().gen_range(0..=capped.as_millis() as u64 / 4);
    capped + Duration::from_millis(jitter)
}

fn dispatch(listeners: &Mutex<Vec<(ListenerId, ResourceListener)>>, raw: WatchEvent) {
    let event = match process_event(raw) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("dropping unparseable resource event: {e}");
            return;
        }
    };
    tracing::debug!(event = %event, "dispatching resource event");

    // Disconnected listeners are removed atomically with the dispatch pass;
    // any other listener error is logged and the listener retained.
    let mut guard = listeners.lock();
    let mut disconnected = Vec::new();
    for (id, listener) in guard.iter() {
        match listener(&event) {
            Ok(()) => {}
            Err(Error::ListenerDisconnected) => disconnected.push(*id),
            Err(e) => tracing::warn!("resource listener error: {e}"),
        }
    }
    guard.retain(|(id, _)| !disconnected.contains(id));
}

/// Parse a raw KV watch event into a typed resource event.
/// Key layout: /resources/<kind-prefix>/<namespace>/<name>
fn process_event(raw: WatchEvent) -> Result<ResourceEvent> {
    let relative = raw
        .key
        .strip_prefix(REGISTRY_ROOT)
        .and_then(|k| k.strip_prefix('/'))
        .ok_or_else(|| Error::invalid_event(format!("key outside registry root: {}", raw.key)))?;

    let mut parts = relative.splitn(3, '/');
    let (prefix, namespace, name) = match (parts.next(), parts.next(), parts.next()) {
        (Some(prefix), Some(namespace), Some(name)) if !name.is_empty() => {
            (prefix, namespace, name)
        }
        _ => {
            return Err(Error::invalid_event(format!(
                "malformed resource key: {}",
                raw.key
            )))
        }
    };
    let resource_type = ResourceType::from_key_prefix(prefix)?;

    match raw.kind {
        WatchEventKind::Put => {
            let resource = deserialize_value(&raw.value)?;
            let prev = match &raw.prev_value {
                Some(prev) => match deserialize_value(prev) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!("could not decode prev_value in watch event: {e}");
                        None
                    }
                },
                None => None,
            };
            // Without a previous revision this is a create (or the backend
            // could not supply one); both halves count as changed.
            let (spec_changed, status_changed) = match &prev {
                Some(prev) => (
                    resource.get("spec") != prev.get("spec"),
                    resource.get("status") != prev.get("status"),
                ),
                None => (true, true),
            };
            Ok(ResourceEvent::Put(PutResourceEvent {
                resource_type,
                namespace: namespace.to_string(),
                name: name.to_string(),
                resource,
                spec_changed,
                status_changed,
            }))
        }
        WatchEventKind::Delete => Ok(ResourceEvent::Delete(DeleteResourceEvent {
            resource_type,
            namespace: namespace.to_string(),
            name: name.to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use troupe_core::resources::{AgentResource, AgentSpec, Resource};
    use troupe_core::serialization::serialize;

    fn agent_bytes(name: &str, image: &str) -> Vec<u8> {
        serialize(&AgentResource::initial_state(AgentSpec {
            name: name.to_string(),
            image: image.to_string(),
            capabilities: Default::default(),
        }))
        .unwrap()
    }

    #[test]
    fn put_without_prev_marks_everything_changed() {
        let event = process_event(WatchEvent {
            kind: WatchEventKind::Put,
            key: "/resources/agents/default/alice".to_string(),
            value: agent_bytes("alice", "img"),
            prev_value: None,
        })
        .unwrap();

        match event {
            ResourceEvent::Put(put) => {
                assert_eq!(put.resource_type, ResourceType::Agent);
                assert_eq!(put.namespace, "default");
                assert_eq!(put.name, "alice");
                assert!(put.spec_changed);
                assert!(put.status_changed);
            }
            other => panic!("expected put, got {other:?}"),
        }
    }

    #[test]
    fn put_with_prev_diffs_spec_and_status() {
        let event = process_event(WatchEvent {
            kind: WatchEventKind::Put,
            key: "/resources/agents/default/alice".to_string(),
            value: agent_bytes("alice", "img:v2"),
            prev_value: Some(agent_bytes("alice", "img:v1")),
        })
        .unwrap();

        match event {
            ResourceEvent::Put(put) => {
                assert!(put.spec_changed);
                assert!(!put.status_changed);
            }
            other => panic!("expected put, got {other:?}"),
        }
    }

    #[test]
    fn unknown_prefix_and_malformed_keys_are_rejected() {
        let bad_prefix = process_event(WatchEvent {
            kind: WatchEventKind::Delete,
            key: "/resources/gadgets/default/x".to_string(),
            value: Vec::new(),
            prev_value: None,
        });
        assert!(bad_prefix.is_err());

        let too_short = process_event(WatchEvent {
            kind: WatchEventKind::Delete,
            key: "/resources/agents/default".to_string(),
            value: Vec::new(),
            prev_value: None,
        });
        assert!(too_short.is_err());
    }

    #[tokio::test]
    async fn watcher_delivers_typed_events_and_drops_disconnected_listeners() {
        let kv = KvStore::in_memory();
        let watcher = ResourceWatcher::new(kv.clone());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        watcher.add_listener(Box::new(move |event| {
            tx.send(event.clone())
                .map_err(|_| Error::ListenerDisconnected)
        }));
        watcher.start();
        // Let the watch subscription establish before writing
        tokio::time::sleep(Duration::from_millis(20)).await;

        kv.put(
            "/resources/agents/default/alice",
            agent_bytes("alice", "img"),
        )
        .await
        .unwrap();
        kv.delete("/resources/agents/default/alice").await.unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, ResourceEvent::Put(_)));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, ResourceEvent::Delete(_)));

        // Closing the receiver makes the listener report disconnected;
        // the next event must remove it without disturbing the watcher.
        drop(rx);
        kv.put("/resources/agents/default/bob", agent_bytes("bob", "img"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(watcher.listeners.lock().is_empty());

        watcher.stop().await;
    }
}
