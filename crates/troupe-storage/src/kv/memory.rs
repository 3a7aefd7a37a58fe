// In-memory KV implementation for dev mode and tests
// Decision: Use parking_lot for thread-safe access
//
// Watch fan-out goes through a broadcast channel; events are produced under
// the write lock, so subscribers observe changes in commit order.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use troupe_core::Result;

use super::{WatchEvent, WatchEventKind, WatchStream};

const WATCH_CHANNEL_CAPACITY: usize = 1024;

/// In-memory KV store; all data is lost on restart
#[derive(Clone)]
pub struct MemoryKv {
    inner: Arc<Inner>,
}

struct Inner {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    watch_tx: broadcast::Sender<WatchEvent>,
}

impl MemoryKv {
    pub fn new() -> Self {
        let (watch_tx, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(BTreeMap::new()),
                watch_tx,
            }),
        }
    }

    pub fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let prev = {
            let mut entries = self.inner.entries.write();
            entries.insert(key.to_string(), value.clone())
        };
        self.notify(WatchEvent {
            kind: WatchEventKind::Put,
            key: key.to_string(),
            value,
            prev_value: prev,
        });
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.entries.read().get(key).cloned()
    }

    pub fn get_prefix(&self, prefix: &str) -> Vec<(String, Vec<u8>)> {
        self.inner
            .entries
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        let prev = {
            let mut entries = self.inner.entries.write();
            entries.remove(key)
        };
        match prev {
            Some(prev) => {
                self.notify(WatchEvent {
                    kind: WatchEventKind::Delete,
                    key: key.to_string(),
                    value: Vec::new(),
                    prev_value: Some(prev),
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn put_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        let created = {
            let mut entries = self.inner.entries.write();
            match entries.entry(key.to_string()) {
                std::collections::btree_map::Entry::Occupied(_) => false,
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(value.clone());
                    true
                }
            }
        };
        if created {
            self.notify(WatchEvent {
                kind: WatchEventKind::Put,
                key: key.to_string(),
                value,
                prev_value: None,
            });
        }
        Ok(created)
    }

    pub fn watch_prefix(&self, prefix: &str) -> WatchStream {
        let prefix = prefix.to_string();
        let rx = self.inner.watch_tx.subscribe();
        BroadcastStream::new(rx)
            .filter_map(move |item| {
                let prefix = prefix.clone();
                async move {
                    match item {
                        Ok(event) if event.key.starts_with(&prefix) => Some(event),
                        Ok(_) => None,
                        Err(lag) => {
                            tracing::warn!("kv watch subscriber lagged: {lag}");
                            None
                        }
                    }
                }
            })
            .boxed()
    }

    fn notify(&self, event: WatchEvent) {
        // No subscribers is fine; send only fails when there are none
        let _ = self.inner.watch_tx.send(event);
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}
