// Key-value store abstraction
// Decision: Use enum dispatch for simplicity over trait objects
//
// This module provides a unified KvStore enum that can work with either
// NATS JetStream KV (production) or in-memory (dev mode / tests) storage.
// Both back the resource registry, the record store and the change feed.

pub mod memory;
pub mod nats;

use futures::stream::BoxStream;
use troupe_core::Result;

pub use memory::MemoryKv;
pub use nats::NatsKv;

/// A single change observed on a watched prefix
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub key: String,
    pub value: Vec<u8>,
    /// The previous value at the key, when the backend can supply it
    pub prev_value: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Put,
    Delete,
}

/// Stream of watch events; dropping it cancels the watch
pub type WatchStream = BoxStream<'static, WatchEvent>;

/// Key-value backend: NATS JetStream KV or in-memory
#[derive(Clone)]
pub enum KvStore {
    Nats(NatsKv),
    Memory(MemoryKv),
}

impl KvStore {
    /// Connect to a JetStream KV bucket, creating it if needed
    pub async fn nats(url: &str, bucket: &str) -> Result<Self> {
        Ok(Self::Nats(NatsKv::connect(url, bucket).await?))
    }

    /// Create an in-memory store (dev mode / tests)
    pub fn in_memory() -> Self {
        Self::Memory(MemoryKv::new())
    }

    pub fn is_dev_mode(&self) -> bool {
        matches!(self, Self::Memory(_))
    }

    pub async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        match self {
            Self::Nats(kv) => kv.put(key, value).await,
            Self::Memory(kv) => kv.put(key, value),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Nats(kv) => kv.get(key).await,
            Self::Memory(kv) => Ok(kv.get(key)),
        }
    }

    pub async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        match self {
            Self::Nats(kv) => kv.get_prefix(prefix).await,
            Self::Memory(kv) => Ok(kv.get_prefix(prefix)),
        }
    }

    /// Remove a key; returns whether it existed
    pub async fn delete(&self, key: &str) -> Result<bool> {
        match self {
            Self::Nats(kv) => kv.delete(key).await,
            Self::Memory(kv) => kv.delete(key),
        }
    }

    /// Write only if the key is unoccupied; at most one concurrent call wins
    pub async fn put_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        match self {
            Self::Nats(kv) => kv.put_if_absent(key, value).await,
            Self::Memory(kv) => kv.put_if_absent(key, value),
        }
    }

    /// Subscribe to changes under a key prefix. Events arrive eventually
    /// after the corresponding write, in commit order per prefix.
    pub async fn watch_prefix(&self, prefix: &str) -> Result<WatchStream> {
        match self {
            Self::Nats(kv) => kv.watch_prefix(prefix).await,
            Self::Memory(kv) => Ok(kv.watch_prefix(prefix)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let kv = KvStore::in_memory();
        kv.put("/resources/agents/default/alice", b"v1".to_vec())
            .await
            .unwrap();

        assert_eq!(
            kv.get("/resources/agents/default/alice").await.unwrap(),
            Some(b"v1".to_vec())
        );
        assert!(kv.delete("/resources/agents/default/alice").await.unwrap());
        assert!(!kv.delete("/resources/agents/default/alice").await.unwrap());
        assert_eq!(kv.get("/resources/agents/default/alice").await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_prefix_scans_only_the_prefix() {
        let kv = KvStore::in_memory();
        kv.put("/resources/agents/default/a", b"1".to_vec())
            .await
            .unwrap();
        kv.put("/resources/agents/default/b", b"2".to_vec())
            .await
            .unwrap();
        kv.put("/resources/teams/default/t", b"3".to_vec())
            .await
            .unwrap();

        let entries = kv.get_prefix("/resources/agents/").await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn put_if_absent_is_exclusive() {
        let kv = KvStore::in_memory();
        assert!(kv.put_if_absent("/k", b"first".to_vec()).await.unwrap());
        assert!(!kv.put_if_absent("/k", b"second".to_vec()).await.unwrap());
        assert_eq!(kv.get("/k").await.unwrap(), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn concurrent_put_if_absent_has_one_winner() {
        let kv = KvStore::in_memory();
        let mut tasks = Vec::new();
        for i in 0..16 {
            let kv = kv.clone();
            tasks.push(tokio::spawn(async move {
                kv.put_if_absent("/contended", format!("{i}").into_bytes())
                    .await
                    .unwrap()
            }));
        }
        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn watch_sees_puts_and_deletes_in_order() {
        let kv = KvStore::in_memory();
        let mut watch = kv.watch_prefix("/resources").await.unwrap();

        kv.put("/resources/agents/default/a", b"1".to_vec())
            .await
            .unwrap();
        kv.put("/resources/agents/default/a", b"2".to_vec())
            .await
            .unwrap();
        kv.delete("/resources/agents/default/a").await.unwrap();
        // Outside the watched prefix, must not be observed
        kv.put("/records/workflows/default/wf/1", b"x".to_vec())
            .await
            .unwrap();

        let first = watch.next().await.unwrap();
        assert_eq!(first.kind, WatchEventKind::Put);
        assert_eq!(first.prev_value, None);

        let second = watch.next().await.unwrap();
        assert_eq!(second.kind, WatchEventKind::Put);
        assert_eq!(second.prev_value, Some(b"1".to_vec()));
        assert_eq!(second.value, b"2".to_vec());

        let third = watch.next().await.unwrap();
        assert_eq!(third.kind, WatchEventKind::Delete);
        assert_eq!(third.prev_value, Some(b"2".to_vec()));
    }
}
