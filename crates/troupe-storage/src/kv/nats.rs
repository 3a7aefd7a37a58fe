// NATS JetStream KV backend
//
// Resources live in one KV bucket. Keys contain '/' and are single subject
// tokens, so prefix scans and prefix watches filter client-side over the
// whole bucket. Watch entries carry no previous value; the change feed
// treats those events as create-or-update with both diff flags set.

use anyhow::anyhow;
use async_nats::jetstream::{self, kv};
use futures::StreamExt;
use troupe_core::{Error, Result};

use super::{WatchEvent, WatchEventKind, WatchStream};

#[derive(Clone)]
pub struct NatsKv {
    store: kv::Store,
}

impl NatsKv {
    pub async fn connect(url: &str, bucket: &str) -> Result<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| Error::setup(format!("could not connect to NATS at {url}: {e}")))?;
        let jetstream = jetstream::new(client);
        let store = jetstream
            .create_key_value(kv::Config {
                bucket: bucket.to_string(),
                // Keep one prior revision so deletes are distinguishable
                history: 2,
                ..Default::default()
            })
            .await
            .map_err(|e| Error::setup(format!("could not open KV bucket '{bucket}': {e}")))?;
        Ok(Self { store })
    }

    pub fn from_store(store: kv::Store) -> Self {
        Self { store }
    }

    pub async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.store
            .put(key, value.into())
            .await
            .map(|_| ())
            .map_err(|e| Error::Generic(anyhow!("kv put '{key}': {e}")))
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.store
            .get(key)
            .await
            .map(|v| v.map(|bytes| bytes.to_vec()))
            .map_err(|e| Error::Generic(anyhow!("kv get '{key}': {e}")))
    }

    pub async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut keys = self
            .store
            .keys()
            .await
            .map_err(|e| Error::Generic(anyhow!("kv list keys: {e}")))?;

        let mut entries = Vec::new();
        while let Some(key) = keys.next().await {
            let key = key.map_err(|e| Error::Generic(anyhow!("kv list keys: {e}")))?;
            if !key.starts_with(prefix) {
                continue;
            }
            if let Some(value) = self.get(&key).await? {
                entries.push((key, value));
            }
        }
        Ok(entries)
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        if self.get(key).await?.is_none() {
            return Ok(false);
        }
        self.store
            .purge(key)
            .await
            .map_err(|e| Error::Generic(anyhow!("kv delete '{key}': {e}")))?;
        Ok(true)
    }

    pub async fn put_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        match self.store.create(key, value.into()).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == kv::CreateErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(Error::Generic(anyhow!("kv create '{key}': {e}"))),
        }
    }

    pub async fn watch_prefix(&self, prefix: &str) -> Result<WatchStream> {
        let watch = self
            .store
            .watch_all()
            .await
            .map_err(|e| Error::setup(format!("kv watch: {e}")))?;

        let prefix = prefix.to_string();
        let stream = watch
            .filter_map(move |entry| {
                let prefix = prefix.clone();
                async move {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(e) => {
                            tracing::warn!("kv watch entry error: {e}");
                            return None;
                        }
                    };
                    if !entry.key.starts_with(&prefix) {
                        return None;
                    }
                    let kind = match entry.operation {
                        kv::Operation::Put => WatchEventKind::Put,
                        kv::Operation::Delete | kv::Operation::Purge => WatchEventKind::Delete,
                    };
                    Some(WatchEvent {
                        kind,
                        key: entry.key,
                        value: entry.value.to_vec(),
                        prev_value: None,
                    })
                }
            })
            .boxed();
        Ok(stream)
    }
}
