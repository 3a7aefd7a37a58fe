// Message bus abstraction
//
// Durable queues with at-least-once delivery. The engine publishes JSON
// bodies and registers callbacks per queue; handlers must be idempotent.
// Handler errors are logged and never poison the subscription; on the NATS
// backend an errored message is simply not acked, so the broker redelivers.

pub mod memory;
pub mod nats;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use troupe_core::{Error, Result};

pub use memory::MemoryBus;
pub use nats::NatsBus;

/// A callback attached to a queue
#[async_trait]
pub trait QueueHandler: Send + Sync + 'static {
    async fn handle(&self, payload: &[u8]) -> Result<()>;
}

/// Identifies a registration so it can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

impl HandlerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Message bus backend: NATS JetStream work queues or in-memory
#[derive(Clone)]
pub enum MessageBus {
    Nats(NatsBus),
    Memory(MemoryBus),
}

impl MessageBus {
    pub async fn nats(url: &str) -> Result<Self> {
        Ok(Self::Nats(NatsBus::connect(url).await?))
    }

    pub fn in_memory() -> Self {
        Self::Memory(MemoryBus::new())
    }

    /// Publish a JSON-encoded message onto a queue
    pub async fn publish_json<T: Serialize>(&self, queue: &str, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)
            .map_err(|e| Error::Generic(anyhow::anyhow!("encode message for '{queue}': {e}")))?;
        self.publish(queue, payload).await
    }

    pub async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<()> {
        match self {
            Self::Nats(bus) => bus.publish(queue, payload).await,
            Self::Memory(bus) => bus.publish(queue, payload),
        }
    }

    /// Attach a durable consumer callback to a queue
    pub async fn register_callback(
        &self,
        queue: &str,
        handler: Arc<dyn QueueHandler>,
    ) -> Result<HandlerId> {
        match self {
            Self::Nats(bus) => bus.register_callback(queue, handler).await,
            Self::Memory(bus) => Ok(bus.register_callback(queue, handler)),
        }
    }

    pub async fn deregister_callback(&self, queue: &str, id: HandlerId) -> Result<()> {
        match self {
            Self::Nats(bus) => bus.deregister_callback(queue, id).await,
            Self::Memory(bus) => {
                bus.deregister_callback(queue, id);
                Ok(())
            }
        }
    }
}

/// Queue names are subjects; stream and durable names only allow a
/// restricted alphabet, so everything else maps to '-'.
pub(crate) fn sanitized_name(queue: &str) -> String {
    queue
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct Recorder {
        seen: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    #[async_trait]
    impl QueueHandler for Recorder {
        async fn handle(&self, payload: &[u8]) -> Result<()> {
            self.seen.lock().push(payload.to_vec());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl QueueHandler for Failing {
        async fn handle(&self, _payload: &[u8]) -> Result<()> {
            Err(Error::invalid_event("always fails"))
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn messages_reach_registered_handlers_in_order() {
        let bus = MessageBus::in_memory();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.register_callback("q1", Arc::new(Recorder { seen: seen.clone() }))
            .await
            .unwrap();

        bus.publish("q1", b"one".to_vec()).await.unwrap();
        bus.publish("q1", b"two".to_vec()).await.unwrap();

        wait_until(|| seen.lock().len() == 2).await;
        assert_eq!(*seen.lock(), vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[tokio::test]
    async fn messages_published_before_registration_are_delivered() {
        let bus = MessageBus::in_memory();
        bus.publish("q2", b"early".to_vec()).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.register_callback("q2", Arc::new(Recorder { seen: seen.clone() }))
            .await
            .unwrap();

        wait_until(|| seen.lock().len() == 1).await;
    }

    #[tokio::test]
    async fn failing_handler_does_not_poison_the_queue() {
        let bus = MessageBus::in_memory();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.register_callback("q3", Arc::new(Failing)).await.unwrap();
        bus.register_callback("q3", Arc::new(Recorder { seen: seen.clone() }))
            .await
            .unwrap();

        bus.publish("q3", b"still delivered".to_vec()).await.unwrap();
        wait_until(|| seen.lock().len() == 1).await;
    }

    #[tokio::test]
    async fn deregistered_handlers_stop_receiving() {
        let bus = MessageBus::in_memory();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = bus
            .register_callback("q4", Arc::new(Recorder { seen: seen.clone() }))
            .await
            .unwrap();

        bus.publish("q4", b"first".to_vec()).await.unwrap();
        wait_until(|| seen.lock().len() == 1).await;

        bus.deregister_callback("q4", id).await.unwrap();
        bus.publish("q4", b"second".to_vec()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn queue_names_sanitize_to_stream_names() {
        assert_eq!(
            sanitized_name("default:actor:agent:alice"),
            "default-actor-agent-alice"
        );
    }
}
