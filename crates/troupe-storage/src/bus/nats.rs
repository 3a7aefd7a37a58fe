// NATS JetStream message bus backend
//
// Each queue is a work-queue stream with a durable pull consumer.
// max_ack_pending = 1 keeps consumption serial per queue, which the router
// relies on for its read-modify-write of workflow records. A message is
// acked only after every handler succeeded; otherwise the broker redelivers.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_nats::jetstream::{self, consumer::pull, stream};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use troupe_core::{Error, Result};

use super::{sanitized_name, HandlerId, QueueHandler};

type HandlerList = Arc<Mutex<Vec<(HandlerId, Arc<dyn QueueHandler>)>>>;

#[derive(Clone)]
pub struct NatsBus {
    context: jetstream::Context,
    consumers: Arc<Mutex<HashMap<String, ConsumerState>>>,
}

struct ConsumerState {
    handlers: HandlerList,
    task: JoinHandle<()>,
}

impl NatsBus {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| Error::setup(format!("could not connect to NATS at {url}: {e}")))?;
        Ok(Self {
            context: jetstream::new(client),
            consumers: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<()> {
        self.ensure_stream(queue).await?;
        self.context
            .publish(queue.to_string(), payload.into())
            .await
            .map_err(|e| Error::Generic(anyhow!("publish to '{queue}': {e}")))?
            .await
            .map_err(|e| Error::Generic(anyhow!("publish ack from '{queue}': {e}")))?;
        Ok(())
    }

    pub async fn register_callback(
        &self,
        queue: &str,
        handler: Arc<dyn QueueHandler>,
    ) -> Result<HandlerId> {
        let id = HandlerId::next();

        let existing = {
            let consumers = self.consumers.lock();
            consumers.get(queue).map(|state| state.handlers.clone())
        };
        if let Some(handlers) = existing {
            handlers.lock().push((id, handler));
            return Ok(id);
        }

        let stream = self.ensure_stream(queue).await?;
        let consumer = stream
            .create_consumer(pull::Config {
                durable_name: Some(sanitized_name(queue)),
                // Serial consumption per queue
                max_ack_pending: 1,
                ..Default::default()
            })
            .await
            .map_err(|e| Error::setup(format!("create consumer for '{queue}': {e}")))?;

        let handlers: HandlerList = Arc::new(Mutex::new(vec![(id, handler)]));
        let task_handlers = handlers.clone();
        let queue_name = queue.to_string();
        let task = tokio::spawn(async move {
            let mut messages = match consumer.messages().await {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::error!(queue = %queue_name, "could not open consumer stream: {e}");
                    return;
                }
            };
            while let Some(message) = messages.next().await {
                let message = match message {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::warn!(queue = %queue_name, "consumer stream error: {e}");
                        continue;
                    }
                };
                let snapshot: Vec<Arc<dyn QueueHandler>> = task_handlers
                    .lock()
                    .iter()
                    .map(|(_, h)| h.clone())
                    .collect();
                let mut delivered = true;
                for handler in snapshot {
                    if let Err(e) = handler.handle(&message.payload).await {
                        tracing::warn!(queue = %queue_name, "queue handler error: {e}");
                        delivered = false;
                    }
                }
                if delivered {
                    if let Err(e) = message.ack().await {
                        tracing::warn!(queue = %queue_name, "ack failed: {e}");
                    }
                }
                // Unacked messages redeliver after the ack wait
            }
        });

        self.consumers
            .lock()
            .insert(queue.to_string(), ConsumerState { handlers, task });
        Ok(id)
    }

    pub async fn deregister_callback(&self, queue: &str, id: HandlerId) -> Result<()> {
        let mut consumers = self.consumers.lock();
        let Some(state) = consumers.get(queue) else {
            return Ok(());
        };
        let now_empty = {
            let mut handlers = state.handlers.lock();
            handlers.retain(|(hid, _)| *hid != id);
            handlers.is_empty()
        };
        if now_empty {
            if let Some(state) = consumers.remove(queue) {
                state.task.abort();
            }
        }
        Ok(())
    }

    async fn ensure_stream(&self, queue: &str) -> Result<stream::Stream> {
        self.context
            .get_or_create_stream(stream::Config {
                name: sanitized_name(queue),
                subjects: vec![queue.to_string()],
                retention: stream::RetentionPolicy::WorkQueue,
                ..Default::default()
            })
            .await
            .map_err(|e| Error::setup(format!("ensure stream for '{queue}': {e}")))
    }
}
