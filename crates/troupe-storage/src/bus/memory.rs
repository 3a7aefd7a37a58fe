// In-memory message bus for dev mode and tests
//
// One consumer task per queue drains an unbounded channel and invokes the
// registered handlers serially, which mirrors the prefetch=1 consumption the
// production backend gives the router. Messages published before any handler
// registers are buffered until one appears.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use troupe_core::Result;

use super::{HandlerId, QueueHandler};

type HandlerList = Arc<Mutex<Vec<(HandlerId, Arc<dyn QueueHandler>)>>>;

#[derive(Clone)]
pub struct MemoryBus {
    queues: Arc<Mutex<HashMap<String, QueueState>>>,
}

struct QueueState {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    handlers: HandlerList,
    registered: Arc<Notify>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<()> {
        let tx = self.queue_state(queue, |state| state.tx.clone());
        // The consumer task holds the receiver for the life of the bus
        let _ = tx.send(payload);
        Ok(())
    }

    pub fn register_callback(&self, queue: &str, handler: Arc<dyn QueueHandler>) -> HandlerId {
        let id = HandlerId::next();
        self.queue_state(queue, |state| {
            state.handlers.lock().push((id, handler.clone()));
            state.registered.notify_one();
        });
        id
    }

    pub fn deregister_callback(&self, queue: &str, id: HandlerId) {
        let queues = self.queues.lock();
        if let Some(state) = queues.get(queue) {
            state.handlers.lock().retain(|(hid, _)| *hid != id);
        }
    }

    fn queue_state<T>(&self, queue: &str, f: impl FnOnce(&QueueState) -> T) -> T {
        let mut queues = self.queues.lock();
        let state = queues
            .entry(queue.to_string())
            .or_insert_with(|| Self::spawn_queue(queue));
        f(state)
    }

    fn spawn_queue(queue: &str) -> QueueState {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let handlers: HandlerList = Arc::new(Mutex::new(Vec::new()));
        let registered = Arc::new(Notify::new());

        let queue_name = queue.to_string();
        let task_handlers = handlers.clone();
        let task_registered = registered.clone();
        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                loop {
                    let snapshot: Vec<Arc<dyn QueueHandler>> = task_handlers
                        .lock()
                        .iter()
                        .map(|(_, h)| h.clone())
                        .collect();
                    if snapshot.is_empty() {
                        // Hold the message until a consumer shows up
                        task_registered.notified().await;
                        continue;
                    }
                    for handler in snapshot {
                        if let Err(e) = handler.handle(&payload).await {
                            tracing::warn!(queue = %queue_name, "queue handler error: {e}");
                        }
                    }
                    break;
                }
            }
        });

        QueueState {
            tx,
            handlers,
            registered,
        }
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}
