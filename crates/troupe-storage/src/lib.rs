// Storage layer for the Troupe control plane
//
// This crate provides the two external-system adapters and the typed stores
// built on them:
// - KvStore: strongly-consistent KV with prefix watch (NATS JetStream KV or
//   in-memory), backing resources and workflow records
// - MessageBus: durable queues with at-least-once delivery (JetStream work
//   queues or in-memory)
// - Registry<R>: per-kind resource CRUD with optimistic create
// - WorkflowRecordStore: execution records keyed by (workflow, record id)
// - ActivityStore: append-only activity log (Postgres or in-memory)

pub mod activity;
pub mod bus;
pub mod kv;
pub mod records;
pub mod registry;

pub use activity::ActivityStore;
pub use bus::{HandlerId, MessageBus, QueueHandler};
pub use kv::{KvStore, WatchEvent, WatchEventKind, WatchStream};
pub use records::{WorkflowRecordStore, RECORD_ROOT};
pub use registry::{
    resource_key, resource_prefix, AgentRegistry, IdentityRegistry, Registry, TaskRegistry,
    TeamRegistry, WorkflowRegistry, WorkspaceRegistry, REGISTRY_ROOT,
};
