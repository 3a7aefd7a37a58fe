// Troupe engine: the reactive half of the control plane
//
// - ResourceWatcher: one watch subscription on the registry root, fanned out
//   to listeners as typed events
// - Informer<R>: per-kind local caches kept current by the watcher
// - WorkflowRouter: the message-driven workflow engine
// - AgentInbox: addressing for trigger/tool messages to agents
// - TaskController + TaskExecutor: the reconcile-loop reactor exemplar
// - StatusIngest: the single writer of resource statuses

pub mod controller;
pub mod executor;
pub mod inbox;
pub mod informer;
pub mod router;
pub mod status;
pub mod watcher;

pub use controller::TaskController;
pub use executor::TaskExecutor;
pub use inbox::AgentInbox;
pub use informer::Informer;
pub use router::{EventListener, WorkflowRouter};
pub use status::StatusIngest;
pub use watcher::{ListenerId, ResourceListener, ResourceWatcher};
