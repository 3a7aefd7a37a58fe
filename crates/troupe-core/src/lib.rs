// Troupe control-plane domain model
//
// This crate holds the types shared by the storage, engine and API crates:
// declarative resources, workflow execution records, bus messages, change
// events, the error taxonomy, and the stored-value encoding.
//
// Key design decisions:
// - Resources split into spec (operator intent) and status (observed state)
// - Workflow messages use a tagged payload enum; unknown kinds fail decoding
// - Stored values keep the double-JSON encoding the watch stream produces
// - Step graphs are validated (acyclic) at spec write time, not at runtime

pub mod activity;
pub mod chat;
pub mod common;
pub mod error;
pub mod events;
pub mod graph;
pub mod messages;
pub mod record;
pub mod resources;
pub mod serialization;

pub use common::{TypedArgument, TypedResult};
pub use error::{Error, Result};
pub use events::{
    DeleteResourceEvent, DeleteStatusEvent, PutResourceEvent, PutStatusEvent, ResourceEvent,
    StatusEvent, WorkflowFinishEvent, WorkflowStartEvent,
};
pub use messages::{
    ActionReportPayload, ActionTriggerPayload, CodeOutput, CodeReportPayload,
    InitiateWorkflowPayload, ToolMessage, WorkflowMessage, WorkflowPayload, WorkspaceMessage,
    WorkspacePayload,
};
pub use record::{StepResult, StepRunStatus, WorkflowRecord};
pub use resources::{Resource, ResourceType, API_VERSION};

/// Scoping namespace used when none is given
pub const DEFAULT_NAMESPACE: &str = "default";

/// The queue the workflow router consumes
pub const WORKFLOW_ROUTER_QUEUE: &str = "default:actor:roster-admin:workflow-router";

/// Execution headers forwarded to agent runtimes
pub const EXECUTION_ID_HEADER: &str = "X-Execution-ID";
pub const EXECUTION_TYPE_HEADER: &str = "X-Execution-Type";

/// The queue the workspace manager consumes for `namespace`
pub fn workspace_queue(namespace: &str) -> String {
    format!("{namespace}:actor:workspace")
}

/// The inbox queue of an agent in `namespace`
pub fn agent_inbox_queue(namespace: &str, agent: &str) -> String {
    format!("{namespace}:actor:agent:{agent}")
}
