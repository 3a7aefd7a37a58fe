// Events emitted by the change feed and consumed by reactors, the SSE
// projection and the engine's start/finish listeners.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::record::WorkflowRecord;
use crate::resources::ResourceType;

/// A typed change observed on the registry root prefix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "event_type")]
pub enum ResourceEvent {
    #[serde(rename = "PUT")]
    Put(PutResourceEvent),
    #[serde(rename = "DELETE")]
    Delete(DeleteResourceEvent),
}

impl ResourceEvent {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceEvent::Put(e) => e.resource_type,
            ResourceEvent::Delete(e) => e.resource_type,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            ResourceEvent::Put(e) => &e.namespace,
            ResourceEvent::Delete(e) => &e.namespace,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResourceEvent::Put(e) => &e.name,
            ResourceEvent::Delete(e) => &e.name,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, ResourceEvent::Delete(_))
    }
}

impl std::fmt::Display for ResourceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_delete() { "DELETE" } else { "PUT" };
        write!(
            f,
            "({} {} {}/{})",
            kind,
            self.resource_type(),
            self.namespace(),
            self.name()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PutResourceEvent {
    pub resource_type: ResourceType,
    pub namespace: String,
    pub name: String,
    /// The resource document as stored
    #[schema(value_type = Object)]
    pub resource: serde_json::Value,
    /// Whether the spec differs from the previous revision
    #[serde(default)]
    pub spec_changed: bool,
    /// Whether the status differs from the previous revision
    #[serde(default)]
    pub status_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeleteResourceEvent {
    pub resource_type: ResourceType,
    pub namespace: String,
    pub name: String,
}

/// A status update pushed by an agent runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "event_type")]
pub enum StatusEvent {
    #[serde(rename = "PUT")]
    Put(PutStatusEvent),
    #[serde(rename = "DELETE")]
    Delete(DeleteStatusEvent),
}

impl StatusEvent {
    pub fn resource_type(&self) -> &str {
        match self {
            StatusEvent::Put(e) => &e.resource_type,
            StatusEvent::Delete(e) => &e.resource_type,
        }
    }

    pub fn set_host_ip(&mut self, host_ip: String) {
        match self {
            StatusEvent::Put(e) => e.host_ip = host_ip,
            StatusEvent::Delete(e) => e.host_ip = host_ip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PutStatusEvent {
    /// Injected from the request peer, not trusted from the body
    #[serde(default)]
    pub host_ip: String,
    pub resource_type: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
    /// The new status document
    #[schema(value_type = Object)]
    pub status: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeleteStatusEvent {
    #[serde(default)]
    pub host_ip: String,
    pub resource_type: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Fired when the router creates a record and begins triggering steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStartEvent {
    pub workflow_record: WorkflowRecord,
}

/// Fired when every declared output has a value or an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowFinishEvent {
    pub workflow_record: WorkflowRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_event_tag_is_event_type() {
        let event = ResourceEvent::Delete(DeleteResourceEvent {
            resource_type: ResourceType::Agent,
            namespace: "default".to_string(),
            name: "alice".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "DELETE");
        assert_eq!(json["resource_type"], "AGENT");

        let back: ResourceEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn status_event_round_trips() {
        let event = StatusEvent::Put(PutStatusEvent {
            host_ip: "10.0.0.3".to_string(),
            resource_type: "AGENT".to_string(),
            namespace: "default".to_string(),
            name: "alice".to_string(),
            status: serde_json::json!({"name": "alice", "status": "running"}),
        });
        let json = serde_json::to_string(&event).unwrap();
        let back: StatusEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
