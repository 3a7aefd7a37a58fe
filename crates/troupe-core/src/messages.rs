// Messages carried over the bus between the router, agent inboxes and the
// workspace manager. Each message's `kind` field selects a typed payload;
// unknown kinds fail decoding and are dropped by consumers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::common::TypedResult;
use crate::error::{Error, Result};

/// A message on the workflow router queue or an agent inbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WorkflowMessage {
    /// The workflow record this message refers to
    pub id: String,
    /// The workflow this message refers to
    pub workflow: String,
    #[serde(flatten)]
    pub payload: WorkflowPayload,
}

impl WorkflowMessage {
    pub fn decode(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| Error::invalid_event(format!("bad workflow message: {e}")))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Generic(e.into()))
    }
}

/// Typed workflow message payloads, discriminated by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "data")]
pub enum WorkflowPayload {
    #[serde(rename = "initiate_workflow")]
    Initiate(InitiateWorkflowPayload),
    #[serde(rename = "report_action")]
    Report(ActionReportPayload),
    #[serde(rename = "trigger_action")]
    Trigger(ActionTriggerPayload),
}

/// Kick off a new execution of a workflow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InitiateWorkflowPayload {
    /// Values for the workflow's declared inputs
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    /// The workspace the workflow operates in, if any
    #[serde(default)]
    pub workspace: String,
}

/// An agent reporting the outcome of a triggered step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActionReportPayload {
    /// The step that ran
    pub step: String,
    /// The action that was executed
    pub action: String,
    #[serde(default)]
    pub outputs: BTreeMap<String, TypedResult>,
    /// Non-empty when the run failed
    #[serde(default)]
    pub error: String,
}

/// The router instructing an agent to run a step's action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActionTriggerPayload {
    pub step: String,
    pub action: String,
    /// action input name -> resolved value
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    /// Description of the role performing the action
    #[serde(default)]
    pub role_context: String,
}

/// A tool invocation response routed to an agent inbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ToolMessage {
    /// The tool invocation this message responds to
    pub id: String,
    pub tool: String,
    pub kind: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub error: String,
}

pub const TOOL_RESPONSE_KIND: &str = "tool_response";

/// A message on the workspace queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WorkspaceMessage {
    /// The workspace this message is for
    pub workspace: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(flatten)]
    pub payload: WorkspacePayload,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl WorkspaceMessage {
    pub fn decode(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| Error::invalid_event(format!("bad workspace message: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "data")]
pub enum WorkspacePayload {
    #[serde(rename = "workflow_code_report")]
    CodeReport(CodeReportPayload),
}

/// The code outputs of a finished workflow, to be applied to a workspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CodeReportPayload {
    pub workflow_name: String,
    /// ID of the workflow record that produced the outputs
    pub workflow_record: String,
    #[serde(default)]
    pub code_outputs: Vec<CodeOutput>,
}

/// A single file change produced by a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CodeOutput {
    /// new_file | modified_file | deleted_file
    pub kind: String,
    pub file_path: String,
    #[serde(default)]
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_message_wire_format_uses_kind_and_data() {
        let message = WorkflowMessage {
            id: "rec-1".to_string(),
            workflow: "wf".to_string(),
            payload: WorkflowPayload::Initiate(InitiateWorkflowPayload {
                inputs: BTreeMap::from([("q".to_string(), "hi".to_string())]),
                workspace: String::new(),
            }),
        };

        let json: serde_json::Value =
            serde_json::from_slice(&message.encode().unwrap()).unwrap();
        assert_eq!(json["kind"], "initiate_workflow");
        assert_eq!(json["data"]["inputs"]["q"], "hi");
        assert_eq!(json["id"], "rec-1");
    }

    #[test]
    fn decode_round_trips_every_payload_kind() {
        let messages = [
            WorkflowMessage {
                id: "1".to_string(),
                workflow: "wf".to_string(),
                payload: WorkflowPayload::Initiate(InitiateWorkflowPayload::default()),
            },
            WorkflowMessage {
                id: "2".to_string(),
                workflow: "wf".to_string(),
                payload: WorkflowPayload::Report(ActionReportPayload {
                    step: "s1".to_string(),
                    action: "Echo".to_string(),
                    outputs: BTreeMap::from([(
                        "out".to_string(),
                        crate::common::TypedResult::text("hi"),
                    )]),
                    error: String::new(),
                }),
            },
            WorkflowMessage {
                id: "3".to_string(),
                workflow: "wf".to_string(),
                payload: WorkflowPayload::Trigger(ActionTriggerPayload {
                    step: "s1".to_string(),
                    action: "Echo".to_string(),
                    inputs: BTreeMap::from([("in".to_string(), "hi".to_string())]),
                    role_context: "a role".to_string(),
                }),
            },
        ];
        for message in messages {
            let decoded = WorkflowMessage::decode(&message.encode().unwrap()).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let raw = br#"{"id":"1","workflow":"wf","kind":"mystery","data":{}}"#;
        let err = WorkflowMessage::decode(raw).unwrap_err();
        assert!(matches!(err, Error::InvalidEvent(_)));
    }
}
