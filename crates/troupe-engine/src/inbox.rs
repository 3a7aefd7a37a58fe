// Agent inboxes
//
// Each agent has a durable queue named `<namespace>:actor:agent:<name>`.
// The router drops trigger messages here; tool responses take the same path.

use serde_json::Value;
use troupe_core::messages::{
    ActionTriggerPayload, ToolMessage, WorkflowMessage, WorkflowPayload, TOOL_RESPONSE_KIND,
};
use troupe_core::resources::TeamResource;
use troupe_core::{agent_inbox_queue, Error, Result};
use troupe_storage::MessageBus;

pub struct AgentInbox {
    name: String,
    namespace: String,
    bus: MessageBus,
}

impl std::fmt::Debug for AgentInbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentInbox")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl AgentInbox {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, bus: MessageBus) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            bus,
        }
    }

    /// Resolve the inbox of the agent staffing `role` on a team
    pub fn for_member(
        team: &TeamResource,
        role: &str,
        namespace: &str,
        bus: MessageBus,
    ) -> Result<Self> {
        let member = team
            .spec
            .members
            .get(role)
            .ok_or_else(|| Error::not_found(format!("agent for role '{role}'")))?;
        Ok(Self::new(member.agent.clone(), namespace, bus))
    }

    pub fn queue_name(&self) -> String {
        agent_inbox_queue(&self.namespace, &self.name)
    }

    /// Enqueue a trigger for this agent to run a step's action
    pub async fn trigger_action(
        &self,
        workflow: &str,
        record_id: &str,
        payload: ActionTriggerPayload,
    ) -> Result<()> {
        tracing::debug!(
            agent = %self.name,
            workflow = %workflow,
            record = %record_id,
            step = %payload.step,
            "triggering action"
        );
        let message = WorkflowMessage {
            id: record_id.to_string(),
            workflow: workflow.to_string(),
            payload: WorkflowPayload::Trigger(payload),
        };
        self.bus.publish_json(&self.queue_name(), &message).await
    }

    /// Send a tool invocation response back to this agent
    pub async fn send_tool_response(
        &self,
        invocation_id: &str,
        tool: &str,
        data: Value,
        error: &str,
    ) -> Result<()> {
        tracing::debug!(agent = %self.name, tool = %tool, "sending tool response");
        let message = ToolMessage {
            id: invocation_id.to_string(),
            tool: tool.to_string(),
            kind: TOOL_RESPONSE_KIND.to_string(),
            data,
            error: error.to_string(),
        };
        self.bus.publish_json(&self.queue_name(), &message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use troupe_core::resources::{Member, Resource, TeamSpec};

    fn team() -> TeamResource {
        TeamResource::initial_state(TeamSpec {
            name: "red".to_string(),
            team_type: "dev".to_string(),
            description: String::new(),
            layout: Default::default(),
            members: BTreeMap::from([(
                "Builder".to_string(),
                Member {
                    identity: "alice".to_string(),
                    agent: "agent-1".to_string(),
                },
            )]),
            workflows: vec![],
        })
    }

    #[test]
    fn queue_name_includes_namespace_and_agent() {
        let inbox = AgentInbox::new("agent-1", "default", MessageBus::in_memory());
        assert_eq!(inbox.queue_name(), "default:actor:agent:agent-1");
    }

    #[test]
    fn missing_role_member_is_agent_not_found() {
        let err =
            AgentInbox::for_member(&team(), "Reviewer", "default", MessageBus::in_memory())
                .unwrap_err();
        assert!(err.is_not_found());

        let inbox =
            AgentInbox::for_member(&team(), "Builder", "default", MessageBus::in_memory()).unwrap();
        assert_eq!(inbox.queue_name(), "default:actor:agent:agent-1");
    }
}
