// Activity log entries pushed by agent runtimes during execution

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The kind of execution an activity belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    Workflow,
    Task,
}

impl ExecutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionType::Workflow => "workflow",
            ExecutionType::Task => "task",
        }
    }
}

impl std::str::FromStr for ExecutionType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workflow" => Ok(ExecutionType::Workflow),
            "task" => Ok(ExecutionType::Task),
            other => Err(crate::error::Error::invalid_event(format!(
                "unknown execution type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Thought,
    Action,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Thought => "thought",
            ActivityType::Action => "action",
        }
    }
}

impl std::str::FromStr for ActivityType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thought" => Ok(ActivityType::Thought),
            "action" => Ok(ActivityType::Action),
            other => Err(crate::error::Error::invalid_event(format!(
                "unknown activity type '{other}'"
            ))),
        }
    }
}

/// Which identity/team/role the acting agent was operating as
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AgentContext {
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub role: String,
}

/// One append-only activity log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActivityEvent {
    /// The execution context the event belongs to (record id, task name, ...)
    pub execution_id: String,
    pub execution_type: ExecutionType,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub content: String,
    #[serde(default)]
    pub agent_context: AgentContext,
}
