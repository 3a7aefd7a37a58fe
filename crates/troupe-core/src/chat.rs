// Chat types for the agent-chat command proxy

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConversationMessage {
    pub sender: String,
    pub message: String,
}

/// Arguments for prompting an agent through its team role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatPromptAgentArgs {
    /// The team providing conversation context
    pub team: String,
    /// The role the agent is playing
    pub role: String,
    #[serde(default)]
    pub history: Vec<ConversationMessage>,
    pub message: ConversationMessage,
}
