// Command routes: agent chat proxy and workflow initiation

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use troupe_core::chat::{ChatPromptAgentArgs, ConversationMessage};
use troupe_core::messages::{InitiateWorkflowPayload, WorkflowMessage, WorkflowPayload};
use troupe_core::{EXECUTION_ID_HEADER, EXECUTION_TYPE_HEADER, WORKFLOW_ROUTER_QUEUE};
use troupe_storage::{MessageBus, TeamRegistry, WorkflowRegistry};
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::map_error;
use crate::runtime::RuntimeClient;

#[derive(Clone)]
pub struct AppState {
    pub teams: TeamRegistry,
    pub workflows: WorkflowRegistry,
    pub runtime: RuntimeClient,
    pub bus: MessageBus,
    pub namespace: String,
}

/// Arguments for initiating a workflow by name
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct InitiateWorkflowArgs {
    pub workflow: String,
    #[serde(default)]
    pub inputs: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub workspace: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v0.1/commands/agent-chat", post(agent_chat))
        .route("/v0.1/commands/initiate-workflow", post(initiate_workflow))
        .with_state(state)
}

/// POST /v0.1/commands/agent-chat - Prompt an agent through its team role
#[utoipa::path(
    post,
    path = "/v0.1/commands/agent-chat",
    request_body = ChatPromptAgentArgs,
    responses(
        (status = 200, description = "Agent reply", body = ConversationMessage),
        (status = 404, description = "Team, member or agent not found, or agent not ready")
    ),
    tag = "commands"
)]
pub async fn agent_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(prompt): Json<ChatPromptAgentArgs>,
) -> Result<Json<ConversationMessage>, StatusCode> {
    let execution_id = header_value(&headers, EXECUTION_ID_HEADER);
    let execution_type = header_value(&headers, EXECUTION_TYPE_HEADER);

    let team = state
        .teams
        .get(&prompt.team, &state.namespace)
        .await
        .map_err(map_error)?;
    let member = team.get_member(&prompt.role).map_err(map_error)?;

    let reply = state
        .runtime
        .chat_prompt_agent(
            &member.agent,
            &member.identity,
            &prompt.team,
            &prompt.role,
            &prompt.history,
            &prompt.message,
            &execution_id,
            &execution_type,
        )
        .await
        .map_err(map_error)?;

    Ok(Json(ConversationMessage {
        sender: member.identity.clone(),
        message: reply,
    }))
}

/// POST /v0.1/commands/initiate-workflow - Publish an initiate message
#[utoipa::path(
    post,
    path = "/v0.1/commands/initiate-workflow",
    request_body = InitiateWorkflowArgs,
    responses(
        (status = 202, description = "Initiation published"),
        (status = 404, description = "Workflow not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "commands"
)]
pub async fn initiate_workflow(
    State(state): State<AppState>,
    Json(args): Json<InitiateWorkflowArgs>,
) -> Result<(StatusCode, Json<serde_json::Value>), StatusCode> {
    let workflow = state
        .workflows
        .get(&args.workflow, &state.namespace)
        .await
        .map_err(map_error)?;

    let record_id = Uuid::new_v4().to_string();
    let message = WorkflowMessage {
        id: record_id.clone(),
        workflow: workflow.spec.name.clone(),
        payload: WorkflowPayload::Initiate(InitiateWorkflowPayload {
            inputs: args.inputs,
            workspace: args.workspace,
        }),
    };
    state
        .bus
        .publish_json(WORKFLOW_ROUTER_QUEUE, &message)
        .await
        .map_err(map_error)?;
    tracing::debug!(workflow = %args.workflow, record = %record_id, "published initiate message");

    Ok((StatusCode::ACCEPTED, Json(json!({ "id": record_id }))))
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}
