// GitHub App glue
//
// Inbound: webhook payloads turn issues into workspaces plus workflow
// initiations, and issue comments into reactions. Outbound: a workflow
// finish listener projects code-typed outputs into a workspace message for
// the manager, which lands them on a branch and opens a pull request.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use troupe_core::messages::{
    CodeOutput, CodeReportPayload, InitiateWorkflowPayload, WorkflowMessage, WorkflowPayload,
    WorkspaceMessage, WorkspacePayload,
};
use troupe_core::resources::WorkspaceResource;
use troupe_core::{
    workspace_queue, Error, Result, WorkflowFinishEvent, WORKFLOW_ROUTER_QUEUE,
};
use troupe_engine::{ListenerId, WorkflowRouter};
use troupe_storage::{MessageBus, WorkflowRegistry, WorkspaceRegistry};

use crate::client::GithubClient;
use crate::manager::WorkspaceManager;

/// The workflow initiated for a newly opened issue
const ISSUE_WORKFLOW: &str = "ImplementFeature";

pub struct GithubApp {
    github: Arc<GithubClient>,
    manager: Arc<WorkspaceManager>,
    router: Arc<WorkflowRouter>,
    bus: MessageBus,
    workflows: WorkflowRegistry,
    workspaces: WorkspaceRegistry,
    namespace: String,
    finish_registration: Mutex<Option<ListenerId>>,
}

impl GithubApp {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        github: Arc<GithubClient>,
        manager: Arc<WorkspaceManager>,
        router: Arc<WorkflowRouter>,
        bus: MessageBus,
        workflows: WorkflowRegistry,
        workspaces: WorkspaceRegistry,
        namespace: &str,
    ) -> Arc<Self> {
        Arc::new(Self {
            github,
            manager,
            router,
            bus,
            workflows,
            workspaces,
            namespace: namespace.to_string(),
            finish_registration: Mutex::new(None),
        })
    }

    pub fn setup(self: Arc<Self>) {
        let app = self.clone();
        let id = self.router.add_finish_listener(move |event| {
            let app = app.clone();
            async move {
                if let Err(e) = app.handle_workflow_finish(event).await {
                    tracing::error!("(github-app) workflow finish handling failed: {e}");
                }
            }
        });
        *self.finish_registration.lock() = Some(id);
    }

    pub fn teardown(&self) {
        if let Some(id) = self.finish_registration.lock().take() {
            self.router.remove_finish_listener(id);
        }
    }

    /// Entry point for raw webhook payloads
    pub async fn handle_webhook_payload(&self, payload: Value) -> Result<()> {
        let (installation_id, repository) = parse_webhook_envelope(&payload)?;

        let action = payload.get("action").and_then(Value::as_str).unwrap_or("");
        if payload.get("issue").is_some() && matches!(action, "opened" | "reopened") {
            self.handle_issue_created(installation_id, &repository, &payload)
                .await
        } else if payload.get("issue").is_some() && payload.get("comment").is_some() {
            self.handle_issue_comment(installation_id, &repository, &payload)
                .await
        } else {
            tracing::debug!(action = %action, "(github-app) unrecognized webhook payload");
            Ok(())
        }
    }

    async fn handle_issue_created(
        &self,
        installation_id: u64,
        repository: &str,
        payload: &Value,
    ) -> Result<()> {
        let issue_number = payload
            .pointer("/issue/number")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::webhook("missing issue number"))?;
        let issue_title = payload
            .pointer("/issue/title")
            .and_then(Value::as_str)
            .unwrap_or("");
        let issue_body = payload
            .pointer("/issue/body")
            .and_then(Value::as_str)
            .unwrap_or("");

        let default_branch = self
            .github
            .default_branch(installation_id, repository)
            .await?;
        let base_hash = self
            .github
            .branch_sha(installation_id, repository, &default_branch)
            .await?;

        let workspace_name = format!("issue-{issue_number}");
        let workspace = WorkspaceResource::github(
            workspace_name.clone(),
            installation_id,
            repository,
            workspace_name.clone(),
            base_hash,
        );
        self.workspaces
            .update_or_create(workspace, &self.namespace)
            .await?;

        let codebase_tree = self
            .manager
            .build_codebase_tree(installation_id, repository, &default_branch)
            .await?;

        self.initiate_workflow(
            ISSUE_WORKFLOW,
            [
                (
                    "feature_description".to_string(),
                    format!("Title: {issue_title}\n\nRequest:\n{issue_body}"),
                ),
                ("codebase_tree".to_string(), codebase_tree),
            ]
            .into(),
            &workspace_name,
        )
        .await?;

        self.github
            .comment_on_issue(
                installation_id,
                repository,
                issue_number,
                "Thanks for opening this issue! Troupe is working on it.",
            )
            .await?;
        tracing::info!(
            repository = %repository,
            issue = issue_number,
            "started workflow for issue"
        );
        Ok(())
    }

    async fn handle_issue_comment(
        &self,
        installation_id: u64,
        repository: &str,
        payload: &Value,
    ) -> Result<()> {
        let comment_id = payload
            .pointer("/comment/id")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::webhook("missing comment id"))?;
        let author = payload
            .pointer("/comment/user/login")
            .and_then(Value::as_str)
            .unwrap_or("");
        // Do not react to our own comments
        if author == self.github.bot_login() {
            return Ok(());
        }
        self.github
            .react_to_comment(installation_id, repository, comment_id, "heart")
            .await
    }

    /// Publish an initiate message the way the command API does
    async fn initiate_workflow(
        &self,
        workflow_name: &str,
        inputs: std::collections::BTreeMap<String, String>,
        workspace: &str,
    ) -> Result<()> {
        let workflow = self.workflows.get(workflow_name, &self.namespace).await?;
        let message = WorkflowMessage {
            id: uuid::Uuid::new_v4().to_string(),
            workflow: workflow.spec.name.clone(),
            payload: WorkflowPayload::Initiate(InitiateWorkflowPayload {
                inputs,
                workspace: workspace.to_string(),
            }),
        };
        self.bus.publish_json(WORKFLOW_ROUTER_QUEUE, &message).await
    }

    /// Project a finished workflow's code outputs into a workspace message
    pub async fn handle_workflow_finish(&self, event: WorkflowFinishEvent) -> Result<()> {
        let record = event.workflow_record;
        if record.workspace.is_empty() {
            tracing::debug!(record = %record.id, "(github-app) record has no workspace");
            return Ok(());
        }

        let mut code_outputs = Vec::new();
        for output in record.spec.outputs.iter().filter(|o| o.arg_type == "code") {
            let Some(value) = record.outputs.get(&output.name) else {
                continue;
            };
            // A 'code' output may carry one CodeOutput or a list of them
            match serde_json::from_str::<Vec<CodeOutput>>(&value.value) {
                Ok(outputs) => code_outputs.extend(outputs),
                Err(_) => match serde_json::from_str::<CodeOutput>(&value.value) {
                    Ok(output) => code_outputs.push(output),
                    Err(e) => {
                        tracing::error!(
                            record = %record.id,
                            output = %output.name,
                            "(github-app) could not parse code output: {e}"
                        );
                    }
                },
            }
        }

        let message = WorkspaceMessage {
            workspace: record.workspace.clone(),
            namespace: self.namespace.clone(),
            payload: WorkspacePayload::CodeReport(CodeReportPayload {
                workflow_name: record.name.clone(),
                workflow_record: record.id.clone(),
                code_outputs,
            }),
        };
        self.bus
            .publish_json(&workspace_queue(&self.namespace), &message)
            .await
    }
}

/// Every webhook must name the installation and repository it is for
fn parse_webhook_envelope(payload: &Value) -> Result<(u64, String)> {
    let installation_id = payload
        .pointer("/installation/id")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::webhook("missing installation id"))?;
    let repository = payload
        .pointer("/repository/full_name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::webhook("missing repository name"))?;
    Ok((installation_id, repository))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_envelope_requires_installation_and_repository() {
        let complete = serde_json::json!({
            "installation": {"id": 42},
            "repository": {"full_name": "acme/widgets"},
        });
        assert_eq!(
            parse_webhook_envelope(&complete).unwrap(),
            (42, "acme/widgets".to_string())
        );

        let missing_installation = serde_json::json!({
            "repository": {"full_name": "acme/widgets"},
        });
        assert!(matches!(
            parse_webhook_envelope(&missing_installation).unwrap_err(),
            Error::WebhookMalformed(_)
        ));

        let missing_repo = serde_json::json!({"installation": {"id": 42}});
        assert!(matches!(
            parse_webhook_envelope(&missing_repo).unwrap_err(),
            Error::WebhookMalformed(_)
        ));
    }
}
