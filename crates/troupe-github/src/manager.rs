// Workspace manager
//
// Owns the local filesystem side of GitHub workspaces. A single async mutex
// guards every git/filesystem operation, so only one workspace operation is
// in flight at a time. Consumes the workspace queue for code reports
// published when workflows finish.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use troupe_core::messages::{CodeReportPayload, WorkspaceMessage, WorkspacePayload};
use troupe_core::resources::GithubWorkspace;
use troupe_core::{workspace_queue, Result};
use troupe_storage::{HandlerId, MessageBus, QueueHandler, WorkspaceRegistry};

use crate::client::GithubClient;
use crate::tree::build_codebase_tree;
use crate::workspace::GitWorkspace;

pub struct WorkspaceManager {
    bus: MessageBus,
    workspaces: WorkspaceRegistry,
    github: Arc<GithubClient>,
    root_dir: PathBuf,
    namespace: String,
    fs_lock: AsyncMutex<()>,
    registration: Mutex<Option<HandlerId>>,
}

struct ManagerHandler(Arc<WorkspaceManager>);

#[async_trait]
impl QueueHandler for ManagerHandler {
    async fn handle(&self, payload: &[u8]) -> Result<()> {
        self.0.handle_incoming_message(payload).await;
        Ok(())
    }
}

impl WorkspaceManager {
    pub fn new(
        bus: MessageBus,
        workspaces: WorkspaceRegistry,
        github: Arc<GithubClient>,
        root_dir: impl Into<PathBuf>,
        namespace: &str,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            workspaces,
            github,
            root_dir: root_dir.into(),
            namespace: namespace.to_string(),
            fs_lock: AsyncMutex::new(()),
            registration: Mutex::new(None),
        })
    }

    pub async fn setup(self: Arc<Self>) -> Result<()> {
        let queue = workspace_queue(&self.namespace);
        let id = self
            .bus
            .register_callback(&queue, Arc::new(ManagerHandler(self.clone())))
            .await?;
        *self.registration.lock() = Some(id);
        tracing::info!(queue = %queue, "workspace manager attached");
        Ok(())
    }

    pub async fn teardown(&self) -> Result<()> {
        let id = self.registration.lock().take();
        if let Some(id) = id {
            self.bus
                .deregister_callback(&workspace_queue(&self.namespace), id)
                .await?;
        }
        Ok(())
    }

    async fn handle_incoming_message(&self, payload: &[u8]) {
        let message = match WorkspaceMessage::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("(workspace-mgr) dropping undecodable message: {e}");
                return;
            }
        };
        match message.payload {
            WorkspacePayload::CodeReport(report) => {
                if let Err(e) = self.handle_code_report(&message.workspace, report).await {
                    tracing::error!(
                        workspace = %message.workspace,
                        "(workspace-mgr) failed to handle code report: {e}"
                    );
                }
            }
        }
    }

    /// Apply a finished workflow's code outputs to the workspace branch and
    /// open a pull request for them.
    pub async fn handle_code_report(
        &self,
        workspace_name: &str,
        report: CodeReportPayload,
    ) -> Result<()> {
        let workspace = self.workspaces.get(workspace_name, &self.namespace).await?;
        if workspace.spec.workspace_kind != "github" {
            tracing::debug!(
                workspace = %workspace_name,
                kind = %workspace.spec.workspace_kind,
                "(workspace-mgr) ignoring non-github workspace"
            );
            return Ok(());
        }
        let Some(github_info) = workspace.spec.github_info else {
            tracing::debug!(workspace = %workspace_name, "(workspace-mgr) workspace has no github info");
            return Ok(());
        };
        if report.code_outputs.is_empty() {
            tracing::debug!(workspace = %workspace_name, "(workspace-mgr) code report had no outputs");
            return Ok(());
        }

        let default_branch = self
            .github
            .default_branch(github_info.installation_id, &github_info.repository_name)
            .await?;

        {
            let _guard = self.fs_lock.lock().await;
            let git = self.checkout(&github_info).await?;
            git.force_to_latest(&default_branch).await?;
            git.checkout_branch(&github_info.branch_name).await?;
            git.apply(&report.code_outputs).await?;
            git.commit_and_push(
                &github_info.branch_name,
                &format!("{} ({})", report.workflow_name, report.workflow_record),
            )
            .await?;
        }

        self.github
            .create_pull_request(
                github_info.installation_id,
                &github_info.repository_name,
                &format!("{}: {}", report.workflow_name, github_info.branch_name),
                &github_info.branch_name,
                &default_branch,
                &format!(
                    "Automated changes from workflow `{}` (record `{}`).",
                    report.workflow_name, report.workflow_record
                ),
            )
            .await?;
        tracing::info!(
            workspace = %workspace_name,
            branch = %github_info.branch_name,
            "opened pull request for workflow outputs"
        );
        Ok(())
    }

    /// Render the repository tree for workflow inputs
    pub async fn build_codebase_tree(
        &self,
        installation_id: u64,
        repository_name: &str,
        default_branch: &str,
    ) -> Result<String> {
        let _guard = self.fs_lock.lock().await;
        let git = self
            .checkout(&GithubWorkspace {
                installation_id,
                repository_name: repository_name.to_string(),
                branch_name: default_branch.to_string(),
                base_hash: String::new(),
            })
            .await?;
        git.force_to_latest(default_branch).await?;
        build_codebase_tree(git.root_dir())
    }

    async fn checkout(&self, github_info: &GithubWorkspace) -> Result<GitWorkspace> {
        let simple_name = github_info
            .repository_name
            .rsplit('/')
            .next()
            .unwrap_or(&github_info.repository_name);
        let root = self
            .root_dir
            .join(github_info.installation_id.to_string())
            .join(simple_name);
        let url = self
            .github
            .authenticated_repo_url(github_info.installation_id, &github_info.repository_name)
            .await?;
        GitWorkspace::setup(root, &url).await
    }
}
