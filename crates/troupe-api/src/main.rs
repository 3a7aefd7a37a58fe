// Troupe control-plane server
//
// Wires the whole dependency graph once at startup and passes it explicitly:
// storage backends -> registries -> watcher -> informers -> router ->
// reactors -> integration -> HTTP surface. No lazy globals; tests inject
// in-memory fakes through the same constructors.

mod api;
mod config;
mod runtime;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use troupe_core::activity::{ActivityEvent, ActivityType, AgentContext, ExecutionType};
use troupe_core::chat::{ChatPromptAgentArgs, ConversationMessage};
use troupe_core::record::{StepResult, StepRunStatus};
use troupe_core::resources::{
    AgentCapabilities, AgentContainer, AgentResource, AgentSpec, AgentStatus, GithubWorkspace,
    IdentityResource, IdentitySpec, IdentityStatus, Layout, Member, Role, StepRunConfig,
    TaskAssignment, TaskResource, TaskSpec, TaskStatus, TeamResource, TeamSpec, TeamStatus,
    TeamWorkflow, WorkflowDerivedState, WorkflowResource, WorkflowSpec, WorkflowStatus,
    WorkflowStep, WorkspaceResource, WorkspaceSpec, WorkspaceStatus,
};
use troupe_core::{
    DeleteResourceEvent, DeleteStatusEvent, PutResourceEvent, PutStatusEvent, ResourceEvent,
    ResourceType, StatusEvent, TypedArgument, TypedResult, WorkflowRecord,
};
use troupe_engine::{
    Informer, ResourceWatcher, StatusIngest, TaskController, TaskExecutor, WorkflowRouter,
};
use troupe_github::{GithubApp, GithubClient, WorkspaceManager};
use troupe_storage::{
    ActivityStore, AgentRegistry, IdentityRegistry, KvStore, MessageBus, TaskRegistry,
    TeamRegistry, WorkflowRecordStore, WorkflowRegistry, WorkspaceRegistry,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::runtime::RuntimeClient;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    dev_mode: bool,
}

#[derive(Clone)]
struct HealthState {
    dev_mode: bool,
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        dev_mode: state.dev_mode,
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        api::agents::create_agent,
        api::agents::list_agents,
        api::agents::get_agent,
        api::agents::update_agent,
        api::agents::delete_agent,
        api::identities::create_identity,
        api::identities::list_identities,
        api::identities::get_identity,
        api::identities::update_identity,
        api::identities::delete_identity,
        api::teams::create_team,
        api::teams::list_teams,
        api::teams::get_team,
        api::teams::update_team,
        api::teams::delete_team,
        api::tasks::create_task,
        api::tasks::list_tasks,
        api::tasks::get_task,
        api::tasks::update_task,
        api::tasks::delete_task,
        api::workflows::create_workflow,
        api::workflows::list_workflows,
        api::workflows::get_workflow,
        api::workflows::update_workflow,
        api::workflows::delete_workflow,
        api::records::list_records,
        api::records::get_record,
        api::records::delete_record,
        api::workspaces::list_workspaces,
        api::workspaces::get_workspace,
        api::workspaces::delete_workspace,
        api::commands::agent_chat,
        api::commands::initiate_workflow,
        api::status::status_update,
        api::events::resource_events,
        api::activities::list_activities,
        api::activities::store_activity,
        api::github::handle_webhook,
    ),
    components(
        schemas(
            AgentResource, AgentSpec, AgentStatus, AgentCapabilities, AgentContainer,
            IdentityResource, IdentitySpec, IdentityStatus,
            TeamResource, TeamSpec, TeamStatus, Layout, Role, Member, TeamWorkflow,
            TaskResource, TaskSpec, TaskStatus, TaskAssignment,
            WorkflowResource, WorkflowSpec, WorkflowStatus, WorkflowStep, StepRunConfig,
            WorkflowDerivedState, WorkflowRecord, StepResult, StepRunStatus,
            WorkspaceResource, WorkspaceSpec, WorkspaceStatus, GithubWorkspace,
            TypedArgument, TypedResult,
            ResourceEvent, PutResourceEvent, DeleteResourceEvent,
            StatusEvent, PutStatusEvent, DeleteStatusEvent,
            ActivityEvent, ExecutionType, ActivityType, AgentContext,
            ChatPromptAgentArgs, ConversationMessage,
            api::commands::InitiateWorkflowArgs,
            api::common::ListResponse<AgentResource>,
            api::common::ListResponse<IdentityResource>,
            api::common::ListResponse<TeamResource>,
            api::common::ListResponse<TaskResource>,
            api::common::ListResponse<WorkflowResource>,
            api::common::ListResponse<WorkflowRecord>,
            api::common::ListResponse<WorkspaceResource>,
            api::common::ListResponse<ActivityEvent>,
        )
    ),
    tags(
        (name = "agents", description = "Agent resource endpoints"),
        (name = "identities", description = "Identity resource endpoints"),
        (name = "teams", description = "Team resource endpoints"),
        (name = "tasks", description = "Task resource endpoints"),
        (name = "workflows", description = "Workflow resource endpoints"),
        (name = "workflow-records", description = "Workflow execution records"),
        (name = "workspaces", description = "Workspace resources"),
        (name = "commands", description = "Agent chat and workflow initiation"),
        (name = "events", description = "Change feed (SSE) and status ingest"),
        (name = "activities", description = "Activity log"),
        (name = "github", description = "GitHub integration webhook")
    ),
    info(
        title = "Troupe API",
        version = "0.1.0",
        description = "Control plane for declarative agents, teams and workflows",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "troupe=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("troupe-api starting...");

    // Storage backends: NATS/Postgres in production, in-memory in dev mode
    let kv = match &config.nats_url {
        Some(url) => KvStore::nats(url, &config.kv_bucket)
            .await
            .context("failed to open the resource KV")?,
        None => {
            tracing::warn!("NATS_URL not set, using in-memory resource store (dev mode)");
            KvStore::in_memory()
        }
    };
    let bus = match &config.nats_url {
        Some(url) => MessageBus::nats(url)
            .await
            .context("failed to connect the message bus")?,
        None => MessageBus::in_memory(),
    };
    let activity = match &config.database_url {
        Some(url) => ActivityStore::postgres(url)
            .await
            .context("failed to connect the activity database")?,
        None => {
            tracing::warn!("DATABASE_URL not set, keeping activity log in memory (dev mode)");
            ActivityStore::in_memory()
        }
    };
    let dev_mode = kv.is_dev_mode();

    // Typed stores
    let agents = AgentRegistry::new(kv.clone());
    let identities = IdentityRegistry::new(kv.clone());
    let teams = TeamRegistry::new(kv.clone());
    let tasks = TaskRegistry::new(kv.clone());
    let workflows = WorkflowRegistry::new(kv.clone());
    let workspaces = WorkspaceRegistry::new(kv.clone());
    let records = WorkflowRecordStore::new(kv.clone());

    // Change feed
    let watcher = Arc::new(
        ResourceWatcher::new(kv.clone()).with_crash_on_failure(config.watch_crash_on_failure),
    );
    watcher.start();

    // Workflow engine
    let router = WorkflowRouter::new(
        bus.clone(),
        workflows.clone(),
        teams.clone(),
        records.clone(),
        &config.namespace,
    );
    router
        .clone()
        .setup()
        .await
        .context("failed to attach the workflow router")?;

    // Task reactor
    let task_informer = Arc::new(
        Informer::<TaskResource>::new(tasks.clone(), watcher.clone(), &config.namespace)
            .forwarding(ResourceType::Agent),
    );
    let executor = Arc::new(TaskExecutor::new(
        &config.runtime_url,
        teams.clone(),
        &config.namespace,
    ));
    let controller = TaskController::new(executor, task_informer, tasks.clone(), &config.namespace);
    controller
        .clone()
        .setup()
        .await
        .context("failed to start the task controller")?;

    // Status ingest and runtime proxy
    let ingest = StatusIngest::new(agents.clone());
    let runtime_client = RuntimeClient::new(&config.runtime_url, agents.clone(), &config.namespace);

    // GitHub integration (optional; degrade gracefully when unconfigured)
    let github_app = match &config.github {
        Some(github_config) => {
            let private_key = std::fs::read_to_string(&github_config.private_key_path)
                .with_context(|| {
                    format!(
                        "failed to read GitHub App key at {}",
                        github_config.private_key_path
                    )
                })?;
            let client = Arc::new(GithubClient::new(
                github_config.app_id,
                &private_key,
                &github_config.app_name,
            )?);
            let manager = WorkspaceManager::new(
                bus.clone(),
                workspaces.clone(),
                client.clone(),
                &config.workspace_dir,
                &config.namespace,
            );
            manager
                .clone()
                .setup()
                .await
                .context("failed to attach the workspace manager")?;
            let app = GithubApp::new(
                client,
                manager,
                router.clone(),
                bus.clone(),
                workflows.clone(),
                workspaces.clone(),
                &config.namespace,
            );
            app.clone().setup();
            tracing::info!(app_name = %github_config.app_name, "GitHub integration enabled");
            Some(app)
        }
        None => {
            tracing::warn!("GITHUB_APP_ID/GITHUB_APP_PRIVATE_KEY not set, GitHub integration disabled");
            None
        }
    };

    // HTTP surface
    let mut api_routes = Router::new()
        .merge(api::agents::routes(api::agents::AppState {
            registry: agents,
            namespace: config.namespace.clone(),
        }))
        .merge(api::identities::routes(api::identities::AppState {
            registry: identities,
            namespace: config.namespace.clone(),
        }))
        .merge(api::teams::routes(api::teams::AppState {
            registry: teams.clone(),
            namespace: config.namespace.clone(),
        }))
        .merge(api::tasks::routes(api::tasks::AppState {
            registry: tasks,
            namespace: config.namespace.clone(),
        }))
        .merge(api::workflows::routes(api::workflows::AppState {
            registry: workflows.clone(),
            namespace: config.namespace.clone(),
        }))
        .merge(api::records::routes(api::records::AppState {
            records,
            namespace: config.namespace.clone(),
        }))
        .merge(api::workspaces::routes(api::workspaces::AppState {
            registry: workspaces,
            namespace: config.namespace.clone(),
        }))
        .merge(api::commands::routes(api::commands::AppState {
            teams,
            workflows,
            runtime: runtime_client,
            bus,
            namespace: config.namespace.clone(),
        }))
        .merge(api::status::routes(api::status::AppState { ingest }))
        .merge(api::events::routes(api::events::AppState {
            watcher: watcher.clone(),
        }))
        .merge(api::activities::routes(api::activities::AppState {
            store: activity,
        }));
    if let Some(app) = github_app {
        api_routes = api_routes.merge(api::github::routes(api::github::AppState { app }));
    }

    let app = Router::new()
        .route("/health", get(health).with_state(HealthState { dev_mode }))
        .merge(api_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("HTTP server listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
