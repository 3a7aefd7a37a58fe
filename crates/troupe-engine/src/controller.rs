// Task controller: the reactor pattern over an informer
//
// Boot path: informer setup -> one full reconcile pass over the cached list
// -> event listener for incremental work. Handlers are reentrant; each event
// spawns its own reconciliation, bounded only by what the informer observes.
//
// Statuses written here (assignments) flow back through the watch, so a
// successful reconcile makes the follow-up event a no-op.

use std::sync::Arc;

use futures::future::join_all;
use troupe_core::resources::{TaskResource, TaskStatus};
use troupe_core::{Error, ResourceEvent, ResourceType, Result};
use troupe_storage::TaskRegistry;

use crate::executor::TaskExecutor;
use crate::informer::Informer;

pub struct TaskController {
    executor: Arc<TaskExecutor>,
    informer: Arc<Informer<TaskResource>>,
    tasks: TaskRegistry,
    namespace: String,
}

impl TaskController {
    pub fn new(
        executor: Arc<TaskExecutor>,
        informer: Arc<Informer<TaskResource>>,
        tasks: TaskRegistry,
        namespace: &str,
    ) -> Arc<Self> {
        Arc::new(Self {
            executor,
            informer,
            tasks,
            namespace: namespace.to_string(),
        })
    }

    pub async fn setup(self: Arc<Self>) -> Result<()> {
        tracing::debug!("(task-control) setup started");
        self.informer
            .setup()
            .await
            .map_err(|e| Error::setup(format!("task informer: {e}")))?;
        self.reconcile().await;

        let controller = self.clone();
        self.informer.add_event_listener(Box::new(move |event| {
            Self::handle_resource_event(&controller, event);
        }));
        tracing::debug!("(task-control) setup complete");
        Ok(())
    }

    pub fn teardown(&self) {
        self.informer.teardown();
        tracing::debug!("(task-control) teardown complete");
    }

    /// One pass over every cached task, reconciled concurrently
    pub async fn reconcile(&self) {
        tracing::info!("task controller reconciling");
        let tasks = self.informer.list_resources();
        join_all(tasks.iter().map(|task| self.reconcile_task(task))).await;
        tracing::info!("task controller reconciled");
    }

    async fn reconcile_task(&self, task: &TaskResource) {
        tracing::debug!(task = %task.spec.name, "(task-control) reconciling");
        if task.status.assignment.is_some() {
            return;
        }
        let assignment = match self.executor.assign_task(&task.spec).await {
            Ok(assignment) => assignment,
            Err(e) => {
                tracing::error!(task = %task.spec.name, "failed to assign task: {e}");
                return;
            }
        };
        // Write the assignment back; the informer cache catches up through
        // the event stream and the next reconcile is a no-op.
        let status = TaskStatus {
            name: task.status.name.clone(),
            status: "running".to_string(),
            assignment: Some(assignment),
        };
        if let Err(e) = self.update_status(&task.spec.name, status).await {
            tracing::error!(task = %task.spec.name, "failed to store assignment: {e}");
        }
    }

    /// Runs on the watcher context; all real work is spawned
    fn handle_resource_event(controller: &Arc<Self>, event: &ResourceEvent) {
        match event {
            ResourceEvent::Put(put) if put.resource_type == ResourceType::Task => {
                let task: TaskResource = match serde_json::from_value(put.resource.clone()) {
                    Ok(task) => task,
                    Err(e) => {
                        tracing::error!("(task-control) could not parse task from event: {e}");
                        return;
                    }
                };
                let controller = controller.clone();
                tokio::spawn(async move { controller.reconcile_task(&task).await });
            }
            ResourceEvent::Delete(delete) if delete.resource_type == ResourceType::Task => {
                let controller = controller.clone();
                let name = delete.name.clone();
                tokio::spawn(async move { controller.cancel_task(&name).await });
            }
            ResourceEvent::Delete(delete) if delete.resource_type == ResourceType::Agent => {
                let controller = controller.clone();
                let agent = delete.name.clone();
                tokio::spawn(async move { controller.handle_agent_deleted(&agent).await });
            }
            _ => {
                tracing::debug!(event = %event, "(task-control) ignoring event");
            }
        }
    }

    async fn cancel_task(&self, name: &str) {
        tracing::debug!(task = %name, "(task-control) cancelling");
        // The resource is already gone; the cache snapshot from before the
        // delete is the only place the assignment survives.
        let Some(task) = self.informer.get(name) else {
            return;
        };
        let Some(assignment) = task.status.assignment else {
            return;
        };
        if let Err(e) = self
            .executor
            .cancel_task(name, &assignment.agent_name)
            .await
        {
            tracing::error!(task = %name, "failed to cancel task: {e}");
        }
    }

    /// An agent went away: clear assignments pointing at it so the next
    /// reconcile pass re-assigns those tasks elsewhere.
    async fn handle_agent_deleted(&self, agent: &str) {
        let orphaned: Vec<TaskResource> = self
            .informer
            .list_resources()
            .into_iter()
            .filter(|task| {
                task.status
                    .assignment
                    .as_ref()
                    .is_some_and(|a| a.agent_name == agent)
            })
            .collect();
        if orphaned.is_empty() {
            return;
        }
        tracing::debug!(
            agent = %agent,
            tasks = orphaned.len(),
            "(task-control) clearing assignments for deleted agent"
        );
        for task in orphaned {
            let status = TaskStatus {
                name: task.status.name.clone(),
                status: "pending".to_string(),
                assignment: None,
            };
            if let Err(e) = self.update_status(&task.spec.name, status).await {
                tracing::error!(task = %task.spec.name, "failed to clear assignment: {e}");
            }
        }
    }

    async fn update_status(&self, name: &str, status: TaskStatus) -> Result<()> {
        let mut task = self.tasks.get(name, &self.namespace).await?;
        task.status = status;
        self.tasks.put(&task, &self.namespace).await
    }
}
