// Workflow router
//
// Consumes the well-known router queue and drives workflow executions:
// initiate messages create a record and trigger the steps whose inputs are
// already present; report messages fold an agent's results into the record,
// then either finish the workflow or fan out the next wave of triggers.
//
// Every "cannot locate X" path is a logged drop; the queue must keep
// moving. Only bus publish and store failures propagate, so the broker's
// redelivery re-runs the handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use troupe_core::messages::{
    ActionReportPayload, ActionTriggerPayload, InitiateWorkflowPayload, WorkflowMessage,
    WorkflowPayload,
};
use troupe_core::record::StepResult;
use troupe_core::resources::WorkflowStep;
use troupe_core::{
    Result, WorkflowFinishEvent, WorkflowRecord, WorkflowStartEvent, WORKFLOW_ROUTER_QUEUE,
};
use troupe_storage::{
    HandlerId, MessageBus, QueueHandler, TeamRegistry, WorkflowRecordStore, WorkflowRegistry,
};

use crate::inbox::AgentInbox;
use crate::watcher::ListenerId;

/// A start/finish subscriber; the returned future runs on its own task so a
/// slow or failing listener cannot stall routing or its peers.
pub type EventListener<E> = Arc<dyn Fn(E) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct WorkflowRouter {
    bus: MessageBus,
    workflows: WorkflowRegistry,
    teams: TeamRegistry,
    records: WorkflowRecordStore,
    namespace: String,
    start_listeners: Mutex<Vec<(ListenerId, EventListener<WorkflowStartEvent>)>>,
    finish_listeners: Mutex<Vec<(ListenerId, EventListener<WorkflowFinishEvent>)>>,
    registration: Mutex<Option<HandlerId>>,
}

struct RouterHandler(Arc<WorkflowRouter>);

#[async_trait]
impl QueueHandler for RouterHandler {
    async fn handle(&self, payload: &[u8]) -> Result<()> {
        self.0.route(payload).await
    }
}

impl WorkflowRouter {
    pub fn new(
        bus: MessageBus,
        workflows: WorkflowRegistry,
        teams: TeamRegistry,
        records: WorkflowRecordStore,
        namespace: &str,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            workflows,
            teams,
            records,
            namespace: namespace.to_string(),
            start_listeners: Mutex::new(Vec::new()),
            finish_listeners: Mutex::new(Vec::new()),
            registration: Mutex::new(None),
        })
    }

    /// Attach the router to its queue
    pub async fn setup(self: Arc<Self>) -> Result<()> {
        let id = self
            .bus
            .register_callback(WORKFLOW_ROUTER_QUEUE, Arc::new(RouterHandler(self.clone())))
            .await?;
        *self.registration.lock() = Some(id);
        tracing::info!(queue = WORKFLOW_ROUTER_QUEUE, "workflow router attached");
        Ok(())
    }

    pub async fn teardown(&self) -> Result<()> {
        let id = self.registration.lock().take();
        if let Some(id) = id {
            self.bus.deregister_callback(WORKFLOW_ROUTER_QUEUE, id).await?;
        }
        Ok(())
    }

    pub fn add_start_listener<F, Fut>(&self, listener: F) -> ListenerId
    where
        F: Fn(WorkflowStartEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let id = ListenerId::next();
        let listener: EventListener<WorkflowStartEvent> =
            Arc::new(move |event| Box::pin(listener(event)));
        self.start_listeners.lock().push((id, listener));
        id
    }

    pub fn add_finish_listener<F, Fut>(&self, listener: F) -> ListenerId
    where
        F: Fn(WorkflowFinishEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let id = ListenerId::next();
        let listener: EventListener<WorkflowFinishEvent> =
            Arc::new(move |event| Box::pin(listener(event)));
        self.finish_listeners.lock().push((id, listener));
        id
    }

    pub fn remove_finish_listener(&self, id: ListenerId) {
        self.finish_listeners.lock().retain(|(lid, _)| *lid != id);
    }

    /// Handle one message off the router queue
    pub async fn route(&self, payload: &[u8]) -> Result<()> {
        let message = match WorkflowMessage::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("(workflow-router) dropping undecodable message: {e}");
                return Ok(());
            }
        };
        tracing::debug!(
            workflow = %message.workflow,
            record = %message.id,
            "(workflow-router) received message"
        );

        match message.payload {
            WorkflowPayload::Initiate(payload) => {
                self.handle_initiate(&message.id, &message.workflow, payload)
                    .await
            }
            WorkflowPayload::Report(payload) => {
                self.handle_report(&message.id, &message.workflow, payload)
                    .await
            }
            WorkflowPayload::Trigger(_) => {
                tracing::debug!("(workflow-router) ignoring trigger message on router queue");
                Ok(())
            }
        }
    }

    async fn handle_initiate(
        &self,
        record_id: &str,
        workflow_name: &str,
        payload: InitiateWorkflowPayload,
    ) -> Result<()> {
        let workflow = match self.workflows.get(workflow_name, &self.namespace).await {
            Ok(workflow) => workflow,
            Err(e) => {
                tracing::warn!(workflow = %workflow_name, "cannot initiate: {e}");
                return Ok(());
            }
        };

        let record = match self
            .records
            .create(
                record_id,
                workflow.spec.clone(),
                &payload.inputs,
                &payload.workspace,
                &self.namespace,
            )
            .await
        {
            Ok(record) => record,
            Err(e) if e.is_already_exists() => {
                tracing::debug!(
                    workflow = %workflow_name,
                    record = %record_id,
                    "(workflow-router) record already exists, dropping initiate"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        for input in &workflow.spec.inputs {
            if !payload.inputs.contains_key(&input.name) {
                tracing::warn!(
                    workflow = %workflow_name,
                    record = %record.id,
                    input = %input.name,
                    "(workflow-router) missing workflow input, dropping initiate"
                );
                return Ok(());
            }
        }

        self.notify_start(WorkflowStartEvent {
            workflow_record: record.clone(),
        });

        for (step_name, step) in &workflow.spec.steps {
            if self.dependencies_ready(step, &record) {
                self.trigger_step(workflow_name, &record, step_name, step)
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_report(
        &self,
        record_id: &str,
        workflow_name: &str,
        payload: ActionReportPayload,
    ) -> Result<()> {
        let mut record = match self
            .records
            .get(workflow_name, record_id, &self.namespace)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    workflow = %workflow_name,
                    record = %record_id,
                    "(workflow-router) dropping report: {e}"
                );
                return Ok(());
            }
        };
        let workflow = match self.workflows.get(workflow_name, &self.namespace).await {
            Ok(workflow) => workflow,
            Err(e) => {
                tracing::warn!(
                    workflow = %workflow_name,
                    record = %record_id,
                    "(workflow-router) dropping report: {e}"
                );
                return Ok(());
            }
        };
        let Some(step) = workflow.spec.steps.get(&payload.step) else {
            tracing::warn!(
                workflow = %workflow_name,
                record = %record_id,
                step = %payload.step,
                "(workflow-router) dropping report for unknown step"
            );
            return Ok(());
        };

        let runs_after = record.runs_for(&payload.step) + 1;

        // Apply results. Errors only land on the record once the step is out
        // of retries; a run that will be retried stays invisible to the
        // completion test.
        if !payload.error.is_empty() {
            if runs_after > step.run_config.num_retries {
                for mapped in step.output_map.values() {
                    record.errors.insert(mapped.clone(), payload.error.clone());
                }
            }
        } else {
            for (out_name, value) in &payload.outputs {
                if let Some(mapped) = step.output_map.get(out_name) {
                    record.outputs.insert(mapped.clone(), value.clone());
                }
            }
        }

        // Every payload output lands in context, mapped or not, so
        // downstream steps can consume intermediate values.
        for (out_name, value) in &payload.outputs {
            record
                .context
                .insert(format!("{}.{}", payload.step, out_name), value.clone());
        }

        let run_entry = record.run_status.entry(payload.step.clone()).or_default();
        run_entry.runs += 1;
        run_entry.results.push(StepResult {
            outputs: payload.outputs.clone(),
            error: payload.error.clone(),
        });

        if let Err(e) = self.records.update(&record, &self.namespace).await {
            if e.is_not_found() {
                tracing::warn!(
                    workflow = %workflow_name,
                    record = %record_id,
                    "(workflow-router) record vanished before update, dropping report"
                );
                return Ok(());
            }
            return Err(e);
        }

        if record.is_complete() {
            tracing::info!(
                workflow = %workflow_name,
                record = %record_id,
                "workflow complete"
            );
            self.notify_finish(WorkflowFinishEvent {
                workflow_record: record,
            });
            return Ok(());
        }

        for (step_name, step) in &workflow.spec.steps {
            if !self.dependencies_ready(step, &record) {
                continue;
            }
            let runs = record.runs_for(step_name);
            let should_trigger = if runs == 0 {
                true
            } else {
                let last_errored = record
                    .run_status
                    .get(step_name)
                    .and_then(|s| s.last_result())
                    .map(|r| !r.error.is_empty())
                    .unwrap_or(false);
                last_errored && runs <= step.run_config.num_retries
            };
            if should_trigger {
                self.trigger_step(workflow_name, &record, step_name, step)
                    .await?;
            }
        }
        Ok(())
    }

    fn dependencies_ready(&self, step: &WorkflowStep, record: &WorkflowRecord) -> bool {
        step.input_map
            .values()
            .all(|path| record.context.contains_key(path))
    }

    async fn trigger_step(
        &self,
        workflow_name: &str,
        record: &WorkflowRecord,
        step_name: &str,
        step: &WorkflowStep,
    ) -> Result<()> {
        let team = match self.teams.get(&record.spec.team, &self.namespace).await {
            Ok(team) => team,
            Err(e) => {
                tracing::warn!(
                    workflow = %workflow_name,
                    record = %record.id,
                    team = %record.spec.team,
                    "(workflow-router) cannot trigger step: {e}"
                );
                return Ok(());
            }
        };
        let role_context = match team.get_role_description(&step.role) {
            Ok(description) => description.to_string(),
            Err(e) => {
                tracing::warn!(
                    workflow = %workflow_name,
                    record = %record.id,
                    step = %step_name,
                    "(workflow-router) cannot trigger step: {e}"
                );
                return Ok(());
            }
        };
        let inbox =
            match AgentInbox::for_member(&team, &step.role, &self.namespace, self.bus.clone()) {
                Ok(inbox) => inbox,
                Err(e) => {
                    tracing::warn!(
                        workflow = %workflow_name,
                        record = %record.id,
                        step = %step_name,
                        "(workflow-router) cannot trigger step: {e}"
                    );
                    return Ok(());
                }
            };

        let inputs: BTreeMap<String, String> = step
            .input_map
            .iter()
            .filter_map(|(action_input, path)| {
                record
                    .context
                    .get(path)
                    .map(|value| (action_input.clone(), value.value.clone()))
            })
            .collect();

        let payload = ActionTriggerPayload {
            step: step_name.to_string(),
            action: step.action.clone(),
            inputs,
            role_context,
        };
        // Publish failures propagate; the bus redelivers the inbound message
        inbox.trigger_action(workflow_name, &record.id, payload).await
    }

    fn notify_start(&self, event: WorkflowStartEvent) {
        let listeners: Vec<_> = self
            .start_listeners
            .lock()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            tokio::spawn(listener(event.clone()));
        }
    }

    fn notify_finish(&self, event: WorkflowFinishEvent) {
        let listeners: Vec<_> = self
            .finish_listeners
            .lock()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            tokio::spawn(listener(event.clone()));
        }
    }
}
