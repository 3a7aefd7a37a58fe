// Task executor: HTTP egress to the agent runtime
//
// Assignment picks a team/role/agent and asks the runtime to start the task
// on that agent. Requests carry a per-request timeout; failures surface as
// typed errors with no retry at this layer, reconciliation is the retry loop.

use std::time::Duration;

use serde::Serialize;
use troupe_core::resources::{TaskAssignment, TaskSpec};
use troupe_core::{Error, Result, API_VERSION};
use troupe_storage::TeamRegistry;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TaskExecutor {
    client: reqwest::Client,
    runtime_url: String,
    teams: TeamRegistry,
    namespace: String,
}

#[derive(Serialize)]
struct AssignTaskBody<'a> {
    task: &'a str,
    description: &'a str,
    assignment: &'a TaskAssignment,
}

impl TaskExecutor {
    pub fn new(runtime_url: impl Into<String>, teams: TeamRegistry, namespace: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static config");
        Self {
            client,
            runtime_url: runtime_url.into(),
            teams,
            namespace: namespace.to_string(),
        }
    }

    /// Pick an agent for the task and tell the runtime to start it
    pub async fn assign_task(&self, task: &TaskSpec) -> Result<TaskAssignment> {
        let teams = self.teams.list(&self.namespace).await?;
        let team = teams
            .first()
            .ok_or_else(|| Error::not_found("a team to assign the task to"))?;
        let role = team
            .spec
            .layout
            .roles
            .first()
            .ok_or_else(|| Error::not_found("a role in the team layout"))?;
        let member = team.get_member(&role.name)?;

        let assignment = TaskAssignment {
            team_name: team.spec.name.clone(),
            role_name: role.name.clone(),
            agent_name: member.agent.clone(),
        };

        let url = format!(
            "{}/{API_VERSION}/agent/{}/tasks",
            self.runtime_url, assignment.agent_name
        );
        let response = self
            .client
            .post(&url)
            .json(&AssignTaskBody {
                task: &task.name,
                description: &task.description,
                assignment: &assignment,
            })
            .send()
            .await
            .map_err(|e| {
                Error::Generic(anyhow::anyhow!("could not reach agent runtime: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(Error::Generic(anyhow::anyhow!(
                "agent runtime rejected task assignment: {}",
                response.status()
            )));
        }
        Ok(assignment)
    }

    /// Tell the runtime to stop a task that is running on an agent
    pub async fn cancel_task(&self, task_name: &str, agent_name: &str) -> Result<()> {
        let url = format!(
            "{}/{API_VERSION}/agent/{agent_name}/tasks/{task_name}",
            self.runtime_url
        );
        let response = self.client.delete(&url).send().await.map_err(|e| {
            Error::Generic(anyhow::anyhow!("could not reach agent runtime: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(Error::Generic(anyhow::anyhow!(
                "agent runtime rejected task cancellation: {}",
                response.status()
            )));
        }
        Ok(())
    }
}
