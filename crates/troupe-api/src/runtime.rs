// Agent runtime client
//
// The chat command proxies through to the agent runtime over HTTP. An agent
// that exists but is not running yet is NotReady, which the HTTP surface
// reports as 404 alongside plain not-found.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use troupe_core::chat::ConversationMessage;
use troupe_core::{Error, Result, API_VERSION, EXECUTION_ID_HEADER, EXECUTION_TYPE_HEADER};
use troupe_storage::AgentRegistry;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct RuntimeClient {
    http: reqwest::Client,
    runtime_url: String,
    agents: AgentRegistry,
    namespace: String,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    identity: &'a str,
    team: &'a str,
    role: &'a str,
    history: &'a [ConversationMessage],
    message: &'a ConversationMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: String,
}

impl RuntimeClient {
    pub fn new(runtime_url: impl Into<String>, agents: AgentRegistry, namespace: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static config");
        Self {
            http,
            runtime_url: runtime_url.into(),
            agents,
            namespace: namespace.to_string(),
        }
    }

    /// Prompt an agent in its team/role context and return its reply
    #[allow(clippy::too_many_arguments)]
    pub async fn chat_prompt_agent(
        &self,
        agent: &str,
        identity: &str,
        team: &str,
        role: &str,
        history: &[ConversationMessage],
        message: &ConversationMessage,
        execution_id: &str,
        execution_type: &str,
    ) -> Result<String> {
        // NotFound bubbles; a known agent that is not serving is NotReady
        let resource = self.agents.get(agent, &self.namespace).await?;
        if resource.status.status != "running" {
            return Err(Error::not_ready(agent));
        }

        let url = format!("{}/{API_VERSION}/agent/{agent}/chat", self.runtime_url);
        let response = self
            .http
            .post(&url)
            .header(EXECUTION_ID_HEADER, execution_id)
            .header(EXECUTION_TYPE_HEADER, execution_type)
            .json(&ChatBody {
                identity,
                team,
                role,
                history,
                message,
            })
            .send()
            .await
            .map_err(|_| Error::not_ready(agent))?;

        if !response.status().is_success() {
            return Err(Error::not_ready(agent));
        }
        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Generic(anyhow::anyhow!("bad chat response: {e}")))?;
        Ok(chat.message)
    }
}
