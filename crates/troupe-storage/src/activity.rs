// Activity log storage
//
// Agent runtimes push thought/action events during executions; they land in
// Postgres in production and in memory in dev mode. The log is append-only.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;
use sqlx::{FromRow, PgPool};
use troupe_core::activity::{ActivityEvent, ActivityType, AgentContext, ExecutionType};
use troupe_core::{Error, Result};

/// Activity storage backend: Postgres or in-memory
#[derive(Clone)]
pub enum ActivityStore {
    Postgres(PgPool),
    Memory(Arc<RwLock<Vec<ActivityEvent>>>),
}

#[derive(Debug, FromRow)]
struct ActivityRow {
    execution_id: String,
    execution_type: String,
    #[sqlx(rename = "type")]
    activity_type: String,
    content: String,
    agent_context: String,
}

impl ActivityStore {
    pub async fn postgres(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("could not connect to activity database")?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS activity_events (
                id BIGSERIAL PRIMARY KEY,
                execution_id TEXT NOT NULL,
                execution_type TEXT NOT NULL,
                type TEXT NOT NULL,
                content TEXT NOT NULL,
                agent_context TEXT NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("could not ensure activity_events table")?;
        Ok(Self::Postgres(pool))
    }

    pub fn in_memory() -> Self {
        Self::Memory(Arc::new(RwLock::new(Vec::new())))
    }

    pub async fn store_activity(&self, activity: &ActivityEvent) -> Result<()> {
        match self {
            Self::Postgres(pool) => {
                let agent_context = serde_json::to_string(&activity.agent_context)
                    .map_err(|e| Error::Generic(anyhow::anyhow!("encode agent context: {e}")))?;
                sqlx::query(
                    r#"
                    INSERT INTO activity_events (execution_id, execution_type, type, content, agent_context)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(&activity.execution_id)
                .bind(activity.execution_type.as_str())
                .bind(activity.activity_type.as_str())
                .bind(&activity.content)
                .bind(&agent_context)
                .execute(pool)
                .await
                .context("could not insert activity event")?;
                Ok(())
            }
            Self::Memory(events) => {
                events.write().push(activity.clone());
                Ok(())
            }
        }
    }

    pub async fn fetch_activities(
        &self,
        execution_id: &str,
        execution_type: ExecutionType,
    ) -> Result<Vec<ActivityEvent>> {
        match self {
            Self::Postgres(pool) => {
                let rows = sqlx::query_as::<_, ActivityRow>(
                    r#"
                    SELECT execution_id, execution_type, type, content, agent_context
                    FROM activity_events
                    WHERE execution_id = $1 AND execution_type = $2
                    ORDER BY id
                    "#,
                )
                .bind(execution_id)
                .bind(execution_type.as_str())
                .fetch_all(pool)
                .await
                .context("could not fetch activity events")?;

                rows.into_iter().map(ActivityRow::into_event).collect()
            }
            Self::Memory(events) => Ok(events
                .read()
                .iter()
                .filter(|e| {
                    e.execution_id == execution_id && e.execution_type == execution_type
                })
                .cloned()
                .collect()),
        }
    }
}

impl ActivityRow {
    fn into_event(self) -> Result<ActivityEvent> {
        let agent_context: AgentContext = serde_json::from_str(&self.agent_context)
            .map_err(|e| Error::deserialization(format!("bad agent context: {e}")))?;
        Ok(ActivityEvent {
            execution_id: self.execution_id,
            execution_type: ExecutionType::from_str(&self.execution_type)?,
            activity_type: ActivityType::from_str(&self.activity_type)?,
            content: self.content,
            agent_context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn activities_are_fetched_per_execution() {
        let store = ActivityStore::in_memory();
        let event = ActivityEvent {
            execution_id: "rec-1".to_string(),
            execution_type: ExecutionType::Workflow,
            activity_type: ActivityType::Thought,
            content: "planning".to_string(),
            agent_context: AgentContext::default(),
        };
        store.store_activity(&event).await.unwrap();

        let fetched = store
            .fetch_activities("rec-1", ExecutionType::Workflow)
            .await
            .unwrap();
        assert_eq!(fetched, vec![event]);

        assert!(store
            .fetch_activities("rec-1", ExecutionType::Task)
            .await
            .unwrap()
            .is_empty());
    }
}
