// Workflow record store
//
// Execution records are keyed by (workflow name, record id). The spec is
// snapshotted into the record at creation and never rewritten; only context,
// outputs, errors and run_status change across updates.

use std::collections::BTreeMap;

use troupe_core::resources::WorkflowSpec;
use troupe_core::serialization::{deserialize, serialize};
use troupe_core::{Error, Result, TypedResult, WorkflowRecord};

use crate::kv::KvStore;

/// Root prefix for workflow execution records
pub const RECORD_ROOT: &str = "/records/workflows";

#[derive(Clone)]
pub struct WorkflowRecordStore {
    kv: KvStore,
}

impl WorkflowRecordStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    fn base_prefix(namespace: &str) -> String {
        format!("{RECORD_ROOT}/{namespace}/")
    }

    fn workflow_prefix(workflow: &str, namespace: &str) -> String {
        format!("{RECORD_ROOT}/{namespace}/{workflow}/")
    }

    fn record_key(workflow: &str, record_id: &str, namespace: &str) -> String {
        format!("{RECORD_ROOT}/{namespace}/{workflow}/{record_id}")
    }

    /// Create a record from the current spec snapshot, seeding the context
    /// with the supplied workflow inputs. The record id comes from the
    /// initiating message, so a redelivered initiate collides here.
    pub async fn create(
        &self,
        record_id: &str,
        spec: WorkflowSpec,
        inputs: &BTreeMap<String, String>,
        workspace: &str,
        namespace: &str,
    ) -> Result<WorkflowRecord> {
        let context: BTreeMap<String, TypedResult> = spec
            .inputs
            .iter()
            .filter_map(|input| {
                inputs.get(&input.name).map(|value| {
                    (
                        format!("workflow.{}", input.name),
                        TypedResult::new(input.arg_type.clone(), value.clone()),
                    )
                })
            })
            .collect();

        let record = WorkflowRecord::with_id(record_id, spec, context, workspace);
        let key = Self::record_key(&record.name, &record.id, namespace);
        let created = self.kv.put_if_absent(&key, serialize(&record)?).await?;
        if !created {
            return Err(Error::already_exists(format!(
                "workflow record '{}/{}'",
                record.name, record.id
            )));
        }
        tracing::debug!(workflow = %record.name, record = %record.id, "created workflow record");
        Ok(record)
    }

    pub async fn get(
        &self,
        workflow: &str,
        record_id: &str,
        namespace: &str,
    ) -> Result<WorkflowRecord> {
        let key = Self::record_key(workflow, record_id, namespace);
        let data = self
            .kv
            .get(&key)
            .await?
            .ok_or_else(|| Error::not_found(format!("workflow record '{workflow}/{record_id}'")))?;
        deserialize(&data)
    }

    /// List records, optionally narrowed to one workflow
    pub async fn list(&self, workflow: Option<&str>, namespace: &str) -> Result<Vec<WorkflowRecord>> {
        let prefix = match workflow {
            Some(workflow) => Self::workflow_prefix(workflow, namespace),
            None => Self::base_prefix(namespace),
        };
        let entries = self.kv.get_prefix(&prefix).await?;
        let mut records = Vec::with_capacity(entries.len());
        for (key, data) in entries {
            match deserialize::<WorkflowRecord>(&data) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(key = %key, "skipping malformed record: {e}"),
            }
        }
        Ok(records)
    }

    /// Persist an updated record. The record must already exist; records
    /// are only born through `create`.
    pub async fn update(&self, record: &WorkflowRecord, namespace: &str) -> Result<()> {
        let key = Self::record_key(&record.name, &record.id, namespace);
        if self.kv.get(&key).await?.is_none() {
            return Err(Error::not_found(format!(
                "workflow record '{}/{}'",
                record.name, record.id
            )));
        }
        self.kv.put(&key, serialize(record)?).await?;
        tracing::debug!(workflow = %record.name, record = %record.id, "updated workflow record");
        Ok(())
    }

    pub async fn delete(&self, workflow: &str, record_id: &str, namespace: &str) -> Result<bool> {
        let deleted = self
            .kv
            .delete(&Self::record_key(workflow, record_id, namespace))
            .await?;
        if deleted {
            tracing::debug!(workflow = %workflow, record = %record_id, "deleted workflow record");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use troupe_core::resources::WorkflowDerivedState;
    use troupe_core::{TypedArgument, DEFAULT_NAMESPACE};

    fn spec() -> WorkflowSpec {
        WorkflowSpec {
            name: "greet".to_string(),
            description: String::new(),
            team: "red".to_string(),
            inputs: vec![TypedArgument::text("q"), TypedArgument::text("lang")],
            outputs: vec![TypedArgument::text("a")],
            steps: BTreeMap::new(),
            derived_state: WorkflowDerivedState::default(),
        }
    }

    #[tokio::test]
    async fn create_seeds_context_from_declared_inputs() {
        let store = WorkflowRecordStore::new(KvStore::in_memory());
        let inputs = BTreeMap::from([
            ("q".to_string(), "hi".to_string()),
            ("lang".to_string(), "en".to_string()),
            ("extra".to_string(), "ignored".to_string()),
        ]);
        let record = store
            .create("rec-1", spec(), &inputs, "", DEFAULT_NAMESPACE)
            .await
            .unwrap();

        assert_eq!(record.context.len(), 2);
        assert_eq!(record.context["workflow.q"], TypedResult::text("hi"));
        assert_eq!(record.context["workflow.lang"], TypedResult::text("en"));
    }

    #[tokio::test]
    async fn records_round_trip_and_list_per_workflow() {
        let store = WorkflowRecordStore::new(KvStore::in_memory());
        let inputs = BTreeMap::from([
            ("q".to_string(), "hi".to_string()),
            ("lang".to_string(), "en".to_string()),
        ]);
        let record = store
            .create("rec-2", spec(), &inputs, "ws-1", DEFAULT_NAMESPACE)
            .await
            .unwrap();

        let fetched = store
            .get("greet", &record.id, DEFAULT_NAMESPACE)
            .await
            .unwrap();
        assert_eq!(fetched, record);
        assert_eq!(fetched.workspace, "ws-1");

        assert_eq!(
            store
                .list(Some("greet"), DEFAULT_NAMESPACE)
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(store.list(None, DEFAULT_NAMESPACE).await.unwrap().len(), 1);
        assert!(store
            .list(Some("other"), DEFAULT_NAMESPACE)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn update_requires_an_existing_record() {
        let store = WorkflowRecordStore::new(KvStore::in_memory());
        let record = WorkflowRecord::new(spec(), BTreeMap::new(), "");
        let err = store.update(&record, DEFAULT_NAMESPACE).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
