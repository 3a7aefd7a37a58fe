// Stored-value encoding
//
// Values in the store are the JSON document of the resource wrapped in one
// additional JSON-string quoting layer, because the watch stream re-encodes
// values. Both directions go through these helpers so the registry, the
// record store and the watcher all speak the same format.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Serialize a value for storage: JSON document, quoted once more.
pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let document = serde_json::to_string(value)
        .map_err(|e| Error::Generic(anyhow::anyhow!("serialize: {e}")))?;
    let quoted = serde_json::to_string(&document)
        .map_err(|e| Error::Generic(anyhow::anyhow!("serialize: {e}")))?;
    Ok(quoted.into_bytes())
}

/// Deserialize a stored value: unquote, then parse the inner document.
pub fn deserialize<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    let raw = std::str::from_utf8(data)
        .map_err(|e| Error::deserialization(format!("stored value is not utf-8: {e}")))?;
    let document: String = serde_json::from_str(raw)
        .map_err(|e| Error::deserialization(format!("stored value is not quoted JSON: {e}")))?;
    serde_json::from_str(&document)
        .map_err(|e| Error::deserialization(format!("could not parse stored document: {e}")))
}

/// Parse the inner document of a stored value without binding to a type.
pub fn deserialize_value(data: &[u8]) -> Result<serde_json::Value> {
    deserialize::<serde_json::Value>(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{AgentResource, AgentSpec, Resource};

    #[test]
    fn stored_values_are_double_encoded() {
        let resource = AgentResource::initial_state(AgentSpec {
            name: "alice".to_string(),
            image: "troupe/agent:latest".to_string(),
            capabilities: Default::default(),
        });

        let bytes = serialize(&resource).unwrap();
        // Outer layer is a JSON string, not an object
        assert_eq!(bytes[0], b'"');

        let back: AgentResource = deserialize(&bytes).unwrap();
        assert_eq!(back, resource);
    }

    #[test]
    fn every_resource_kind_round_trips() {
        use crate::resources::{
            IdentityResource, IdentitySpec, TaskResource, TaskSpec, TeamResource, TeamSpec,
            WorkflowResource, WorkflowSpec, WorkspaceResource,
        };

        fn assert_round_trip<T>(value: &T)
        where
            T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
        {
            let back: T = deserialize(&serialize(value).unwrap()).unwrap();
            assert_eq!(&back, value);
        }

        assert_round_trip(&AgentResource::initial_state(AgentSpec {
            name: "alice".to_string(),
            image: "img".to_string(),
            capabilities: Default::default(),
        }));
        assert_round_trip(&IdentityResource::initial_state(IdentitySpec {
            name: "alice".to_string(),
            description: "persona".to_string(),
        }));
        assert_round_trip(&TeamResource::initial_state(TeamSpec {
            name: "red".to_string(),
            team_type: "dev".to_string(),
            description: String::new(),
            layout: Default::default(),
            members: Default::default(),
            workflows: vec![],
        }));
        assert_round_trip(&WorkflowResource::initial_state(WorkflowSpec {
            name: "wf".to_string(),
            description: String::new(),
            team: "red".to_string(),
            inputs: vec![],
            outputs: vec![],
            steps: Default::default(),
            derived_state: Default::default(),
        }));
        assert_round_trip(&TaskResource::initial_state(TaskSpec {
            name: "t1".to_string(),
            description: String::new(),
        }));
        assert_round_trip(&WorkspaceResource::github(
            "issue-7", 42, "acme/widgets", "issue-7", "abc123",
        ));
    }

    #[test]
    fn single_encoded_data_is_a_deserialization_error() {
        let resource = AgentResource::initial_state(AgentSpec {
            name: "alice".to_string(),
            image: "img".to_string(),
            capabilities: Default::default(),
        });
        let single = serde_json::to_vec(&resource).unwrap();
        let err = deserialize::<AgentResource>(&single).unwrap_err();
        assert!(matches!(err, Error::Deserialization(_)));
    }
}
