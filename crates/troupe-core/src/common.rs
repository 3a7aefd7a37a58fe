// Typed argument / result pairs carried across the data plane

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A declared input or output of a workflow or action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TypedArgument {
    /// The data type of the argument (e.g. "text", "code")
    #[serde(rename = "type")]
    pub arg_type: String,
    /// The name of the argument
    pub name: String,
    /// A description of the argument
    #[serde(default)]
    pub description: String,
}

impl TypedArgument {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            arg_type: "text".to_string(),
            name: name.into(),
            description: String::new(),
        }
    }
}

/// A concrete value produced or consumed by a workflow step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TypedResult {
    /// The data type of the value (matches the declared argument type)
    #[serde(rename = "type")]
    pub result_type: String,
    /// The value itself, serialized as a string
    pub value: String,
}

impl TypedResult {
    pub fn new(result_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            result_type: result_type.into(),
            value: value.into(),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new("text", value)
    }
}
