use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::Error;

/// A request from the model to invoke a tool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The arguments to pass to the tool.
    #[serde(default, deserialize_with = "nullable_map")]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Creates a tool call.
    #[inline]
    pub fn new<ID: Into<String>, N: Into<String>>(
        id: ID,
        name: N,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Checks that both `id` and `name` are present.
    pub fn validate(&self) -> Result<(), Error> {
        if self.id.is_empty() {
            return Err(Error::validation("id", "must not be empty"));
        }
        if self.name.is_empty() {
            return Err(Error::validation("name", "must not be empty"));
        }
        Ok(())
    }
}

fn nullable_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?
        .unwrap_or_default())
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    #[serde(default)]
    pub description: String,
    /// Parameters definition of the tool, as a
    /// [JSON schema](https://json-schema.org/) object. `Null` means the
    /// tool takes no parameters.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub parameters: Value,
}

impl ToolDefinition {
    /// Checks the name and, if present, the top-level schema type.
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() {
            return Err(Error::validation("name", "must not be empty"));
        }
        let schema_type = self
            .parameters
            .as_object()
            .and_then(|schema| schema.get("type"));
        match schema_type {
            None => Ok(()),
            Some(Value::String(ty)) if ty == "object" => Ok(()),
            Some(other) => Err(Error::validation(
                "parameters.type",
                format!("must be \"object\", got {other}"),
            )),
        }
    }
}

/// Controls whether, and which, tool the model must invoke.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides.
    Auto,
    /// The model must call at least one tool.
    Required,
    /// The model must not call tools.
    None,
    /// The model must call the named tool.
    Tool {
        /// Name of the tool, which must be one of the request's tools.
        name: String,
    },
}
