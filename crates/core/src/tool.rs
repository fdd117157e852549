//! Typed tool specs and batch dispatch of model tool calls.
//!
//! A [`ToolSpec`] pairs a tool definition with the Rust type its arguments
//! decode into. A [`ToolSet`] holds many specs and parses a whole batch of
//! [`ToolCall`]s, returning every call that parsed alongside the errors of
//! the ones that did not.

mod error;
mod object;
mod set;

use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;

use conduit_model::{Error, ToolCall, ToolDefinition};
use jsonschema::Validator;
use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{ToolError, ToolErrors};
pub use object::ParsedToolCall;
pub use set::{ToolSet, ToolSetBuilder};

/// A tool whose arguments decode into `T`.
///
/// The parameter schema is compiled once, at construction. Arguments are
/// checked against it before decoding, so constraints that `T` cannot
/// express (ranges, patterns, enums) are still enforced.
pub struct ToolSpec<T> {
    name: String,
    description: String,
    schema: Value,
    validator: Option<Validator>,
    _params: PhantomData<fn() -> T>,
}

impl<T: JsonSchema + DeserializeOwned> ToolSpec<T> {
    /// Creates a spec whose schema is derived from `T`.
    pub fn new<N: Into<String>, D: Into<String>>(name: N, description: D) -> Self {
        Self::with_schema(name, description, schema_for!(T).to_value())
    }
}

impl<T: DeserializeOwned> ToolSpec<T> {
    /// Creates a spec with an externally supplied schema.
    ///
    /// A schema that does not compile is logged, and the spec then only
    /// checks that arguments decode into `T`.
    pub fn with_schema<N: Into<String>, D: Into<String>>(
        name: N,
        description: D,
        schema: Value,
    ) -> Self {
        let name = name.into();
        let validator = match jsonschema::validator_for(&schema) {
            Ok(validator) => Some(validator),
            Err(err) => {
                warn!("schema of tool `{name}` does not compile: {err}");
                None
            }
        };
        Self {
            name,
            description: description.into(),
            schema,
            validator,
            _params: PhantomData,
        }
    }

    /// Returns the name of the tool.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parameter schema of the tool.
    #[inline]
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Returns the definition sent to the model.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.schema.clone(),
        }
    }

    /// Validates and decodes the arguments of `call`.
    pub fn parse(&self, call: &ToolCall) -> Result<TypedToolCall<T>, Error> {
        let arguments = Value::Object(call.arguments.clone());
        if let Some(validator) = &self.validator {
            let violations: Vec<String> = validator
                .iter_errors(&arguments)
                .map(|err| err.to_string())
                .collect();
            if !violations.is_empty() {
                return Err(Error::validation(
                    "arguments",
                    format!(
                        "tool `{}` got invalid arguments: {}",
                        self.name,
                        violations.join("; ")
                    ),
                ));
            }
        }
        let params = serde_json::from_value(arguments).map_err(|err| {
            Error::validation(
                "arguments",
                format!("tool `{}` cannot decode arguments: {err}", self.name),
            )
        })?;
        Ok(TypedToolCall {
            tool_name: call.name.clone(),
            tool_call_id: call.id.clone(),
            params,
        })
    }
}

impl<T> Debug for ToolSpec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("compiled", &self.validator.is_some())
            .finish()
    }
}

/// A tool call whose arguments were decoded into `T`.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedToolCall<T> {
    tool_name: String,
    tool_call_id: String,
    /// The decoded arguments.
    pub params: T,
}

impl<T> TypedToolCall<T> {
    /// Returns the name of the called tool.
    #[inline]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns the identifier of the call, used to answer it.
    #[inline]
    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }
}

#[cfg(test)]
mod tests {
    use conduit_model::ErrorKind;
    use serde::Deserialize;
    use serde_json::{Map, json};

    use super::*;

    #[derive(Debug, PartialEq, Deserialize, JsonSchema)]
    struct Person {
        #[schemars(range(min = 0, max = 120))]
        age: i64,
    }

    fn call(arguments: Value) -> ToolCall {
        let Value::Object(arguments) = arguments else {
            panic!("arguments must be an object");
        };
        ToolCall::new("call_1", "set_age", arguments)
    }

    #[test]
    fn test_derived_schema_bounds() {
        let spec = ToolSpec::<Person>::new("set_age", "Sets the age");
        assert!(spec.schema()["properties"]["age"].get("maximum").is_some());

        for age in [-1, 150] {
            let err = spec.parse(&call(json!({ "age": age }))).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
            assert!(err.message().contains("set_age"));
        }

        let parsed = spec.parse(&call(json!({ "age": 25 }))).unwrap();
        assert_eq!(parsed.params, Person { age: 25 });
        assert_eq!(parsed.tool_name(), "set_age");
        assert_eq!(parsed.tool_call_id(), "call_1");
    }

    #[test]
    fn test_external_schema() {
        let spec = ToolSpec::<Value>::with_schema(
            "set_age",
            "Sets the age",
            json!({
                "type": "object",
                "properties": {
                    "age": { "type": "integer", "minimum": 0, "maximum": 120 }
                },
                "required": ["age"]
            }),
        );
        assert!(spec.parse(&call(json!({}))).is_err());
        assert!(spec.parse(&call(json!({ "age": 121 }))).is_err());
        assert_eq!(spec.parse(&call(json!({ "age": 7 }))).unwrap().params["age"], 7);
        assert_eq!(spec.definition().parameters["required"][0], "age");
    }

    #[test]
    fn test_decode_failure_without_validator() {
        // `type` must be a string or an array, so this does not compile.
        let spec =
            ToolSpec::<Person>::with_schema("set_age", "", json!({ "type": 12 }));
        let err = spec
            .parse(&ToolCall::new("call_1", "set_age", Map::new()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.message().contains("cannot decode"));
    }
}
