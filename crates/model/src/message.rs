use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, ToolCall};

/// A complete conversation turn.
///
/// On the wire every turn is a flat record discriminated by `role`, which
/// keeps it readable by consumers of the older single-record shape.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// The system instructions.
    System {
        /// The instruction text.
        content: String,
    },
    /// A user input text.
    User {
        /// The input text.
        content: String,
    },
    /// An assistant turn, with text, tool calls, or both.
    Assistant {
        /// The generated text, possibly empty.
        content: String,
        /// Tools the model asked to call.
        tool_calls: Vec<ToolCall>,
    },
    /// The result of calling a tool.
    ToolResult {
        /// The identifier of the tool call this result answers.
        tool_call_id: String,
        /// The output of the tool.
        output: String,
        /// Whether the tool failed.
        is_error: bool,
    },
}

impl Message {
    /// Creates a system message.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    /// Creates a text-only assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: vec![],
        }
    }

    /// Creates an assistant message carrying tool calls.
    #[inline]
    pub fn assistant_with_tool_calls<S: Into<String>>(
        content: S,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    /// Creates a successful tool result.
    #[inline]
    pub fn tool_result<ID: Into<String>, S: Into<String>>(
        tool_call_id: ID,
        output: S,
    ) -> Self {
        Message::ToolResult {
            tool_call_id: tool_call_id.into(),
            output: output.into(),
            is_error: false,
        }
    }

    /// Creates a failed tool result.
    #[inline]
    pub fn tool_error<ID: Into<String>, S: Into<String>>(
        tool_call_id: ID,
        output: S,
    ) -> Self {
        Message::ToolResult {
            tool_call_id: tool_call_id.into(),
            output: output.into(),
            is_error: true,
        }
    }

    /// Returns the wire role of this message.
    #[inline]
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::ToolResult { .. } => "tool",
        }
    }

    /// Checks the per-variant invariants.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Message::System { content } | Message::User { content } => {
                if content.is_empty() {
                    return Err(Error::validation(
                        "content",
                        "must not be empty",
                    ));
                }
            }
            Message::Assistant {
                content,
                tool_calls,
            } => {
                if content.is_empty() && tool_calls.is_empty() {
                    return Err(Error::validation(
                        "content",
                        "must not be empty when there are no tool calls",
                    ));
                }
                for (idx, call) in tool_calls.iter().enumerate() {
                    call.validate()
                        .map_err(|err| err.within(format!("tool_calls[{idx}]")))?;
                }
            }
            Message::ToolResult {
                tool_call_id,
                output,
                ..
            } => {
                if tool_call_id.is_empty() {
                    return Err(Error::validation(
                        "tool_call_id",
                        "must not be empty",
                    ));
                }
                if output.is_empty() {
                    return Err(Error::validation(
                        "output",
                        "must not be empty",
                    ));
                }
            }
        }
        Ok(())
    }
}

// ------------------------
// Wire records
// ------------------------

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum WireMessage<'a> {
    System {
        content: &'a str,
    },
    User {
        content: &'a str,
    },
    Assistant {
        #[serde(skip_serializing_if = "is_empty_str")]
        content: &'a str,
        #[serde(skip_serializing_if = "is_empty_slice")]
        tool_calls: &'a [ToolCall],
    },
    Tool {
        tool_call_id: &'a str,
        content: &'a str,
        #[serde(skip_serializing_if = "is_false")]
        is_error: bool,
    },
}

fn is_empty_str(s: &&str) -> bool {
    s.is_empty()
}

fn is_empty_slice(s: &&[ToolCall]) -> bool {
    s.is_empty()
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Deserialize)]
struct ContentRecord {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct AssistantRecord {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct ToolRecord {
    #[serde(default)]
    tool_call_id: Option<String>,
    #[serde(default, alias = "output")]
    content: Option<String>,
    #[serde(default)]
    is_error: Option<bool>,
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Message::System { content } => WireMessage::System { content },
            Message::User { content } => WireMessage::User { content },
            Message::Assistant {
                content,
                tool_calls,
            } => WireMessage::Assistant {
                content,
                tool_calls,
            },
            Message::ToolResult {
                tool_call_id,
                output,
                is_error,
            } => WireMessage::Tool {
                tool_call_id,
                content: output,
                is_error: *is_error,
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Read the discriminator first, then decode the rest of the record
        // according to it.
        let record = Value::deserialize(deserializer)?;
        let role = record
            .get("role")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let message = match role.as_deref() {
            Some("system") | Some("user") => {
                let is_system = role.as_deref() == Some("system");
                let ContentRecord { content } =
                    serde_json::from_value(record).map_err(de::Error::custom)?;
                let content = content.unwrap_or_default();
                if is_system {
                    Message::System { content }
                } else {
                    Message::User { content }
                }
            }
            Some("assistant") => {
                let AssistantRecord {
                    content,
                    tool_calls,
                } = serde_json::from_value(record).map_err(de::Error::custom)?;
                Message::Assistant {
                    content: content.unwrap_or_default(),
                    tool_calls: tool_calls.unwrap_or_default(),
                }
            }
            Some("tool") => {
                let ToolRecord {
                    tool_call_id,
                    content,
                    is_error,
                } = serde_json::from_value(record).map_err(de::Error::custom)?;
                Message::ToolResult {
                    tool_call_id: tool_call_id.unwrap_or_default(),
                    output: content.unwrap_or_default(),
                    is_error: is_error.unwrap_or_default(),
                }
            }
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "unknown role: {other:?}"
                )));
            }
            None => return Err(de::Error::custom("unknown role: missing")),
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use super::*;

    fn weather_call() -> ToolCall {
        let Value::Object(arguments) = json!({
            "location": "Paris",
            "options": { "units": ["celsius", "kelvin"], "days": 3 }
        }) else {
            unreachable!()
        };
        ToolCall::new("call_1", "get_weather", arguments)
    }

    #[test]
    fn test_round_trip() {
        let messages = vec![
            Message::system("You are a helpful assistant."),
            Message::user("What's the weather in Paris?"),
            Message::assistant_with_tool_calls("", vec![weather_call()]),
            Message::tool_error("call_1", "service unavailable"),
            Message::tool_result("call_1", "18 degrees"),
            Message::assistant("It is 18 degrees."),
        ];
        let encoded = serde_json::to_string(&messages).unwrap();
        let decoded: Vec<Message> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, messages);
    }

    #[test]
    fn test_wire_shape() {
        let assistant = Message::assistant_with_tool_calls("", vec![weather_call()]);
        let value = serde_json::to_value(&assistant).unwrap();
        assert!(value.get("content").is_none());
        assert_eq!(value["tool_calls"][0]["arguments"]["location"], "Paris");

        let text_only = serde_json::to_value(Message::assistant("Hi")).unwrap();
        assert_eq!(text_only, json!({ "role": "assistant", "content": "Hi" }));

        let result =
            serde_json::to_value(Message::tool_result("call_1", "ok")).unwrap();
        assert_eq!(
            result,
            json!({ "role": "tool", "tool_call_id": "call_1", "content": "ok" })
        );
        let failed =
            serde_json::to_value(Message::tool_error("call_1", "boom")).unwrap();
        assert_eq!(failed["is_error"], true);
    }

    #[test]
    fn test_legacy_output_key() {
        let message: Message = serde_json::from_value(json!({
            "role": "tool",
            "tool_call_id": "call_1",
            "output": "ok"
        }))
        .unwrap();
        assert_eq!(message, Message::tool_result("call_1", "ok"));
    }

    #[test]
    fn test_unknown_role_rejects_sequence() {
        let err = serde_json::from_value::<Vec<Message>>(json!([
            { "role": "user", "content": "Hi" },
            { "role": "narrator", "content": "Meanwhile..." }
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("unknown role"));

        let err = serde_json::from_value::<Vec<Message>>(json!([
            { "content": "no role" }
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("unknown role"));
    }

    #[test]
    fn test_validate() {
        assert!(Message::user("Hi").validate().is_ok());
        assert_eq!(
            Message::system("").validate().unwrap_err().field(),
            Some("content")
        );
        assert!(Message::assistant("").validate().is_err());
        assert!(
            Message::assistant_with_tool_calls("", vec![weather_call()])
                .validate()
                .is_ok()
        );

        let broken = ToolCall::new("", "get_weather", Map::new());
        let err = Message::assistant_with_tool_calls("Let me check.", vec![broken])
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), Some("tool_calls[0].id"));

        assert_eq!(
            Message::tool_result("", "ok").validate().unwrap_err().field(),
            Some("tool_call_id")
        );
        assert_eq!(
            Message::tool_result("call_1", "").validate().unwrap_err().field(),
            Some("output")
        );
    }
}
