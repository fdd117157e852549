use conduit_model::{self as model, ReasoningEffort, StreamOptions, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub message: Option<ChunkMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub prompt_eval_count: u64,
    #[serde(default)]
    pub eval_count: u64,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ChunkMessage {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub thinking: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<TagModel>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TagModel {
    pub name: String,
}

/// A progress line of `/api/pull`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PullStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct Message {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
}

// -----------
// Conversions
// -----------

pub fn create_request(options: &StreamOptions) -> ChatRequest {
    let messages = options
        .messages
        .iter()
        .map(|msg| match msg {
            model::Message::Assistant {
                content,
                tool_calls,
            } => Message {
                role: "assistant",
                content: content.clone(),
                tool_calls: tool_calls
                    .iter()
                    .map(|call| ToolCall {
                        function: FunctionCall {
                            name: call.name.clone(),
                            arguments: Value::Object(call.arguments.clone()),
                        },
                    })
                    .collect(),
            },
            model::Message::ToolResult { output, .. } => Message {
                role: "tool",
                content: output.clone(),
                tool_calls: vec![],
            },
            model::Message::System { content } | model::Message::User { content } => {
                Message {
                    role: msg.role(),
                    content: content.clone(),
                    tool_calls: vec![],
                }
            }
        })
        .collect();

    let think = match options.reasoning_effort {
        ReasoningEffort::Unset => None,
        ReasoningEffort::None => Some(false),
        _ => Some(true),
    };

    ChatRequest {
        model: options.model.clone(),
        messages,
        tools: options.tools.iter().map(create_tool).collect(),
        stream: true,
        think,
    }
}

fn create_tool(tool: &ToolDefinition) -> Value {
    let parameters = if tool.parameters.is_null() {
        json!({ "type": "object", "properties": {} })
    } else {
        tool.parameters.clone()
    };
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": parameters,
        }
    })
}

/// Ollama sends arguments as an object, older builds as an encoded string.
pub fn arguments_of(name: &str, arguments: Value) -> Map<String, Value> {
    match arguments {
        Value::Object(map) => map,
        Value::String(encoded) => model::parse_arguments(name, &encoded),
        Value::Null => Map::new(),
        other => {
            warn!("tool `{name}` got non-object arguments: {other}");
            Map::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request() {
        let mut arguments = Map::new();
        arguments.insert("path".to_owned(), json!("/tmp"));
        let options = StreamOptions::new(
            "qwen3:0.6b",
            vec![
                model::Message::system("Be brief."),
                model::Message::user("List /tmp"),
                model::Message::assistant_with_tool_calls(
                    "",
                    vec![model::ToolCall::new("call_1", "ls", arguments)],
                ),
                model::Message::tool_result("call_1", "a.txt"),
            ],
        )
        .with_tools(vec![ToolDefinition {
            name: "ls".to_owned(),
            description: "Lists files".to_owned(),
            parameters: Value::Null,
        }])
        .with_reasoning_effort(ReasoningEffort::Low);

        let value = serde_json::to_value(create_request(&options)).unwrap();
        assert_eq!(value["stream"], true);
        assert_eq!(value["think"], true);
        assert_eq!(value["messages"][0], json!({ "role": "system", "content": "Be brief." }));
        assert_eq!(
            value["messages"][2]["tool_calls"][0],
            json!({ "function": { "name": "ls", "arguments": { "path": "/tmp" } } })
        );
        assert_eq!(value["messages"][3], json!({ "role": "tool", "content": "a.txt" }));
        assert_eq!(value["tools"][0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_arguments_of() {
        assert_eq!(arguments_of("ls", json!({ "a": 1 }))["a"], 1);
        assert_eq!(arguments_of("ls", json!("{\"a\":2}"))["a"], 2);
        assert!(arguments_of("ls", json!([1, 2])).is_empty());
        assert!(arguments_of("ls", Value::Null).is_empty());
    }
}
