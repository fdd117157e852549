use conduit_model::{
    self as model, ReasoningEffort, StreamOptions, ToolChoice, ToolDefinition,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    MessageStart {
        message: MessageStart,
    },
    ContentBlockStart {
        index: u32,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: u32,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        #[serde(default)]
        usage: Option<DeltaUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: ErrorBody,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MessageStart {
    #[serde(default)]
    pub usage: StartUsage,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct StartUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct DeltaUsage {
    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub message: String,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MessagesRequest {
    model: String,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<Thinking>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct Message {
    role: &'static str,
    content: Content,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
enum Content {
    Text(String),
    Blocks(Vec<Block>),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Map<String, Value>,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct Tool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Thinking {
    r#type: &'static str,
    budget_tokens: u32,
}

// -----------
// Conversions
// -----------

pub fn create_request(options: &StreamOptions, max_tokens: u32) -> MessagesRequest {
    let mut system: Vec<&str> = vec![];
    let mut messages: Vec<Message> = vec![];
    for msg in &options.messages {
        match msg {
            model::Message::System { content } => system.push(content),
            model::Message::User { content } => messages.push(Message {
                role: "user",
                content: Content::Text(content.clone()),
            }),
            model::Message::Assistant {
                content,
                tool_calls,
            } => messages.push(create_assistant(content, tool_calls)),
            model::Message::ToolResult {
                tool_call_id,
                output,
                is_error,
            } => {
                let block = Block::ToolResult {
                    tool_use_id: tool_call_id.clone(),
                    content: output.clone(),
                    is_error: *is_error,
                };
                // Consecutive results travel in one user turn.
                match messages.last_mut() {
                    Some(Message {
                        role: "user",
                        content: Content::Blocks(blocks),
                    }) if matches!(blocks.last(), Some(Block::ToolResult { .. })) => {
                        blocks.push(block)
                    }
                    _ => messages.push(Message {
                        role: "user",
                        content: Content::Blocks(vec![block]),
                    }),
                }
            }
        }
    }

    let thinking = thinking_budget(options.reasoning_effort).map(|budget| {
        Thinking {
            r#type: "enabled",
            budget_tokens: budget,
        }
    });
    // The thinking budget has to stay below `max_tokens`.
    let max_tokens = match &thinking {
        Some(thinking) if thinking.budget_tokens >= max_tokens => {
            thinking.budget_tokens + 4096
        }
        _ => max_tokens,
    };

    let tool_choice = if options.tools.is_empty() {
        None
    } else {
        options.tool_choice.as_ref().map(create_tool_choice)
    };

    MessagesRequest {
        model: options.model.clone(),
        max_tokens,
        stream: true,
        system: Some(system.join("\n\n")).filter(|s| !s.is_empty()),
        messages,
        tools: options.tools.iter().map(create_tool).collect(),
        tool_choice,
        thinking,
    }
}

fn create_assistant(content: &str, tool_calls: &[model::ToolCall]) -> Message {
    if tool_calls.is_empty() {
        return Message {
            role: "assistant",
            content: Content::Text(content.to_owned()),
        };
    }
    let mut blocks = vec![];
    if !content.is_empty() {
        blocks.push(Block::Text {
            text: content.to_owned(),
        });
    }
    blocks.extend(tool_calls.iter().map(|call| Block::ToolUse {
        id: call.id.clone(),
        name: call.name.clone(),
        input: call.arguments.clone(),
    }));
    Message {
        role: "assistant",
        content: Content::Blocks(blocks),
    }
}

fn create_tool(tool: &ToolDefinition) -> Tool {
    let input_schema = if tool.parameters.is_null() {
        json!({ "type": "object", "properties": {} })
    } else {
        tool.parameters.clone()
    };
    Tool {
        name: tool.name.clone(),
        description: tool.description.clone(),
        input_schema,
    }
}

fn create_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!({ "type": "auto" }),
        ToolChoice::Required => json!({ "type": "any" }),
        ToolChoice::None => json!({ "type": "none" }),
        ToolChoice::Tool { name } => json!({ "type": "tool", "name": name }),
    }
}

fn thinking_budget(effort: ReasoningEffort) -> Option<u32> {
    match effort {
        ReasoningEffort::Unset | ReasoningEffort::None => None,
        ReasoningEffort::Minimal => Some(1024),
        ReasoningEffort::Low => Some(2048),
        ReasoningEffort::Medium => Some(8192),
        ReasoningEffort::High => Some(16384),
        ReasoningEffort::XHigh => Some(32000),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouped_tool_results() {
        let mut arguments = Map::new();
        arguments.insert("location".to_owned(), json!("Paris"));
        let options = StreamOptions::new(
            "claude-sonnet-4-5-20250929",
            vec![
                model::Message::system("Be brief."),
                model::Message::user("Weather in Paris and Tokyo?"),
                model::Message::assistant_with_tool_calls(
                    "Checking.",
                    vec![
                        model::ToolCall::new("toolu_1", "get_weather", arguments),
                        model::ToolCall::new("toolu_2", "get_weather", Map::new()),
                    ],
                ),
                model::Message::tool_result("toolu_1", "18C"),
                model::Message::tool_error("toolu_2", "missing location"),
                model::Message::user("Thanks"),
            ],
        );

        let value = serde_json::to_value(create_request(&options, 1024)).unwrap();
        assert_eq!(value["system"], "Be brief.");
        let messages = value["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1]["content"][0], json!({ "type": "text", "text": "Checking." }));
        assert_eq!(messages[1]["content"][1]["type"], "tool_use");
        assert_eq!(messages[1]["content"][1]["input"]["location"], "Paris");
        assert_eq!(
            messages[2],
            json!({
                "role": "user",
                "content": [
                    { "type": "tool_result", "tool_use_id": "toolu_1", "content": "18C" },
                    {
                        "type": "tool_result",
                        "tool_use_id": "toolu_2",
                        "content": "missing location",
                        "is_error": true
                    }
                ]
            })
        );
        assert_eq!(messages[3], json!({ "role": "user", "content": "Thanks" }));
    }

    #[test]
    fn test_tools_and_thinking() {
        let options = StreamOptions::new(
            "claude-sonnet-4-5-20250929",
            vec![model::Message::user("List files")],
        )
        .with_tools(vec![ToolDefinition {
            name: "ls".to_owned(),
            description: "Lists files".to_owned(),
            parameters: Value::Null,
        }])
        .with_tool_choice(ToolChoice::Required)
        .with_reasoning_effort(ReasoningEffort::High);

        let value = serde_json::to_value(create_request(&options, 16384)).unwrap();
        assert_eq!(value["tools"][0]["input_schema"]["type"], "object");
        assert_eq!(value["tool_choice"], json!({ "type": "any" }));
        assert_eq!(value["thinking"]["budget_tokens"], 16384);
        assert_eq!(value["max_tokens"], 16384 + 4096);
        assert!(value.get("system").is_none());
    }

    #[test]
    fn test_decode_frames() {
        let frame: StreamFrame = serde_json::from_str(
            r#"{"type":"content_block_start","index":2,"content_block":{"type":"tool_use","id":"toolu_1","name":"ls","input":{}}}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            StreamFrame::ContentBlockStart {
                index: 2,
                content_block: ContentBlock::ToolUse {
                    id: "toolu_1".to_owned(),
                    name: "ls".to_owned(),
                },
            }
        );

        let frame: StreamFrame =
            serde_json::from_str(r#"{"type":"brand_new_event","x":1}"#).unwrap();
        assert_eq!(frame, StreamFrame::Unknown);

        let frame: StreamFrame = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"signature_delta","signature":"abc"}}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            StreamFrame::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::Other,
            }
        );
    }
}
