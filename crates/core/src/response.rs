use conduit_model::{Error, EventStream, Message, StreamEvent, ToolCall, Usage};

/// Everything one stream produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectedResponse {
    /// The concatenated text deltas.
    pub text: String,
    /// The concatenated reasoning trace.
    pub reasoning: String,
    /// Tool calls, in emission order.
    pub tool_calls: Vec<ToolCall>,
    /// Usage from the terminal event, if reported.
    pub usage: Option<Usage>,
}

impl CollectedResponse {
    /// Builds the assistant message to append to the conversation.
    pub fn to_message(&self) -> Message {
        Message::assistant_with_tool_calls(self.text.clone(), self.tool_calls.clone())
    }
}

/// Drains `stream`, calling `on_delta` with each text delta as it arrives.
///
/// Returns the terminal error if the stream failed.
pub async fn collect<F>(
    mut stream: EventStream,
    mut on_delta: F,
) -> Result<CollectedResponse, Error>
where
    F: FnMut(&str),
{
    let mut response = CollectedResponse::default();
    while let Some(event) = stream.recv().await {
        match event {
            StreamEvent::Delta(text) => {
                on_delta(&text);
                response.text.push_str(&text);
            }
            StreamEvent::Reasoning(text) => response.reasoning.push_str(&text),
            StreamEvent::ToolCall(call) => response.tool_calls.push(call),
            StreamEvent::Done(usage) => {
                response.usage = usage;
                return Ok(response);
            }
            StreamEvent::Error(err) => return Err(err),
        }
    }
    Err(Error::protocol("stream closed without a terminal event"))
}
