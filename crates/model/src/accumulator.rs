use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::ToolCall;

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Reassembles tool calls whose arguments arrive as string fragments.
///
/// Entries are keyed by the backend's index. Fragments are concatenated
/// verbatim and parsed only once the call is finished.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    open: BTreeMap<u32, PartialCall>,
}

impl ToolCallAccumulator {
    /// Creates an empty accumulator.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the call at `index`, or fills in the `id` and `name` of an
    /// already open one. Later non-empty values win.
    pub fn start(&mut self, index: u32, id: Option<&str>, name: Option<&str>) {
        let entry = self.open.entry(index).or_default();
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            entry.id = id.to_owned();
        }
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            entry.name = name.to_owned();
        }
    }

    /// Appends an argument fragment to the call at `index`.
    pub fn append(&mut self, index: u32, fragment: &str) {
        self.open
            .entry(index)
            .or_default()
            .arguments
            .push_str(fragment);
    }

    /// Returns `true` if no call is open.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Closes the call at `index` and returns it.
    pub fn finish(&mut self, index: u32) -> Option<ToolCall> {
        self.open.remove(&index).map(PartialCall::into_tool_call)
    }

    /// Closes every open call, in index order.
    pub fn finish_all(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.open)
            .into_values()
            .map(PartialCall::into_tool_call)
            .collect()
    }
}

impl PartialCall {
    fn into_tool_call(self) -> ToolCall {
        let arguments = parse_arguments(&self.name, &self.arguments);
        ToolCall::new(self.id, self.name, arguments)
    }
}

/// Parses an accumulated argument buffer. Malformed buffers yield an empty
/// map so that the stream can go on.
pub fn parse_arguments(tool_name: &str, buffer: &str) -> Map<String, Value> {
    if buffer.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str(buffer) {
        Ok(Value::Object(arguments)) => arguments,
        Ok(other) => {
            warn!(
                "arguments of tool `{tool_name}` are not an object: {other}"
            );
            Map::new()
        }
        Err(err) => {
            warn!("malformed arguments of tool `{tool_name}`: {err}");
            Map::new()
        }
    }
}
