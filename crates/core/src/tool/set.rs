use std::collections::HashMap;

use conduit_model::{Error, ToolCall, ToolDefinition};
use serde::de::DeserializeOwned;

use super::object::{ParsedToolCall, ToolObject};
use super::{ToolError, ToolErrors, ToolSpec};

/// A set of tools the model may call.
#[derive(Debug, Default)]
pub struct ToolSet {
    tools: Vec<Box<dyn ToolObject>>,
    index: HashMap<String, usize>,
}

impl ToolSet {
    /// Starts building a set.
    #[inline]
    pub fn builder() -> ToolSetBuilder {
        ToolSetBuilder::default()
    }

    /// Returns the tool definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    /// Returns the number of tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if the set holds no tool.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Parses a batch of calls.
    ///
    /// Every call that parses is returned, in order. Calls naming an
    /// unknown tool, or whose arguments are rejected, are skipped and
    /// reported in the second element.
    pub fn parse(
        &self,
        calls: &[ToolCall],
    ) -> (Vec<ParsedToolCall>, Option<ToolErrors>) {
        let span = debug_span!("tool set parse", calls = calls.len());
        let _enter = span.enter();

        let mut parsed = Vec::with_capacity(calls.len());
        let mut errors = ToolErrors::default();
        for call in calls {
            let result = match self.index.get(&call.name) {
                Some(&i) => self.tools[i].parse(call),
                None => Err(Error::not_found(format!("unknown tool: {}", call.name))),
            };
            match result {
                Ok(call) => {
                    trace!("parsed tool call {}", call.tool_call_id());
                    parsed.push(call);
                }
                Err(error) => {
                    warn!("dropping tool call {}: {error}", call.id);
                    errors.push(ToolError {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        error,
                    });
                }
            }
        }
        let errors = (!errors.is_empty()).then_some(errors);
        (parsed, errors)
    }
}

/// Builder for [`ToolSet`].
#[derive(Debug, Default)]
pub struct ToolSetBuilder {
    tools: Vec<Box<dyn ToolObject>>,
}

impl ToolSetBuilder {
    /// Adds a tool.
    pub fn with_tool<T>(mut self, spec: ToolSpec<T>) -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.tools.push(Box::new(spec));
        self
    }

    /// Builds the set, failing if two tools share a name.
    pub fn build(self) -> Result<ToolSet, Error> {
        let mut index = HashMap::with_capacity(self.tools.len());
        for (i, tool) in self.tools.iter().enumerate() {
            if index.insert(tool.name().to_owned(), i).is_some() {
                return Err(Error::validation(
                    format!("tools[{i}].name"),
                    format!("duplicate tool name `{}`", tool.name()),
                ));
            }
        }
        Ok(ToolSet {
            tools: self.tools,
            index,
        })
    }
}
