use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Message, ToolChoice, ToolDefinition};

/// How much the model should reason before answering.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    /// Leave it to the backend.
    #[default]
    #[serde(rename = "")]
    Unset,
    #[allow(missing_docs)]
    None,
    #[allow(missing_docs)]
    Minimal,
    #[allow(missing_docs)]
    Low,
    #[allow(missing_docs)]
    Medium,
    #[allow(missing_docs)]
    High,
    #[allow(missing_docs)]
    XHigh,
}

impl ReasoningEffort {
    /// Returns the wire name, which is empty for `Unset`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Unset => "",
            ReasoningEffort::None => "none",
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
            ReasoningEffort::XHigh => "xhigh",
        }
    }

    /// Returns `true` for `Unset`.
    #[inline]
    pub fn is_unset(&self) -> bool {
        matches!(self, ReasoningEffort::Unset)
    }
}

impl Display for ReasoningEffort {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasoningEffort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "" => ReasoningEffort::Unset,
            "none" => ReasoningEffort::None,
            "minimal" => ReasoningEffort::Minimal,
            "low" => ReasoningEffort::Low,
            "medium" => ReasoningEffort::Medium,
            "high" => ReasoningEffort::High,
            "xhigh" => ReasoningEffort::XHigh,
            other => {
                return Err(Error::validation(
                    "reasoning_effort",
                    format!("unknown level: {other:?}"),
                ));
            }
        })
    }
}

/// Everything a provider needs to start one streaming call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamOptions {
    /// The model identifier, either bare or `provider/model`.
    pub model: String,
    /// The conversation so far.
    pub messages: Vec<Message>,
    /// Tools the model may call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    /// Constraint on tool use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Requested reasoning level.
    #[serde(default, skip_serializing_if = "ReasoningEffort::is_unset")]
    pub reasoning_effort: ReasoningEffort,
}

impl StreamOptions {
    /// Creates options for `model` with the given conversation.
    pub fn new<S: Into<String>>(model: S, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }

    /// Sets the tools.
    #[inline]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the tool choice.
    #[inline]
    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    /// Sets the reasoning effort.
    #[inline]
    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = effort;
        self
    }

    /// Checks the request before any network activity. The first violation
    /// wins.
    pub fn validate(&self) -> Result<(), Error> {
        if self.model.is_empty() {
            return Err(Error::validation("model", "must not be empty"));
        }
        for (idx, message) in self.messages.iter().enumerate() {
            message
                .validate()
                .map_err(|err| err.within(format!("messages[{idx}]")))?;
        }
        for (idx, tool) in self.tools.iter().enumerate() {
            tool.validate()
                .map_err(|err| err.within(format!("tools[{idx}]")))?;
        }

        let Some(choice) = &self.tool_choice else {
            return Ok(());
        };
        if self.tools.is_empty() {
            return Err(Error::validation(
                "tool_choice",
                "requires at least one tool",
            ));
        }
        if let ToolChoice::Tool { name } = choice {
            if name.is_empty() {
                return Err(Error::validation(
                    "tool_choice.name",
                    "must not be empty",
                ));
            }
            if !self.tools.iter().any(|tool| &tool.name == name) {
                return Err(Error::validation(
                    "tool_choice.name",
                    format!("no tool named {name:?}"),
                ));
            }
        }
        Ok(())
    }
}
