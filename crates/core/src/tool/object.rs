use std::any::Any;
use std::fmt::{self, Debug, Formatter};

use conduit_model::{Error, ToolCall, ToolDefinition};
use serde::de::DeserializeOwned;

use super::{ToolSpec, TypedToolCall};

/// Type-erased view of a [`ToolSpec`], so specs with different parameter
/// types can live in one set.
pub(crate) trait ToolObject: Debug + Send + Sync + 'static {
    fn name(&self) -> &str;

    fn definition(&self) -> ToolDefinition;

    fn parse(&self, call: &ToolCall) -> Result<ParsedToolCall, Error>;
}

impl<T> ToolObject for ToolSpec<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    #[inline]
    fn name(&self) -> &str {
        ToolSpec::name(self)
    }

    #[inline]
    fn definition(&self) -> ToolDefinition {
        ToolSpec::definition(self)
    }

    fn parse(&self, call: &ToolCall) -> Result<ParsedToolCall, Error> {
        let typed = ToolSpec::parse(self, call)?;
        Ok(ParsedToolCall {
            tool_name: typed.tool_name,
            tool_call_id: typed.tool_call_id,
            params: Box::new(typed.params),
        })
    }
}

/// A parsed tool call whose parameter type is only known to the caller.
///
/// Recover the typed value with [`params`](Self::params) or
/// [`downcast`](Self::downcast), using the type the tool was registered
/// with.
pub struct ParsedToolCall {
    tool_name: String,
    tool_call_id: String,
    params: Box<dyn Any + Send + Sync>,
}

impl ParsedToolCall {
    /// Returns the name of the called tool.
    #[inline]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns the identifier of the call.
    #[inline]
    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    /// Borrows the parameters if they are a `T`.
    #[inline]
    pub fn params<T: 'static>(&self) -> Option<&T> {
        self.params.downcast_ref()
    }

    /// Converts into a [`TypedToolCall`], or gives `self` back if the
    /// parameters are not a `T`.
    pub fn downcast<T: 'static>(self) -> Result<TypedToolCall<T>, Self> {
        match self.params.downcast::<T>() {
            Ok(params) => Ok(TypedToolCall {
                tool_name: self.tool_name,
                tool_call_id: self.tool_call_id,
                params: *params,
            }),
            Err(params) => Err(Self {
                tool_name: self.tool_name,
                tool_call_id: self.tool_call_id,
                params,
            }),
        }
    }
}

impl Debug for ParsedToolCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedToolCall")
            .field("tool_name", &self.tool_name)
            .field("tool_call_id", &self.tool_call_id)
            .finish_non_exhaustive()
    }
}
