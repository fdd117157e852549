use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

use conduit_model::Error;

/// A tool call that could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolError {
    /// The identifier of the failed call.
    pub tool_call_id: String,
    /// The tool the model asked for.
    pub tool_name: String,
    /// Why the call was rejected.
    pub error: Error,
}

impl Display for ToolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "call {}: {}", self.tool_call_id, self.error)
    }
}

impl StdError for ToolError {}

/// The failures of one batch, in call order.
///
/// This never replaces the calls that did parse; it is returned beside them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ToolErrors {
    errors: Vec<ToolError>,
}

impl ToolErrors {
    pub(crate) fn push(&mut self, error: ToolError) {
        self.errors.push(error);
    }

    /// Returns the number of failed calls.
    #[inline]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` if no call failed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates over the failures.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &ToolError> {
        self.errors.iter()
    }
}

impl IntoIterator for ToolErrors {
    type Item = ToolError;
    type IntoIter = std::vec::IntoIter<ToolError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl Display for ToolErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            Display::fmt(error, f)?;
        }
        Ok(())
    }
}

impl StdError for ToolErrors {}
