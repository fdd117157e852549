//! Tool dispatch, provider registry and response collection on top of
//! `conduit-model`.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod registry;
mod response;
pub mod tool;

pub use registry::Registry;
pub use response::{CollectedResponse, collect};
pub use tool::{
    ParsedToolCall, ToolError, ToolErrors, ToolSet, ToolSetBuilder, ToolSpec,
    TypedToolCall,
};
