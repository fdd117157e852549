//! A provider-neutral protocol for streaming LLM calls.
//!
//! This crate establishes an unified vocabulary for talking to various
//! model backends: the conversation ([`Message`]), the tool contract
//! ([`ToolDefinition`], [`ToolCall`], [`ToolChoice`]), the normalized event
//! stream ([`StreamEvent`]) and the [`Provider`] trait that every backend
//! adapter implements.
//!
//! Adapters share the pieces that make the stream well-formed, namely the
//! bounded [`event_channel`] that guarantees exactly one terminal event and
//! the [`ToolCallAccumulator`] that reassembles fragmented tool call
//! arguments. The [`lifecycle`] module holds the helpers for lazily built
//! clients and guarded credential refresh.
//!
//! Users of this crate may add some extra functionalities or wrappers,
//! depending on their own use cases. Those extra code should be placed
//! in their own crate.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod accumulator;
mod context;
mod error;
mod event;
pub mod lifecycle;
mod message;
mod options;
mod provider;
mod tool;

pub use accumulator::*;
pub use context::*;
pub use error::*;
pub use event::*;
pub use message::*;
pub use options::*;
pub use provider::*;
pub use tool::*;
