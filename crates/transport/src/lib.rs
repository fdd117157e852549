//! Byte-level plumbing shared by the HTTP model providers.
//!
//! [`Chunks`] abstracts over where the bytes come from (a live response, a
//! fixture queue or a channel fed by a test), and the framers turn them
//! into frames: [`Sse`] for server-sent events and [`Ndjson`] for
//! newline-delimited JSON.

#[macro_use]
extern crate tracing;

mod chunks;
mod http;
mod ndjson;
mod sse;

use std::fmt::{self, Display, Formatter};

pub use chunks::{Chunks, ChunksError};
pub use http::*;
pub use ndjson::Ndjson;
pub use sse::{Sse, SseEvent};

/// Error returned by the framers.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameError {
    /// The underlying byte stream failed.
    Chunks(ChunksError),
    /// The bytes could not be framed.
    InvalidPayload,
}

impl Display for FrameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Chunks(err) => write!(f, "read failed: {err}"),
            FrameError::InvalidPayload => write!(f, "invalid payload"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<FrameError> for conduit_model::Error {
    fn from(err: FrameError) -> Self {
        conduit_model::Error::protocol(err.to_string())
    }
}
