use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};

use bytes::Bytes;
use reqwest::Response;
use tokio::sync::mpsc::UnboundedReceiver;

/// Error returned when the body of a response cannot be read.
#[derive(Debug, PartialEq, Eq)]
pub struct ChunksError(String);

impl Display for ChunksError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An adapter for streaming byte chunks.
#[derive(Debug)]
pub enum Chunks {
    /// The body of a live HTTP response.
    Response(Response),
    /// A fixed list of chunks.
    Queue(VecDeque<Bytes>),
    /// Chunks pushed by someone else, ending when every sender is dropped.
    Channel(UnboundedReceiver<Bytes>),
}

impl Chunks {
    /// Reads the body of `response`.
    #[inline]
    pub fn from_response(response: Response) -> Self {
        Chunks::Response(response)
    }

    /// Replays a fixed list of chunks.
    #[inline]
    pub fn from_vec_deque(vec: VecDeque<Bytes>) -> Self {
        Chunks::Queue(vec)
    }

    /// Reads chunks from a channel.
    #[inline]
    pub fn from_channel(rx: UnboundedReceiver<Bytes>) -> Self {
        Chunks::Channel(rx)
    }

    /// Returns the next chunk, or `None` at the end of the stream.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, ChunksError> {
        match self {
            Chunks::Response(response) => response
                .chunk()
                .await
                .map_err(|err| ChunksError(err.to_string())),
            Chunks::Queue(vec) => Ok(vec.pop_front()),
            Chunks::Channel(rx) => Ok(rx.recv().await),
        }
    }
}
