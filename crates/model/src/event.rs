use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{Error, ToolCall};

/// Capacity of the queue between an adapter task and its consumer.
pub const EVENT_BUFFER_SIZE: usize = 64;

/// Token counts and cost of one call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    pub input_tokens: u64,
    /// Tokens generated by the model.
    pub output_tokens: u64,
    /// Total tokens as reported by the backend.
    pub total_tokens: u64,
    /// Prompt tokens served from the backend's cache.
    pub cached_tokens: u64,
    /// Generated tokens spent on reasoning.
    pub reasoning_tokens: u64,
    /// Cost in USD, when known.
    pub cost: f64,
}

/// Looks up the cost of a call. Price tables themselves live outside of
/// this crate.
pub trait Pricing: Send + Sync {
    /// Returns the cost in USD of `usage` on `model`, or `None` if the model
    /// is not priced.
    fn cost(&self, model: &str, usage: &Usage) -> Option<f64>;
}

/// The event from a model response.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Received a message delta.
    Delta(String),
    /// Received a delta of the model's reasoning trace.
    Reasoning(String),
    /// Received a complete tool call request.
    ToolCall(ToolCall),
    /// The response has been completed.
    Done(Option<Usage>),
    /// The response failed after streaming began.
    Error(Error),
}

impl StreamEvent {
    /// Returns `true` for `Done` and `Error`, which are always the last
    /// event of a stream.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done(_) | StreamEvent::Error(_))
    }
}

/// Returned when the consumer of a stream has gone away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SinkClosed;

/// Why an adapter stopped reading its transport early.
#[derive(Debug)]
pub enum Halt {
    /// A fatal error to report as the terminal event.
    Fail(Error),
    /// The consumer went away, nothing left to report.
    Closed,
}

impl From<Error> for Halt {
    #[inline]
    fn from(err: Error) -> Self {
        Halt::Fail(err)
    }
}

impl From<SinkClosed> for Halt {
    #[inline]
    fn from(_: SinkClosed) -> Self {
        Halt::Closed
    }
}

/// Creates the bounded queue connecting an adapter to its consumer.
pub fn event_channel() -> (EventSender, EventStream) {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER_SIZE);
    (EventSender { tx: Some(tx) }, EventStream { rx })
}

/// The producing half of an event stream, owned by an adapter task.
///
/// Terminal events consume the sender, so a stream can carry at most one
/// of them, and the queue is closed when the sender is dropped.
#[derive(Debug)]
pub struct EventSender {
    tx: Option<mpsc::Sender<StreamEvent>>,
}

impl EventSender {
    /// Emits a text delta.
    #[inline]
    pub async fn delta<S: Into<String>>(
        &mut self,
        text: S,
    ) -> Result<(), SinkClosed> {
        self.send(StreamEvent::Delta(text.into())).await
    }

    /// Emits a reasoning delta.
    #[inline]
    pub async fn reasoning<S: Into<String>>(
        &mut self,
        text: S,
    ) -> Result<(), SinkClosed> {
        self.send(StreamEvent::Reasoning(text.into())).await
    }

    /// Emits a complete tool call.
    #[inline]
    pub async fn tool_call(&mut self, call: ToolCall) -> Result<(), SinkClosed> {
        self.send(StreamEvent::ToolCall(call)).await
    }

    /// Emits `Done` and closes the stream.
    pub async fn done(mut self, usage: Option<Usage>) {
        self.finish(StreamEvent::Done(usage)).await;
    }

    /// Emits `Error` and closes the stream.
    pub async fn fail(mut self, err: Error) {
        self.finish(StreamEvent::Error(err)).await;
    }

    /// Ends the stream according to `halt`.
    pub async fn halt(self, halt: Halt) {
        match halt {
            Halt::Fail(err) => self.fail(err).await,
            Halt::Closed => trace!("consumer went away, stopping"),
        }
    }

    /// Returns `true` if the consumer has gone away.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().is_none_or(mpsc::Sender::is_closed)
    }

    async fn send(&mut self, event: StreamEvent) -> Result<(), SinkClosed> {
        let Some(tx) = &self.tx else {
            return Err(SinkClosed);
        };
        tx.send(event).await.map_err(|_| SinkClosed)
    }

    async fn finish(&mut self, event: StreamEvent) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        if tx.send(event).await.is_err() {
            trace!("consumer went away before the terminal event");
        }
    }
}

impl Drop for EventSender {
    fn drop(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        if tx.is_closed() {
            return;
        }
        warn!("event sender dropped without a terminal event");
        let event = StreamEvent::Error(Error::protocol(
            "stream ended without a terminal event",
        ));
        match tx.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => {
                // The queue is full, hand the event to a task that waits
                // for room.
                if let Ok(handle) = Handle::try_current() {
                    handle.spawn(async move {
                        tx.send(event).await.ok();
                    });
                }
            }
        }
    }
}

/// The consuming half of an event stream.
///
/// The stream ends (`recv` returns `None`) right after the terminal event.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl EventStream {
    /// Receives the next event, or `None` once the stream is closed.
    #[inline]
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
