use std::sync::Arc;

use conduit_model::{
    CallContext, Error, EventSender, EventStream, Halt, Pricing,
    ToolCallAccumulator, Usage, event_channel,
};
use conduit_transport::Sse;
use tracing::Instrument;

use crate::proto::{BlockDelta, ContentBlock, StreamFrame};

pub fn spawn(
    ctx: CallContext,
    sse: Sse,
    model: String,
    pricing: Option<Arc<dyn Pricing>>,
) -> EventStream {
    let (tx, rx) = event_channel();
    let span = debug_span!("anthropic_stream", model = %model);
    let state = StreamState {
        model,
        pricing,
        tool_calls: ToolCallAccumulator::new(),
        usage: Usage::default(),
    };
    tokio::spawn(state.run(ctx, sse, tx).instrument(span));
    rx
}

struct StreamState {
    model: String,
    pricing: Option<Arc<dyn Pricing>>,
    tool_calls: ToolCallAccumulator,
    usage: Usage,
}

/// What to do after a frame.
enum Flow {
    Continue,
    Stop,
}

impl StreamState {
    async fn run(mut self, ctx: CallContext, mut sse: Sse, mut tx: EventSender) {
        match self.read(&ctx, &mut sse, &mut tx).await {
            Ok(()) => {
                let mut usage = self.usage;
                if let Some(cost) = self
                    .pricing
                    .as_ref()
                    .and_then(|pricing| pricing.cost(&self.model, &usage))
                {
                    usage.cost = cost;
                }
                tx.done(Some(usage)).await;
            }
            Err(halt) => tx.halt(halt).await,
        }
    }

    async fn read(
        &mut self,
        ctx: &CallContext,
        sse: &mut Sse,
        tx: &mut EventSender,
    ) -> Result<(), Halt> {
        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(ctx.to_error().into()),
                next = sse.next_event() => next,
            };
            let Some(event) = next.map_err(Error::from)? else {
                return Err(Error::protocol(
                    "stream ended before message_stop",
                )
                .into());
            };
            trace!("got sse event: {}", event.data);

            let frame = match serde_json::from_str::<StreamFrame>(&event.data) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!("skipping undecodable frame: {err}");
                    continue;
                }
            };
            if let Flow::Stop = self.handle_frame(frame, tx).await? {
                return Ok(());
            }
        }
    }

    async fn handle_frame(
        &mut self,
        frame: StreamFrame,
        tx: &mut EventSender,
    ) -> Result<Flow, Halt> {
        match frame {
            StreamFrame::MessageStart { message } => {
                self.usage.input_tokens = message.usage.input_tokens;
                self.usage.cached_tokens = message.usage.cache_read_input_tokens;
            }
            StreamFrame::ContentBlockStart {
                index,
                content_block,
            } => match content_block {
                ContentBlock::ToolUse { id, name } => {
                    self.tool_calls.start(index, Some(&id), Some(&name));
                }
                ContentBlock::Text { text } if !text.is_empty() => {
                    tx.delta(text).await?;
                }
                _ => {}
            },
            StreamFrame::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::TextDelta { text } => tx.delta(text).await?,
                BlockDelta::ThinkingDelta { thinking } => {
                    tx.reasoning(thinking).await?
                }
                BlockDelta::InputJsonDelta { partial_json } => {
                    self.tool_calls.append(index, &partial_json);
                }
                BlockDelta::Other => {}
            },
            StreamFrame::ContentBlockStop { index } => {
                // Only tool blocks have an accumulator entry.
                if let Some(call) = self.tool_calls.finish(index) {
                    tx.tool_call(call).await?;
                }
            }
            StreamFrame::MessageDelta { usage } => {
                if let Some(usage) = usage {
                    // `input_tokens` excludes cache reads, unlike OpenAI's
                    // `prompt_tokens`; count them so totals agree.
                    self.usage.output_tokens = usage.output_tokens;
                    self.usage.total_tokens = self
                        .usage
                        .input_tokens
                        .saturating_add(self.usage.cached_tokens)
                        .saturating_add(usage.output_tokens);
                }
            }
            StreamFrame::MessageStop => {
                for call in self.tool_calls.finish_all() {
                    warn!("tool block {} was never stopped", call.id);
                    tx.tool_call(call).await?;
                }
                return Ok(Flow::Stop);
            }
            StreamFrame::Error { error } => {
                return Err(Error::protocol(format!(
                    "backend error ({}): {}",
                    error.r#type, error.message
                ))
                .into());
            }
            StreamFrame::Ping | StreamFrame::Unknown => {}
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use conduit_model::{ErrorKind, StreamEvent};
    use conduit_transport::Chunks;
    use tokio::sync::mpsc;

    use super::*;

    fn stream_of(chunks: &[&'static [u8]]) -> EventStream {
        let chunks = chunks.iter().copied().map(Bytes::from_static).collect();
        let sse = Sse::new(Chunks::from_vec_deque(chunks));
        spawn(CallContext::new(), sse, "claude".to_owned(), None)
    }

    async fn drain(mut stream: EventStream) -> Vec<StreamEvent> {
        let mut events = vec![];
        while let Some(event) = stream.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_fixture_events() {
        let events = drain(stream_of(&[include_bytes!("../fixtures/tool_use.txt")])).await;
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            StreamEvent::Reasoning("The user wants the weather.".to_owned())
        );
        assert_eq!(events[1], StreamEvent::Delta("Checking Paris.".to_owned()));

        let StreamEvent::ToolCall(call) = &events[2] else {
            panic!("unexpected event: {:?}", events[2]);
        };
        assert_eq!(call.id, "toolu_01");
        assert_eq!(call.name, "get_weather");
        assert_eq!(call.arguments["location"], "Paris");

        let StreamEvent::Done(Some(usage)) = &events[3] else {
            panic!("unexpected event: {:?}", events[3]);
        };
        assert_eq!(usage.input_tokens, 472);
        assert_eq!(usage.cached_tokens, 128);
        assert_eq!(usage.output_tokens, 89);
        assert_eq!(usage.total_tokens, 689);
    }

    #[tokio::test]
    async fn test_index_reuse_after_stop() {
        let events = drain(stream_of(&[
            b"data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"tool_use\",\"id\":\"toolu_a\",\"name\":\"ls\"}}\n\n",
            b"data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"path\\\":\\\"/\\\"}\"}}\n\n",
            b"data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
            b"data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"tool_use\",\"id\":\"toolu_b\",\"name\":\"pwd\"}}\n\n",
            b"data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
            b"data: {\"type\":\"message_stop\"}\n\n",
        ]))
        .await;
        assert_eq!(events.len(), 3);
        let StreamEvent::ToolCall(first) = &events[0] else {
            panic!("unexpected event: {:?}", events[0]);
        };
        assert_eq!(first.id, "toolu_a");
        assert_eq!(first.arguments["path"], "/");
        let StreamEvent::ToolCall(second) = &events[1] else {
            panic!("unexpected event: {:?}", events[1]);
        };
        assert_eq!(second.id, "toolu_b");
        assert!(second.arguments.is_empty());
        assert!(matches!(events[2], StreamEvent::Done(Some(_))));
    }

    #[tokio::test]
    async fn test_error_frame() {
        let events = drain(stream_of(&[
            b"event: error\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
        ]))
        .await;
        assert_eq!(events.len(), 1);
        let StreamEvent::Error(err) = &events[0] else {
            panic!("unexpected event: {:?}", events[0]);
        };
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.message().contains("Overloaded"));
    }

    #[tokio::test]
    async fn test_eof_without_message_stop() {
        let events = drain(stream_of(&[
            b"data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
        ]))
        .await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StreamEvent::Delta("Hi".to_owned()));
        assert!(matches!(&events[1], StreamEvent::Error(err) if err.kind() == ErrorKind::Protocol));
    }

    #[tokio::test]
    async fn test_total_counts_cache_reads_and_saturates() {
        let events = drain(stream_of(&[
            b"data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":18446744073709551610,\"cache_read_input_tokens\":4}}}\n\n",
            b"data: {\"type\":\"message_delta\",\"delta\":{},\"usage\":{\"output_tokens\":9}}\n\n",
            b"data: {\"type\":\"message_stop\"}\n\n",
        ]))
        .await;
        assert_eq!(events.len(), 1);
        let StreamEvent::Done(Some(usage)) = &events[0] else {
            panic!("unexpected event: {:?}", events[0]);
        };
        assert_eq!(usage.cached_tokens, 4);
        assert_eq!(usage.output_tokens, 9);
        assert_eq!(usage.total_tokens, u64::MAX);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let ctx = CallContext::new();
        let mut stream = spawn(
            ctx.clone(),
            Sse::new(Chunks::from_channel(chunk_rx)),
            "claude".to_owned(),
            None,
        );
        chunk_tx
            .send(Bytes::from_static(
                b"data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":5}}}\n\n",
            ))
            .unwrap();
        ctx.cancel();

        let Some(StreamEvent::Error(err)) = stream.recv().await else {
            panic!("expected a cancellation error");
        };
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(stream.recv().await, None);
    }
}
