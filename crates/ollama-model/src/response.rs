use conduit_model::{
    CallContext, Error, EventSender, EventStream, Halt, ToolCall, Usage,
    event_channel,
};
use conduit_transport::Ndjson;
use tracing::Instrument;

use crate::proto::{self, ChatChunk};

pub fn spawn(ctx: CallContext, lines: Ndjson, model: String) -> EventStream {
    let (tx, rx) = event_channel();
    let span = debug_span!("ollama_stream", model = %model);
    let state = StreamState { next_call_id: 1 };
    tokio::spawn(state.run(ctx, lines, tx).instrument(span));
    rx
}

struct StreamState {
    next_call_id: u64,
}

impl StreamState {
    async fn run(mut self, ctx: CallContext, mut lines: Ndjson, mut tx: EventSender) {
        match self.read(&ctx, &mut lines, &mut tx).await {
            Ok(usage) => tx.done(Some(usage)).await,
            Err(halt) => tx.halt(halt).await,
        }
    }

    async fn read(
        &mut self,
        ctx: &CallContext,
        lines: &mut Ndjson,
        tx: &mut EventSender,
    ) -> Result<Usage, Halt> {
        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(ctx.to_error().into()),
                next = lines.next_line() => next,
            };
            let Some(line) = next.map_err(Error::from)? else {
                return Err(Error::protocol("stream ended before done").into());
            };
            trace!("got line: {line}");

            let chunk: ChatChunk = serde_json::from_str(&line).map_err(|err| {
                Error::protocol(format!("undecodable line: {err}"))
            })?;
            if let Some(usage) = self.handle_chunk(chunk, tx).await? {
                return Ok(usage);
            }
        }
    }

    async fn handle_chunk(
        &mut self,
        chunk: ChatChunk,
        tx: &mut EventSender,
    ) -> Result<Option<Usage>, Halt> {
        if let Some(message) = chunk.error {
            return Err(Error::protocol(format!("backend error: {message}")).into());
        }
        if let Some(message) = chunk.message {
            if !message.thinking.is_empty() {
                tx.reasoning(message.thinking).await?;
            }
            if !message.content.is_empty() {
                tx.delta(message.content).await?;
            }
            // Tool calls arrive whole, without ids.
            for call in message.tool_calls {
                let id = format!("call_{}", self.next_call_id);
                self.next_call_id += 1;
                let arguments =
                    proto::arguments_of(&call.function.name, call.function.arguments);
                tx.tool_call(ToolCall::new(id, call.function.name, arguments))
                    .await?;
            }
        }
        if !chunk.done {
            return Ok(None);
        }
        Ok(Some(Usage {
            input_tokens: chunk.prompt_eval_count,
            output_tokens: chunk.eval_count,
            total_tokens: chunk.prompt_eval_count.saturating_add(chunk.eval_count),
            ..Usage::default()
        }))
    }
}
