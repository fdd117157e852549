use std::sync::Arc;

use conduit_model::{
    CallContext, Error, EventSender, EventStream, Halt, Pricing,
    ToolCallAccumulator, Usage, event_channel,
};
use conduit_transport::Sse;
use tracing::Instrument;

use crate::proto::ChatCompletionChunk;

/// Starts the task that turns the SSE body into stream events.
pub fn spawn(
    ctx: CallContext,
    sse: Sse,
    model: String,
    pricing: Option<Arc<dyn Pricing>>,
) -> EventStream {
    let (tx, rx) = event_channel();
    let span = debug_span!("openai_stream", model = %model);
    let state = StreamState {
        model,
        pricing,
        tool_calls: ToolCallAccumulator::new(),
        usage: None,
    };
    tokio::spawn(state.run(ctx, sse, tx).instrument(span));
    rx
}

struct StreamState {
    model: String,
    pricing: Option<Arc<dyn Pricing>>,
    tool_calls: ToolCallAccumulator,
    usage: Option<Usage>,
}

impl StreamState {
    async fn run(mut self, ctx: CallContext, mut sse: Sse, mut tx: EventSender) {
        match self.read(&ctx, &mut sse, &mut tx).await {
            Ok(()) => {
                let usage = self.finish_usage();
                tx.done(usage).await;
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
                debug!("stream ended without [DONE]");
                break;
            };
            trace!("got sse event: {}", event.data);
            if event.data == "[DONE]" {
                break;
            }
            self.handle_chunk(&event.data, tx).await?;
        }

        // Tool calls still open here never saw a finish reason.
        for call in self.tool_calls.finish_all() {
            tx.tool_call(call).await?;
        }
        Ok(())
    }

    async fn handle_chunk(
        &mut self,
        data: &str,
        tx: &mut EventSender,
    ) -> Result<(), Halt> {
        let chunk = match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!("skipping undecodable chunk: {err}");
                return Ok(());
            }
        };
        if let Some(err) = chunk.error {
            return Err(Error::protocol(format!(
                "backend error: {}",
                err.message
            ))
            .into());
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage.into());
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return Ok(());
        };
        let delta = choice.delta;
        if let Some(reasoning) = delta.reasoning_content.filter(|s| !s.is_empty())
        {
            tx.reasoning(reasoning).await?;
        }
        if let Some(content) = delta.content.filter(|s| !s.is_empty()) {
            tx.delta(content).await?;
        }
        for (pos, call) in delta.tool_calls.unwrap_or_default().into_iter().enumerate()
        {
            let index = call.index.unwrap_or(pos as u32);
            let function = call.function.unwrap_or_default();
            self.tool_calls
                .start(index, call.id.as_deref(), function.name.as_deref());
            if let Some(arguments) = function.arguments {
                self.tool_calls.append(index, &arguments);
            }
        }

        if let Some(reason) = choice.finish_reason {
            debug!("finish reason: {reason}");
            for call in self.tool_calls.finish_all() {
                tx.tool_call(call).await?;
            }
        }
        Ok(())
    }

    fn finish_usage(&self) -> Option<Usage> {
        let mut usage = self.usage?;
        if usage.cost == 0.0 {
            if let Some(cost) = self
                .pricing
                .as_ref()
                .and_then(|pricing| pricing.cost(&self.model, &usage))
            {
                usage.cost = cost;
            }
        }
        Some(usage)
    }
}
