//! A local fake model for testing purpose.

#[macro_use]
extern crate tracing;

mod preset;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use conduit_model::{
    CallContext, Error, EventSender, EventStream, Halt, Message, Model,
    Provider, StreamOptions, event_channel,
};
use tokio::time::sleep;

pub use preset::*;

const DEFAULT_NAME: &str = "test";

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the model should respond to a request. The response is selected
/// by the number of assistant messages in the request history, so the first
/// response answers a fresh conversation, the second answers the turn after
/// it, and so on. If there are no enough responses in the script, an error
/// will be returned.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Debug)]
pub struct TestModelProvider {
    name: String,
    models: Vec<(String, String)>,
    script: Vec<PresetResponse>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<StreamOptions>>>,
}

impl Default for TestModelProvider {
    fn default() -> Self {
        Self::new(DEFAULT_NAME)
    }
}

impl TestModelProvider {
    /// Creates a provider registered under `name`, serving one model
    /// called `fake`.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            models: vec![("fake".to_owned(), "Fake Model".to_owned())],
            script: vec![],
            delay: None,
            requests: Default::default(),
        }
    }

    /// Replaces the served model list.
    pub fn with_models<I, ID, N>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = (ID, N)>,
        ID: Into<String>,
        N: Into<String>,
    {
        self.models = models
            .into_iter()
            .map(|(id, name)| (id.into(), name.into()))
            .collect();
        self
    }

    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.script.push(preset);
    }

    /// Sets the delay before each event.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns the options of every accepted request, in order.
    pub fn requests(&self) -> Vec<StreamOptions> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, options: &StreamOptions) {
        let mut requests = match self.requests.lock() {
            Ok(requests) => requests,
            Err(poisoned) => poisoned.into_inner(),
        };
        requests.push(options.clone());
    }
}

#[async_trait]
impl Provider for TestModelProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn models(&self) -> Vec<Model> {
        self.models
            .iter()
            .map(|(id, name)| Model::new(id, name, &self.name))
            .collect()
    }

    async fn create_stream(
        &self,
        ctx: CallContext,
        options: StreamOptions,
    ) -> Result<EventStream, Error> {
        options.validate()?;
        if !self.models.iter().any(|(id, _)| *id == options.model) {
            return Err(Error::not_found(format!(
                "unknown model: {}",
                options.model
            )));
        }

        let step = options
            .messages
            .iter()
            .filter(|msg| matches!(msg, Message::Assistant { .. }))
            .count();
        let Some(preset) = self.script.get(step).cloned() else {
            return Err(Error::bad_request(format!(
                "no enough responses for step {step}"
            )));
        };
        self.record(&options);
        debug!("replaying response {step} with {} events", preset.events.len());

        let (tx, rx) = event_channel();
        let delay = self.delay.unwrap_or(Duration::from_millis(1));
        tokio::spawn(replay(ctx, preset, delay, tx));
        Ok(rx)
    }
}

async fn replay(
    ctx: CallContext,
    preset: PresetResponse,
    delay: Duration,
    mut tx: EventSender,
) {
    match emit(&ctx, &preset, delay, &mut tx).await {
        Ok(()) => match preset.error {
            Some(message) => tx.fail(Error::protocol(message)).await,
            None => tx.done(preset.usage).await,
        },
        Err(halt) => tx.halt(halt).await,
    }
}

async fn emit(
    ctx: &CallContext,
    preset: &PresetResponse,
    delay: Duration,
    tx: &mut EventSender,
) -> Result<(), Halt> {
    for event in &preset.events {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(ctx.to_error().into()),
            _ = sleep(delay) => {}
        }
        match event {
            PresetEvent::Delta(text) => tx.delta(text.clone()).await?,
            PresetEvent::Reasoning(text) => tx.reasoning(text.clone()).await?,
            PresetEvent::ToolCall(call) => tx.tool_call(call.clone()).await?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use conduit_model::{ErrorKind, StreamEvent, ToolCall, Usage};
    use serde_json::{Map, json};

    use super::*;

    async fn drain(mut stream: EventStream) -> Vec<StreamEvent> {
        let mut events = vec![];
        while let Some(event) = stream.recv().await {
            events.push(event);
        }
        events
    }

    fn scripted() -> TestModelProvider {
        let mut arguments = Map::new();
        arguments.insert("filename".to_owned(), json!("todo.txt"));
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_events([
            PresetEvent::Delta("Hello, ".to_owned()),
            PresetEvent::Delta("world!".to_owned()),
        ]));
        provider.add_response(
            PresetResponse::with_events([
                PresetEvent::Reasoning("Need the file.".to_owned()),
                PresetEvent::ToolCall(ToolCall::new(
                    "tool:1",
                    "read_file",
                    arguments,
                )),
            ])
            .with_usage(Usage {
                input_tokens: 3,
                output_tokens: 2,
                total_tokens: 5,
                ..Default::default()
            }),
        );
        provider
    }

    #[tokio::test]
    async fn test_script_follows_history() {
        let provider = scripted();
        let mut messages = vec![Message::user("Hi")];
        let events = drain(
            provider
                .create_stream(
                    CallContext::new(),
                    StreamOptions::new("fake", messages.clone()),
                )
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(
            events,
            [
                StreamEvent::Delta("Hello, ".to_owned()),
                StreamEvent::Delta("world!".to_owned()),
                StreamEvent::Done(None),
            ]
        );

        messages.push(Message::assistant("Hello, world!"));
        messages.push(Message::user("Check my todo"));
        let events = drain(
            provider
                .create_stream(
                    CallContext::new(),
                    StreamOptions::new("fake", messages),
                )
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(events.len(), 3);
        let StreamEvent::ToolCall(call) = &events[1] else {
            panic!("unexpected event: {:?}", events[1]);
        };
        assert_eq!(call.arguments["filename"], "todo.txt");
        assert!(matches!(events[2], StreamEvent::Done(Some(usage)) if usage.total_tokens == 5));
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_script_exhausted() {
        let provider = TestModelProvider::default();
        let err = provider
            .create_stream(
                CallContext::new(),
                StreamOptions::new("fake", vec![Message::user("Hi")]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_preset_error() {
        let mut provider = TestModelProvider::default();
        provider.add_response(
            PresetResponse::with_events([PresetEvent::Delta("Par".to_owned())])
                .with_error("overloaded"),
        );
        let events = drain(
            provider
                .create_stream(
                    CallContext::new(),
                    StreamOptions::new("fake", vec![Message::user("Hi")]),
                )
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], StreamEvent::Error(err) if err.message() == "overloaded"));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let mut provider = scripted();
        provider.set_delay(Duration::from_secs(60));
        let ctx = CallContext::new();
        let mut stream = provider
            .create_stream(
                ctx.clone(),
                StreamOptions::new("fake", vec![Message::user("Hi")]),
            )
            .await
            .unwrap();
        ctx.cancel();
        let Some(StreamEvent::Error(err)) = stream.recv().await else {
            panic!("expected a cancellation error");
        };
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(stream.recv().await, None);
    }
}
