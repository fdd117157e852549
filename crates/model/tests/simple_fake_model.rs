use std::time::Duration;

use async_trait::async_trait;
use conduit_model::{
    CallContext, Error, ErrorKind, EventStream, Message, Model, Provider,
    StreamEvent, StreamOptions, Usage, event_channel,
};
use tokio::time::sleep;

/// Echoes the first user message back, one word per event.
struct FakeModelProvider;

#[async_trait]
impl Provider for FakeModelProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn models(&self) -> Vec<Model> {
        vec![Model::new("echo", "Echo", "fake")]
    }

    async fn create_stream(
        &self,
        ctx: CallContext,
        options: StreamOptions,
    ) -> Result<EventStream, Error> {
        options.validate()?;
        let content = match options.messages.first() {
            Some(Message::User { content }) => content.clone(),
            Some(msg) => unreachable!("unexpected message: {msg:?}"),
            None => return Err(Error::validation("messages", "empty")),
        };

        let (mut tx, rx) = event_channel();
        tokio::spawn(async move {
            let text = format!("You said {content}");
            let mut words = text.split(' ').peekable();
            while let Some(word) = words.next() {
                if ctx.is_cancelled() {
                    tx.fail(ctx.to_error()).await;
                    return;
                }
                sleep(Duration::from_millis(1)).await;
                let mut item = word.to_owned();
                if words.peek().is_some() {
                    item.push(' ');
                }
                if tx.delta(item).await.is_err() {
                    return;
                }
            }
            tx.done(Some(Usage {
                output_tokens: 3,
                ..Default::default()
            }))
            .await;
        });
        Ok(rx)
    }
}

mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completion() {
        let provider = FakeModelProvider;
        let options = StreamOptions::new(
            "echo",
            vec![Message::user("Good morning")],
        );
        let mut stream = provider
            .create_stream(CallContext::new(), options)
            .await
            .unwrap();

        let mut resp_message = String::new();
        let mut terminals = 0;
        while let Some(event) = stream.recv().await {
            match event {
                StreamEvent::Delta(delta) => resp_message.push_str(&delta),
                StreamEvent::Done(usage) => {
                    terminals += 1;
                    assert_eq!(usage.unwrap().output_tokens, 3);
                }
                _ => unreachable!("unexpected event: {event:?}"),
            }
        }

        assert_eq!(resp_message, "You said Good morning");
        assert_eq!(terminals, 1);
    }

    #[tokio::test]
    async fn test_error() {
        let provider = FakeModelProvider;
        let result = provider
            .create_stream(CallContext::new(), StreamOptions::new("echo", vec![]))
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let options = StreamOptions::new("echo", vec![Message::user("")]);
        let err = provider
            .create_stream(CallContext::new(), options)
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("messages[0].content"));
    }

    #[tokio::test]
    async fn test_cancelled() {
        let provider = FakeModelProvider;
        let ctx = CallContext::new();
        let options = StreamOptions::new(
            "echo",
            vec![Message::user("one two three four five")],
        );
        let mut stream =
            provider.create_stream(ctx.clone(), options).await.unwrap();
        ctx.cancel();

        let mut last = None;
        while let Some(event) = stream.recv().await {
            last = Some(event);
        }
        let Some(StreamEvent::Error(err)) = last else {
            panic!("unexpected last event: {last:?}");
        };
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
