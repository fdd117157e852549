use conduit_model::{
    CallContext, ErrorKind, Message, Provider, StreamEvent, StreamOptions,
};
use conduit_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> OpenAIProvider {
    let config = OpenAIConfigBuilder::with_api_key("test-api-key")
        .with_base_url(format!("{}/v1", server.uri()))
        .build();
    OpenAIProvider::new(config)
}

fn options() -> StreamOptions {
    StreamOptions::new("gpt-4o-mini", vec![Message::user("Hello")])
}

#[tokio::test]
async fn test_stream_round_trip() {
    let server = MockServer::start().await;
    let sse = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" there\"},\"finish_reason\":\"stop\"}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2,\"total_tokens\":5}}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "stream": true,
            "stream_options": { "include_usage": true }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut stream = provider(&server)
        .create_stream(CallContext::new(), options())
        .await
        .unwrap();

    let mut text = String::new();
    let mut usage = None;
    while let Some(event) = stream.recv().await {
        match event {
            StreamEvent::Delta(delta) => text.push_str(&delta),
            StreamEvent::Done(done) => usage = done,
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(text, "Hi there");
    assert_eq!(usage.unwrap().total_tokens, 5);
}

#[tokio::test]
async fn test_http_error_before_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429).set_body_string("rate limit exceeded"),
        )
        .mount(&server)
        .await;

    let err = provider(&server)
        .create_stream(CallContext::new(), options())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.message().contains("429"));
    assert!(err.message().contains("rate limit exceeded"));
}

#[tokio::test]
async fn test_unexpected_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("{}", "application/json"),
        )
        .mount(&server)
        .await;

    let err = provider(&server)
        .create_stream(CallContext::new(), options())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_validation_before_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let options = StreamOptions::new("gpt-4o-mini", vec![Message::user("")]);
    let err = provider(&server)
        .create_stream(CallContext::new(), options)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.field(), Some("messages[0].content"));
}

#[tokio::test]
async fn test_cancelled_before_send() {
    let server = MockServer::start().await;
    let ctx = CallContext::new();
    ctx.cancel();
    let err = provider(&server)
        .create_stream(ctx, options())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_fetch_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                { "id": "openai/gpt-4o", "name": "OpenAI: GPT-4o" },
                { "id": "qwen/qwen3-32b" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = OpenAIConfigBuilder::with_api_key("test-api-key")
        .with_name("openrouter")
        .with_base_url(format!("{}/v1", server.uri()))
        .with_model_listing()
        .build();
    let provider = OpenAIProvider::new(config);
    let fetcher = provider.as_model_fetcher().unwrap();
    let models = fetcher.fetch_models(&CallContext::new()).await.unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].id, "openai/gpt-4o");
    assert_eq!(models[0].name, "OpenAI: GPT-4o");
    assert_eq!(models[1].name, "qwen/qwen3-32b");
    assert!(models.iter().all(|m| m.provider == "openrouter"));
}

#[tokio::test]
async fn test_model_listing_is_opt_in() {
    let server = MockServer::start().await;
    assert!(provider(&server).as_model_fetcher().is_none());
}
