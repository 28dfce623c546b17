//! End-to-end dispatch tests against mocked provider backends

use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use textcad_llm::{
    AnthropicProvider, DesignRequest, Dispatcher, GeminiProvider, LLMError, LLMRequest,
    OpenAIProvider, ProviderAdapter, ProviderKind, RetryPolicy, TogetherProvider,
};

fn openai_reply(content: &str) -> String {
    json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
        "usage": {"total_tokens": 42}
    })
    .to_string()
}

fn gemini_path() -> Matcher {
    Matcher::Regex(r"^/models/gemini-2\.0-flash:generateContent".to_string())
}

#[tokio::test]
async fn test_cube_request_through_openai() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({"model": "gpt-4o"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(openai_reply("```// Cube\ncube([10,10,10]);```"))
        .expect(1)
        .create_async()
        .await;

    let dispatcher = Dispatcher::builder()
        .with_adapter(Arc::new(
            OpenAIProvider::new(Some("test-key".to_string())).with_base_url(server.url()),
        ))
        .build();

    let request = DesignRequest::new("a 10x10x10 mm cube").unwrap();
    let result = dispatcher.generate(&request, Some("gpt")).await.unwrap();

    assert_eq!(result.source_text(), "// Cube\ncube([10,10,10]);");
    assert_eq!(result.attribution_label(), "OpenAI gpt-4o");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unsupported_provider_sends_nothing() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let dispatcher = Dispatcher::builder()
        .with_adapter(Arc::new(
            OpenAIProvider::new(Some("test-key".to_string())).with_base_url(server.url()),
        ))
        .build();

    let request = DesignRequest::new("a cube").unwrap();
    let err = dispatcher
        .generate(&request, Some("llama"))
        .await
        .unwrap_err();

    assert!(matches!(err, LLMError::UnsupportedProvider(_)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_key_sends_nothing() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let dispatcher = Dispatcher::builder()
        .with_adapter(Arc::new(
            AnthropicProvider::new(None).with_base_url(server.url()),
        ))
        .primary(ProviderKind::Anthropic)
        .build();

    let request = DesignRequest::new("a cube").unwrap();
    let err = dispatcher.generate(&request, None).await.unwrap_err();

    assert!(matches!(err, LLMError::Configuration(_)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_retries_throttling_then_succeeds() {
    let mut server = mockito::Server::new_async().await;
    let throttled = server
        .mock("POST", gemini_path())
        .match_query(Matcher::UrlEncoded("key".to_string(), "test-key".to_string()))
        .with_status(429)
        .with_body("quota exceeded")
        .expect(2)
        .create_async()
        .await;
    let ok = server
        .mock("POST", gemini_path())
        .match_query(Matcher::UrlEncoded("key".to_string(), "test-key".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"candidates": [{"content": {"parts": [{"text": "sphere(r=5);"}]}, "finishReason": "STOP"}]})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let provider = GeminiProvider::new(Some("test-key".to_string()))
        .with_base_url(server.url())
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(10), 2));

    let response = provider
        .invoke(LLMRequest::new("a ball").with_system("only code"))
        .await
        .unwrap();

    assert_eq!(response.content, "sphere(r=5);");
    assert_eq!(response.attempts, 3);
    assert_eq!(
        response.backoffs,
        vec![Duration::from_millis(10), Duration::from_millis(20)]
    );
    assert!(response.backoffs[0] < response.backoffs[1]);
    throttled.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn test_gemini_gives_up_after_three_retries() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", gemini_path())
        .with_status(429)
        .with_body("quota exceeded")
        .expect(4)
        .create_async()
        .await;

    let provider = GeminiProvider::new(Some("test-key".to_string()))
        .with_base_url(server.url())
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(5), 2));

    let err = provider.invoke(LLMRequest::new("x")).await.unwrap_err();
    assert!(matches!(err, LLMError::Provider { status: 429, .. }));
    assert!(err.is_retryable());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_anthropic_keeps_only_text_blocks() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/messages")
        .match_header("x-api-key", "test-key")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(Matcher::PartialJson(json!({"system": "only code"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "model": "claude-3-5-sonnet-latest",
                "content": [
                    {"type": "text", "text": "cylinder(h=10, "},
                    {"type": "tool_use", "id": "t1", "name": "noop", "input": {}},
                    {"type": "text", "text": "r=2);"}
                ],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 10, "output_tokens": 5}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider =
        AnthropicProvider::new(Some("test-key".to_string())).with_base_url(server.url());
    let response = provider
        .invoke(LLMRequest::new("a rod").with_system("only code"))
        .await
        .unwrap();

    assert_eq!(response.content, "cylinder(h=10, r=2);");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_together_selected_by_deepseek_synonym() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer together-key")
        .match_body(Matcher::PartialJson(json!({"model": "deepseek-ai/DeepSeek-V3"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(openai_reply("```scad\ncube(2);\n```"))
        .create_async()
        .await;

    let dispatcher = Dispatcher::builder()
        .with_adapter(Arc::new(
            TogetherProvider::new(Some("together-key".to_string())).with_base_url(server.url()),
        ))
        .build();

    let request = DesignRequest::new("a small cube").unwrap();
    let result = dispatcher
        .generate(&request, Some("DeepSeek"))
        .await
        .unwrap();

    assert_eq!(result.source_text(), "cube(2);");
    assert_eq!(result.attribution_label(), "Together deepseek-ai/DeepSeek-V3");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_provider_failure_is_not_rerouted() {
    let mut server = mockito::Server::new_async().await;
    let failing = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body("invalid api key")
        .expect(1)
        .create_async()
        .await;

    let mut other = mockito::Server::new_async().await;
    let untouched = other
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let dispatcher = Dispatcher::builder()
        .with_adapter(Arc::new(
            OpenAIProvider::new(Some("k".to_string())).with_base_url(server.url()),
        ))
        .with_adapter(Arc::new(
            AnthropicProvider::new(Some("k".to_string())).with_base_url(other.url()),
        ))
        .build();

    let request = DesignRequest::new("a cube").unwrap();
    let err = dispatcher.generate(&request, Some("openai")).await.unwrap_err();

    match err {
        LLMError::Provider { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid api key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    failing.assert_async().await;
    untouched.assert_async().await;
}

#[tokio::test]
async fn test_silent_backend_hits_client_timeout() {
    // Accepts connections and never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let adapter = OpenAIProvider::new(Some("test-key".to_string()))
        .with_base_url(format!("http://{}", addr))
        .with_timeout(Duration::from_millis(100));

    let started = std::time::Instant::now();
    let err = adapter
        .invoke(LLMRequest::new("a 10x10x10 mm cube"))
        .await
        .unwrap_err();

    assert!(matches!(err, LLMError::Transport(_)), "got {err:?}");
    assert!(err.is_retryable());
    assert!(started.elapsed() < Duration::from_secs(5));
    server.abort();
}
