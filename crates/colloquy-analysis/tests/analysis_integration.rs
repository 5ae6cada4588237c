use chrono::{TimeDelta, TimeZone, Utc};
use colloquy_analysis::{
    AnalysisClient, AnalysisProvider, AnalysisService, ModelConfig, RetryPolicy,
};
use colloquy_core::{ColloquyError, Event, FallbackReason, Speaker, Window, WindowTrigger};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANSWER: &str = r#"```json
{
  "response": "Strategic advice to the RM: confirm the customer's budget first.",
  "analysis": {
    "customer_intent": "Find a cheaper mortgage",
    "rm_strategy": "Anchor on total cost",
    "urgency_level": "medium",
    "emotion": "Anxious",
    "next_action": "Ask for the current rate"
  }
}
```"#;

fn window() -> Window {
    let base = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
    let messages = vec![
        Event::new("abc123", base, Speaker::Customer, "My mortgage is too expensive").unwrap(),
        Event::new(
            "abc123",
            base + TimeDelta::seconds(8),
            Speaker::Agent,
            "Let's look at options",
        )
        .unwrap(),
    ];
    Window::new("abc123", 0, None, WindowTrigger::Flush, messages).unwrap()
}

fn ollama(server: &MockServer) -> ModelConfig {
    ModelConfig {
        api_base_url: Some(server.uri()),
        ..ModelConfig::default()
    }
}

#[tokio::test]
async fn test_ollama_window_analysis() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("Customer: My mortgage is too expensive"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"response": ANSWER, "done": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = AnalysisClient::from_config(&ollama(&server)).unwrap();
    let analysis = client.analyze(&window()).await.unwrap();
    assert_eq!(analysis.intent, "Find a cheaper mortgage");
    assert_eq!(analysis.urgency, "medium");
}

#[tokio::test]
async fn test_openai_window_analysis() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("RM: Let's look at options"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": ANSWER}}]
        })))
        .mount(&server)
        .await;

    let config = ModelConfig {
        provider: AnalysisProvider::OpenAi,
        model_id: "gpt-4o-mini".into(),
        api_base_url: Some(server.uri()),
        ..ModelConfig::default()
    };
    let client = AnalysisClient::from_config(&config).unwrap();
    assert_eq!(client.backend_name(), "openai/gpt-4o-mini");
    let analysis = client.analyze(&window()).await.unwrap();
    assert_eq!(analysis.next_action, "Ask for the current rate");
}

#[tokio::test]
async fn test_prose_answer_classifies_as_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({"response": "I think the customer is unhappy."}),
        ))
        .mount(&server)
        .await;

    let client = AnalysisClient::from_config(&ollama(&server)).unwrap();
    let err = client.analyze(&window()).await.unwrap_err();
    assert!(matches!(
        FallbackReason::from_error(&err),
        FallbackReason::Malformed(_)
    ));
}

#[tokio::test]
async fn test_server_error_classifies_as_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = AnalysisClient::from_config(&ollama(&server)).unwrap();
    let err = client.analyze(&window()).await.unwrap_err();
    assert!(matches!(err, ColloquyError::Http(_)));
    assert!(matches!(
        FallbackReason::from_error(&err),
        FallbackReason::Backend(_)
    ));
}

#[tokio::test]
async fn test_fails_over_to_second_model() {
    let primary = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .expect(1)
        .mount(&primary)
        .await;

    let secondary = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"response": ANSWER})),
        )
        .expect(1)
        .mount(&secondary)
        .await;

    let config = ModelConfig {
        fallback_models: vec![ModelConfig {
            model_id: "qwen2.5:7b".into(),
            ..ollama(&secondary)
        }],
        retry_policy: Some(RetryPolicy {
            max_retries: 1,
            backoff_base_ms: 1,
            backoff_max_ms: 1,
        }),
        ..ollama(&primary)
    };
    let client = AnalysisClient::from_config(&config).unwrap();
    assert!(client.backend_name().starts_with("failover["));
    let analysis = client.analyze(&window()).await.unwrap();
    assert_eq!(analysis.emotion, "Anxious");
}
