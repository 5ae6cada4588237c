use colloquy_analysis::{AnalysisClient, AnalysisService, ModelConfig};
use colloquy_channels::{ChannelSink, JsonlSink, SinkManager, WindowReport};
use colloquy_core::{FallbackReason, WindowTrigger};
use colloquy_engine::EngineConfig;
use colloquy_orchestrator::{
    DispatchConfig, JsonlSource, Pipeline, PipelineConfig, SourceSettings,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONVERSATIONS: &str = r#"{"session_id":"abc123","timestamp":"2024-01-15T10:00:00Z","sender":"customer","message":"Hi, I want to refinance my mortgage"}
{"session_id":"xyz789","timestamp":"2024-01-15T10:00:01Z","sender":"customer","message":"Is my card blocked?"}
{"session_id":"abc123","timestamp":"2024-01-15T10:00:10Z","sender":"rm","message":"Happy to help. What is your current rate?"}
{"session_id":"xyz789","timestamp":"2024-01-15T10:00:05Z","sender":"rm","message":"Let me check that for you"}
this line is broken
{"session_id":"abc123","timestamp":"2024-01-15T10:00:32Z","sender":"customer","message":"About 6 percent"}
{"session_id":"abc123","timestamp":"2024-01-15T10:00:40","sender":"RM","message":"We can do better than that"}
{"session_id":"xyz789","timestamp":"2024-01-15T10:00:20Z","sender":"bot","message":"unknown speaker"}
"#;

const ANSWER: &str = r#"{"response": "Quote the 4.2% offer", "analysis": {"customer_intent": "refinance", "rm_strategy": "compare", "urgency_level": "high", "emotion": "hopeful", "next_action": "send offer"}}"#;

async fn write_input(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("messages.jsonl");
    tokio::fs::write(&path, CONVERSATIONS).await.unwrap();
    path
}

fn no_delay() -> SourceSettings {
    SourceSettings {
        speed_factor: 0.0,
        ..SourceSettings::default()
    }
}

fn collect(rx: &mut tokio::sync::mpsc::Receiver<WindowReport>) -> Vec<WindowReport> {
    let mut reports = Vec::new();
    while let Ok(report) = rx.try_recv() {
        reports.push(report);
    }
    reports
}

#[tokio::test]
async fn test_replay_with_ollama_analysis() {
    let server = MockServer::start().await;
    // The card session gets an unusable answer; every other window a real one.
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("Is my card blocked?"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"response": "No idea."})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"response": ANSWER})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir).await;
    let output = dir.path().join("reports.jsonl");

    let client = AnalysisClient::from_config(&ModelConfig {
        api_base_url: Some(server.uri()),
        ..ModelConfig::default()
    })
    .unwrap();
    let service: Arc<dyn AnalysisService> = Arc::new(client);
    let (channel, mut rx) = ChannelSink::new(64);
    let sinks = SinkManager::new()
        .with_sink(Box::new(JsonlSink::open(&output).await.unwrap()))
        .with_sink(Box::new(channel));

    let (pipeline, handle) = Pipeline::new(
        PipelineConfig::new(EngineConfig::from_secs_f64(30.0).unwrap()),
        Some(service),
        sinks,
    );
    let run = tokio::spawn(pipeline.run());

    let stats = JsonlSource::new(&input, &no_delay()).replay(&handle).await.unwrap();
    assert_eq!(stats.invalid_lines, 1);
    assert_eq!(stats.records, 7);
    handle.close().await.unwrap();
    let summary = run.await.unwrap();

    assert_eq!(summary.engine.events_accepted, 6);
    assert_eq!(summary.engine.events_rejected, 1);

    let reports = collect(&mut rx);
    let abc: Vec<&WindowReport> = reports
        .iter()
        .filter(|r| r.window.session_id() == "abc123")
        .collect();
    assert_eq!(abc.len(), 2);
    assert_eq!(abc[0].window.trigger(), WindowTrigger::Threshold);
    assert_eq!(abc[0].window.len(), 2);
    assert_eq!(abc[0].analysis.analysis().unwrap().intent, "refinance");
    assert_eq!(abc[1].window.len(), 2);

    let xyz: Vec<&WindowReport> = reports
        .iter()
        .filter(|r| r.window.session_id() == "xyz789")
        .collect();
    assert_eq!(xyz.len(), 1);
    let texts: Vec<&str> = xyz[0].window.messages().iter().map(|m| m.text()).collect();
    assert_eq!(texts, vec!["Is my card blocked?", "Let me check that for you"]);
    assert!(matches!(
        xyz[0].analysis.fallback_reason(),
        Some(FallbackReason::Malformed(_))
    ));

    let written = tokio::fs::read_to_string(&output).await.unwrap();
    assert_eq!(written.lines().count(), 3);
    assert_eq!(summary.dispatch.windows_delivered, 3);
    assert_eq!(summary.dispatch.analyses_succeeded, 2);
    assert_eq!(summary.dispatch.fallbacks("malformed"), 1);
}

#[tokio::test]
async fn test_unreachable_service_never_drops_windows() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir).await;

    let client = AnalysisClient::from_config(&ModelConfig {
        api_base_url: Some("http://127.0.0.1:9".into()),
        timeout_secs: 2,
        ..ModelConfig::default()
    })
    .unwrap();
    let (channel, mut rx) = ChannelSink::new(64);
    let mut config = PipelineConfig::new(EngineConfig::from_secs_f64(30.0).unwrap());
    config.dispatch = DispatchConfig {
        timeout: Duration::from_secs(2),
        grace: Duration::from_secs(5),
    };
    let (pipeline, handle) = Pipeline::new(
        config,
        Some(Arc::new(client)),
        SinkManager::new().with_sink(Box::new(channel)),
    );
    let run = tokio::spawn(pipeline.run());
    JsonlSource::new(&input, &no_delay()).replay(&handle).await.unwrap();
    drop(handle);
    run.await.unwrap();

    let reports = collect(&mut rx);
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.analysis.is_fallback()));
    let delivered: usize = reports.iter().map(|r| r.window.len()).sum();
    assert_eq!(delivered, 6);
}
