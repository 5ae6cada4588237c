use chrono::{TimeDelta, TimeZone, Utc};
use colloquy_core::{Event, RawRecord, Speaker, Window, WindowTrigger};
use colloquy_engine::{EngineConfig, EngineSettings, WindowingEngine};
use std::time::Duration;

fn raw(session: &str, secs: i64, sender: &str, text: &str) -> RawRecord {
    let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap() + TimeDelta::seconds(secs);
    RawRecord::new(session, &ts.to_rfc3339(), sender, text)
}

fn run(window_secs: f64, records: &[RawRecord]) -> Vec<Window> {
    let mut engine = WindowingEngine::new(EngineConfig::from_secs_f64(window_secs).unwrap());
    let mut windows = Vec::new();
    for record in records {
        if let Ok(emitted) = engine.ingest_raw(record.clone()) {
            windows.extend(emitted);
        }
    }
    windows.extend(engine.flush_all());
    windows
}

fn interleaved() -> Vec<RawRecord> {
    vec![
        raw("abc123", 0, "customer", "Hi"),
        raw("xyz789", 1, "customer", "I need a loan"),
        raw("abc123", 10, "rm", "Hello"),
        raw("xyz789", 12, "rm", "Happy to help"),
        raw("abc123", 32, "customer", "Rate?"),
        raw("xyz789", 20, "customer", "Rates?"),
        raw("abc123", 40, "agent", "3.5%"),
        raw("xyz789", 45, "rm", "4.1%"),
    ]
}

#[test]
fn test_replay_is_deterministic() {
    let records = interleaved();
    let first = serde_json::to_string(&run(30.0, &records)).unwrap();
    let second = serde_json::to_string(&run(30.0, &records)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_sessions_never_mix() {
    for window in run(30.0, &interleaved()) {
        assert!(window
            .messages()
            .iter()
            .all(|m| m.session_id() == window.session_id()));
    }
}

#[test]
fn test_every_accepted_event_lands_in_exactly_one_window() {
    let records = interleaved();
    let windows = run(30.0, &records);
    let total: usize = windows.iter().map(Window::len).sum();
    assert_eq!(total, records.len());
}

#[test]
fn test_threshold_windows_respect_the_span_law() {
    let windows = run(30.0, &interleaved());
    let window_size = TimeDelta::seconds(30);
    for window in windows.iter().filter(|w| w.trigger() == WindowTrigger::Threshold) {
        let closed_at = window.closed_at().unwrap();
        assert!(closed_at - window.window_start() >= window_size);
        assert!(window.window_end() < closed_at);
        assert!(window
            .messages()
            .windows(2)
            .all(|pair| pair[0].timestamp() <= pair[1].timestamp()));
    }
}

#[test]
fn test_xyz_session_windows() {
    let windows = run(30.0, &interleaved());
    let xyz: Vec<Vec<&str>> = windows
        .iter()
        .filter(|w| w.session_id() == "xyz789")
        .map(|w| w.messages().iter().map(Event::text).collect())
        .collect();
    assert_eq!(
        xyz,
        vec![
            vec!["I need a loan", "Happy to help", "Rates?"],
            vec!["4.1%"],
        ]
    );
}

#[test]
fn test_malformed_records_are_skipped() {
    let mut records = interleaved();
    records.insert(2, RawRecord { message: None, ..raw("abc123", 5, "customer", "") });
    records.insert(3, raw("abc123", 6, "bot", "who am I"));
    let windows = run(30.0, &records);
    let total: usize = windows.iter().map(Window::len).sum();
    assert_eq!(total, interleaved().len());
}

#[test]
fn test_settings_drive_the_engine() {
    let settings: EngineSettings =
        toml::from_str("window_size_secs = 5\nidle_timeout_secs = 1").unwrap();
    let config = settings.to_engine_config().unwrap();
    assert_eq!(config.idle_timeout(), Some(Duration::from_secs(1)));

    let mut engine = WindowingEngine::new(config);
    engine.ingest_raw(raw("solo", 0, "customer", "a")).unwrap();
    engine.ingest_raw(raw("solo", 2, "customer", "b")).unwrap();
    let emitted = engine.ingest_raw(raw("solo", 6, "customer", "c")).unwrap();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].count_by(Speaker::Customer), 2);
    assert_eq!(engine.stats().events_accepted, 3);
}
