use crate::error::{ColloquyError, ColloquyResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The role of the participant that authored an [`Event`].
///
/// Variant order is significant: it is the tie-break order used when two
/// events of one window carry the same timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Speaker {
    /// The customer side of the conversation.
    #[serde(rename = "customer")]
    Customer,
    /// The relationship manager / agent side of the conversation.
    #[serde(rename = "rm", alias = "agent")]
    Agent,
}

impl Speaker {
    /// Both roles, in tie-break order.
    pub const ALL: [Speaker; 2] = [Speaker::Customer, Speaker::Agent];

    /// Parses a wire-level sender tag (`customer`, `rm`, `agent`), case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "customer" => Some(Self::Customer),
            "rm" | "agent" => Some(Self::Agent),
            _ => None,
        }
    }

    /// The wire-level tag for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Agent => "rm",
        }
    }

    /// Human-readable label used when rendering transcripts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Agent => "RM",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single dialogue turn. Immutable once created.
///
/// Deserialization goes through [`Event::new`], so a blank session id is
/// rejected there as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EventFields")]
pub struct Event {
    session_id: String,
    timestamp: DateTime<Utc>,
    speaker: Speaker,
    text: String,
}

impl Event {
    /// Creates a new event. Fails when the session id is blank.
    pub fn new(
        session_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        speaker: Speaker,
        text: impl Into<String>,
    ) -> ColloquyResult<Self> {
        let session_id = session_id.into().trim().to_string();
        if session_id.is_empty() {
            return Err(ColloquyError::MalformedEvent(
                "session_id must not be empty".into(),
            ));
        }
        Ok(Self {
            session_id,
            timestamp,
            speaker,
            text: text.into(),
        })
    }

    /// Session this turn belongs to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Event time carried by the data.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Who spoke.
    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    /// What was said.
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Deserialize)]
struct EventFields {
    session_id: String,
    timestamp: DateTime<Utc>,
    speaker: Speaker,
    text: String,
}

impl TryFrom<EventFields> for Event {
    type Error = ColloquyError;

    fn try_from(fields: EventFields) -> ColloquyResult<Self> {
        Event::new(fields.session_id, fields.timestamp, fields.speaker, fields.text)
    }
}

/// An unvalidated input record, as produced by an event source.
///
/// Every field is optional at this stage so that a record with a missing
/// field can still be read and then rejected with a precise reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Conversation session identifier.
    #[serde(default)]
    pub session_id: Option<String>,
    /// ISO-8601 event time.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Sender tag: `customer` or `rm`.
    #[serde(default)]
    pub sender: Option<String>,
    /// Message text.
    #[serde(default)]
    pub message: Option<String>,
}

impl RawRecord {
    /// Convenience constructor with every field present.
    pub fn new(
        session_id: impl Into<String>,
        timestamp: impl Into<String>,
        sender: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            session_id: Some(session_id.into()),
            timestamp: Some(timestamp.into()),
            sender: Some(sender.into()),
            message: Some(message.into()),
        }
    }
}

impl TryFrom<RawRecord> for Event {
    type Error = ColloquyError;

    fn try_from(raw: RawRecord) -> ColloquyResult<Self> {
        let session_id = raw
            .session_id
            .ok_or_else(|| ColloquyError::MalformedEvent("missing session_id".into()))?;
        let timestamp = raw
            .timestamp
            .ok_or_else(|| ColloquyError::MalformedEvent("missing timestamp".into()))
            .and_then(|ts| parse_timestamp(&ts))?;
        let sender = raw
            .sender
            .ok_or_else(|| ColloquyError::MalformedEvent("missing sender".into()))?;
        let speaker = Speaker::parse(&sender).ok_or_else(|| {
            ColloquyError::MalformedEvent(format!("unknown sender '{sender}'"))
        })?;
        let text = raw
            .message
            .ok_or_else(|| ColloquyError::MalformedEvent("missing message".into()))?;
        Event::new(session_id, timestamp, speaker, text)
    }
}

/// Parses an ISO-8601 timestamp.
///
/// Accepts RFC 3339 (`2024-01-15T10:00:00Z`, `2024-01-15T10:00:00.250+02:00`)
/// and naive date-times without an offset, which are taken to be UTC.
pub fn parse_timestamp(raw: &str) -> ColloquyResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(ColloquyError::MalformedEvent(format!(
        "unparsable timestamp '{raw}'"
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_speaker_parse() {
        assert_eq!(Speaker::parse("customer"), Some(Speaker::Customer));
        assert_eq!(Speaker::parse("RM"), Some(Speaker::Agent));
        assert_eq!(Speaker::parse(" agent "), Some(Speaker::Agent));
        assert_eq!(Speaker::parse("bot"), None);
    }

    #[test]
    fn test_speaker_tie_break_order() {
        assert!(Speaker::Customer < Speaker::Agent);
    }

    #[test]
    fn test_speaker_serialization() {
        assert_eq!(serde_json::to_string(&Speaker::Agent).unwrap(), "\"rm\"");
        let parsed: Speaker = serde_json::from_str("\"agent\"").unwrap();
        assert_eq!(parsed, Speaker::Agent);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-15T10:00:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-15T12:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-15T10:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-15 10:00:00").unwrap(), expected);

        let fractional = parse_timestamp("2024-01-15T10:00:00.250").unwrap();
        assert_eq!(fractional.nanosecond(), 250_000_000);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, ColloquyError::MalformedEvent(_)));
    }

    #[test]
    fn test_raw_record_conversion() {
        let raw = RawRecord::new("abc123", "2024-01-15T10:00:00Z", "rm", "Hello");
        let event = Event::try_from(raw).unwrap();
        assert_eq!(event.session_id(), "abc123");
        assert_eq!(event.speaker(), Speaker::Agent);
        assert_eq!(event.text(), "Hello");
    }

    #[test]
    fn test_raw_record_missing_timestamp() {
        let raw = RawRecord {
            timestamp: None,
            ..RawRecord::new("abc123", "", "customer", "Hi")
        };
        let err = Event::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("missing timestamp"));
    }

    #[test]
    fn test_raw_record_null_timestamp_from_json() {
        let raw: RawRecord = serde_json::from_str(
            r#"{"session_id":"abc","timestamp":null,"sender":"customer","message":"Hi"}"#,
        )
        .unwrap();
        assert!(Event::try_from(raw).is_err());
    }

    #[test]
    fn test_raw_record_blank_session() {
        let raw = RawRecord::new("   ", "2024-01-15T10:00:00Z", "customer", "Hi");
        assert!(matches!(
            Event::try_from(raw),
            Err(ColloquyError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_event_json_roundtrip() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let event = Event::new("abc123", ts, Speaker::Customer, "Hi").unwrap();
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(serde_json::from_str::<Event>(&json).unwrap(), event);
    }

    #[test]
    fn test_event_deserialize_rejects_blank_session() {
        let err = serde_json::from_str::<Event>(
            r#"{"session_id":"  ","timestamp":"2024-01-15T10:00:00Z","speaker":"customer","text":"Hi"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("session_id must not be empty"));
    }

    #[test]
    fn test_raw_record_unknown_sender() {
        let raw = RawRecord::new("abc", "2024-01-15T10:00:00Z", "narrator", "Hi");
        let err = Event::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("narrator"));
    }
}
