use colloquy_core::{CognitiveAnalysis, ColloquyError, ColloquyResult};
use serde_json::{Map, Value};

const INTENT_KEYS: &[&str] = &["customer_intent", "intent"];
const STRATEGY_KEYS: &[&str] = &["rm_strategy", "strategy"];
const URGENCY_KEYS: &[&str] = &["urgency_level", "urgency"];
const EMOTION_KEYS: &[&str] = &["emotion", "customer_emotion"];
const NEXT_ACTION_KEYS: &[&str] = &["next_action"];

/// Parses a model answer into a [`CognitiveAnalysis`].
///
/// Tolerates Markdown code fences and prose around the JSON object. The
/// analysis fields may sit under an `analysis` key or next to `response`.
/// A missing `response` or a missing analysis block is an
/// [`ColloquyError::Analysis`] error; individual missing fields are left
/// empty.
pub fn parse_analysis(raw: &str) -> ColloquyResult<CognitiveAnalysis> {
    let json = outermost_object(strip_fences(raw))
        .ok_or_else(|| ColloquyError::Analysis("no JSON object in response".into()))?;
    let value: Value = serde_json::from_str(json)
        .map_err(|e| ColloquyError::Analysis(format!("invalid JSON: {e}")))?;
    let root = value
        .as_object()
        .ok_or_else(|| ColloquyError::Analysis("response is not a JSON object".into()))?;

    let response_text = root
        .get("response")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ColloquyError::Analysis("missing 'response' field".into()))?
        .to_string();

    let analysis = match root.get("analysis") {
        Some(Value::Object(nested)) => nested,
        Some(_) => {
            return Err(ColloquyError::Analysis(
                "'analysis' is not a JSON object".into(),
            ))
        }
        None if has_any(root, INTENT_KEYS) || has_any(root, STRATEGY_KEYS) => root,
        None => return Err(ColloquyError::Analysis("missing 'analysis' block".into())),
    };

    Ok(CognitiveAnalysis {
        response_text,
        intent: field(analysis, INTENT_KEYS),
        strategy: field(analysis, STRATEGY_KEYS),
        urgency: field(analysis, URGENCY_KEYS).to_lowercase(),
        emotion: field(analysis, EMOTION_KEYS),
        next_action: field(analysis, NEXT_ACTION_KEYS),
    })
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json).
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn has_any(map: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|k| map.contains_key(*k))
}

fn field(map: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| map.get(*k))
        .map(|v| match v {
            Value::String(s) => s.trim().to_string(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}
