//! Event classification: recovered JSON (or bare text) to typed events.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::config::DecoderConfig;
use crate::errors::StreamFailure;
use crate::event::{ToolInvocation, WorkflowEvent, WorkflowKind};
use crate::frame::has_visible_characters;

/// Upstream event discriminator (the `event` field).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Message,
    AgentMessage,
    TextChunk,
    WorkflowFinished,
    AgentThought,
    MessageEnd,
    Ping,
    Error,
    Statistics,
    Unrecognized(String),
}

impl EventKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "message" => Self::Message,
            "agent_message" => Self::AgentMessage,
            "text_chunk" => Self::TextChunk,
            "workflow_finished" => Self::WorkflowFinished,
            "agent_thought" => Self::AgentThought,
            "message_end" => Self::MessageEnd,
            "ping" => Self::Ping,
            "error" => Self::Error,
            "statistics" => Self::Statistics,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "message",
            Self::AgentMessage => "agent_message",
            Self::TextChunk => "text_chunk",
            Self::WorkflowFinished => "workflow_finished",
            Self::AgentThought => "agent_thought",
            Self::MessageEnd => "message_end",
            Self::Ping => "ping",
            Self::Error => "error",
            Self::Statistics => "statistics",
            Self::Unrecognized(kind) => kind,
        }
    }
}

/// Why a value produced no event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ignored {
    /// `ping` keep-alive.
    Heartbeat,
    /// A content-bearing value with no usable text.
    NoContent,
    /// Text with no printable characters.
    Invisible,
    /// Kind matched no rule.
    Unrecognized(String),
}

/// Routing decision for one recovered value or bare frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Content {
        text: String,
        raw: Option<Value>,
    },
    Workflow(WorkflowEvent),
    /// `message_end`: emit the event, then complete the stream.
    EndOfMessage(WorkflowEvent),
    Error(StreamFailure),
    Ignored(Ignored),
}

/// Decides which texts may be emitted as content.
#[derive(Debug, Clone, Copy)]
pub struct ContentFilter<'a> {
    placeholders: &'a [String],
    kind: Option<&'a str>,
}

impl<'a> ContentFilter<'a> {
    pub fn new(placeholders: &'a [String]) -> Self {
        Self {
            placeholders,
            kind: None,
        }
    }

    /// Also reject a literal echo of the event kind (`"text_chunk"`).
    pub fn for_kind(mut self, kind: &'a str) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Non-blank, not a placeholder, not the event kind.
    pub fn usable(&self, text: &str) -> bool {
        let trimmed = text.trim();
        !trimmed.is_empty()
            && !self.placeholders.iter().any(|p| p == trimmed)
            && self.kind != Some(trimmed)
    }
}

/// Ordered content lookup shared by the message kinds, unrecognized
/// message-like kinds, and objects without a discriminator.
const PREFERRED_CONTENT_PATHS: &[&[&str]] = &[
    &["content"],
    &["answer"],
    &["text"],
    &["data", "text"],
    &["data", "content"],
    &["message"],
];

const CONTENT_FIELDS: &[&str] = &[
    "content", "answer", "text", "message", "output", "value", "result",
];

const NESTED_CONTENT_PATHS: &[&str] = &[
    "data", "result", "output", "response", "message", "payload", "body",
];

const MAX_CONTENT_SEARCH_DEPTH: usize = 8;

const WORKFLOW_FINISHED_FIELDS: &[&str] = &[
    "status",
    "elapsed_time",
    "total_tokens",
    "total_steps",
    "finished_at",
    "error",
    "outputs",
];

static QUOTED_CONTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"(?:content|answer|text)"\s*:\s*"((?:[^"\\]|\\.)*)""#)
        .expect("quoted content pattern is valid")
});

/// Content search: the preferred paths in order, then the heuristic
/// `find_content_in_object`. First usable string wins.
pub fn extract_content(obj: &Map<String, Value>, filter: &ContentFilter<'_>) -> Option<String> {
    for path in PREFERRED_CONTENT_PATHS {
        if let Some(text) = lookup_str(obj, path)
            && filter.usable(text)
        {
            return Some(text.to_string());
        }
    }
    find_content_in_object(obj, filter).map(str::to_string)
}

/// Heuristic search of an object for anything that reads like content.
///
/// Tries the known content field names, then the common nesting keys
/// recursively, then a lone string field, then any string field that is
/// longer than three characters, not a plain number and not JSON-shaped.
/// The `event` discriminator and id-like keys are never returned.
pub fn find_content_in_object<'v>(
    obj: &'v Map<String, Value>,
    filter: &ContentFilter<'_>,
) -> Option<&'v str> {
    search_object(obj, filter, 0)
}

fn search_object<'v>(
    obj: &'v Map<String, Value>,
    filter: &ContentFilter<'_>,
    depth: usize,
) -> Option<&'v str> {
    for field in CONTENT_FIELDS {
        if let Some(Value::String(text)) = obj.get(*field)
            && filter.usable(text)
        {
            return Some(text.as_str());
        }
    }

    if depth < MAX_CONTENT_SEARCH_DEPTH {
        for key in NESTED_CONTENT_PATHS {
            if let Some(Value::Object(inner)) = obj.get(*key)
                && let Some(found) = search_object(inner, filter, depth + 1)
            {
                return Some(found);
            }
        }
    }

    if obj.len() == 1
        && let Some((key, Value::String(text))) = obj.iter().next()
        && !is_metadata_key(key)
        && filter.usable(text)
    {
        return Some(text.as_str());
    }

    for (key, value) in obj {
        if is_metadata_key(key) || CONTENT_FIELDS.contains(&key.to_ascii_lowercase().as_str()) {
            continue;
        }
        if let Value::String(text) = value
            && looks_like_prose(text)
            && filter.usable(text)
        {
            return Some(text.as_str());
        }
    }
    None
}

fn is_metadata_key(key: &str) -> bool {
    key == "event" || key == "id" || key.ends_with("_id")
}

fn looks_like_prose(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.chars().count() > 3
        && !is_plain_number(trimmed)
        && !trimmed.starts_with('{')
        && !trimmed.starts_with('[')
}

fn is_plain_number(text: &str) -> bool {
    let mut parts = text.splitn(2, '.');
    let int = parts.next().unwrap_or("");
    let frac = parts.next();
    !int.is_empty()
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.is_none_or(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
}

fn lookup_str<'v>(obj: &'v Map<String, Value>, path: &[&str]) -> Option<&'v str> {
    let (last, parents) = path.split_last()?;
    let mut current = obj;
    for key in parents {
        current = current.get(*key)?.as_object()?;
    }
    current.get(*last)?.as_str()
}

/// First non-empty string among `keys`.
fn first_text<'v>(obj: &'v Map<String, Value>, keys: &[&str]) -> &'v str {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

/// Field rendered as text: strings verbatim, other non-null values as JSON.
fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Stateless classifier; one per session.
#[derive(Debug, Clone)]
pub struct Classifier {
    placeholders: Vec<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::from_config(&DecoderConfig::default())
    }
}

impl Classifier {
    pub fn new(placeholders: Vec<String>) -> Self {
        Self { placeholders }
    }

    pub fn from_config(config: &DecoderConfig) -> Self {
        Self::new(config.placeholders.clone())
    }

    fn filter(&self) -> ContentFilter<'_> {
        ContentFilter::new(&self.placeholders)
    }

    /// Classifies one recovered JSON value. `frame` is the text it came from,
    /// used when a non-object value is routed as plain content.
    pub fn classify_value(&self, value: &Value, frame: &str) -> Classification {
        let obj = match value {
            Value::Object(obj) => obj,
            Value::String(text) => return self.plain_content(text),
            _ => return self.plain_content(frame),
        };
        match obj.get("event").and_then(Value::as_str) {
            Some(kind) => self.classify_event(EventKind::parse(kind), obj),
            None => self.classify_undiscriminated(obj),
        }
    }

    fn classify_event(&self, kind: EventKind, obj: &Map<String, Value>) -> Classification {
        match kind {
            EventKind::Message | EventKind::AgentMessage | EventKind::TextChunk => {
                self.content_from(obj, kind.as_str())
            }
            EventKind::WorkflowFinished => Classification::Workflow(workflow_finished(obj)),
            EventKind::AgentThought => Classification::Workflow(agent_thought(obj)),
            EventKind::MessageEnd => {
                let payload = match obj.get("data") {
                    Some(Value::Object(data)) => Value::Object(data.clone()),
                    _ => Value::Object(Map::new()),
                };
                Classification::EndOfMessage(WorkflowEvent::new(
                    WorkflowKind::MessageEnd,
                    payload,
                    first_text(obj, &["message", "text"]),
                ))
            }
            EventKind::Ping => Classification::Ignored(Ignored::Heartbeat),
            EventKind::Error => {
                let message = text_field(obj, "message")
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Unknown error".to_string());
                Classification::Error(StreamFailure::upstream(message))
            }
            EventKind::Statistics => Classification::Workflow(WorkflowEvent::new(
                WorkflowKind::Statistics,
                Value::Object(obj.clone()),
                statistics_summary(obj),
            )),
            EventKind::Unrecognized(kind) => self.classify_unrecognized(&kind, obj),
        }
    }

    fn classify_unrecognized(&self, kind: &str, obj: &Map<String, Value>) -> Classification {
        if kind.contains("workflow") || kind.contains("node") {
            let mut merged = obj.clone();
            if let Some(Value::Object(nested)) = obj.get("data") {
                for (key, value) in nested {
                    merged.insert(key.clone(), value.clone());
                }
            }
            return Classification::Workflow(WorkflowEvent::new(
                WorkflowKind::from(kind),
                Value::Object(merged),
                first_text(obj, &["message", "text", "thought"]),
            ));
        }
        if kind.starts_with("message")
            || kind.starts_with("text")
            || kind.starts_with("chunk")
            || kind == "agent_message"
        {
            return self.content_from(obj, kind);
        }
        Classification::Ignored(Ignored::Unrecognized(kind.to_string()))
    }

    fn classify_undiscriminated(&self, obj: &Map<String, Value>) -> Classification {
        if obj.is_empty() {
            return Classification::Ignored(Ignored::NoContent);
        }
        let text = extract_content(obj, &self.filter())
            .unwrap_or_else(|| Value::Object(obj.clone()).to_string());
        Classification::Content {
            text,
            raw: Some(Value::Object(obj.clone())),
        }
    }

    fn content_from(&self, obj: &Map<String, Value>, kind: &str) -> Classification {
        match extract_content(obj, &self.filter().for_kind(kind)) {
            Some(text) => Classification::Content {
                text,
                raw: Some(Value::Object(obj.clone())),
            },
            None => Classification::Ignored(Ignored::NoContent),
        }
    }

    fn plain_content(&self, text: &str) -> Classification {
        let trimmed = text.trim();
        if !has_visible_characters(trimmed) {
            return Classification::Ignored(Ignored::Invisible);
        }
        if !self.filter().usable(trimmed) {
            return Classification::Ignored(Ignored::NoContent);
        }
        Classification::Content {
            text: trimmed.to_string(),
            raw: None,
        }
    }

    /// Classifies a frame from which no JSON could be recovered.
    pub fn classify_text(&self, frame: &str) -> Classification {
        let trimmed = frame.trim();
        if !has_visible_characters(trimmed) {
            return Classification::Ignored(Ignored::Invisible);
        }
        let lower = trimmed.to_lowercase();
        if lower.contains("error") {
            return Classification::Error(StreamFailure::error_text(trimmed));
        }
        if (lower.contains("content") || lower.contains("answer") || lower.contains("text"))
            && let Some(text) = extract_quoted_value(trimmed)
            && self.filter().usable(&text)
        {
            return Classification::Content { text, raw: None };
        }
        self.plain_content(trimmed)
    }
}

/// Pulls the first quoted `content`/`answer`/`text` value out of text that
/// is not valid JSON.
pub fn extract_quoted_value(text: &str) -> Option<String> {
    let captures = QUOTED_CONTENT.captures(text)?;
    let raw = captures.get(1)?.as_str();
    let unescaped = serde_json::from_str::<String>(&format!("\"{raw}\""))
        .unwrap_or_else(|_| raw.to_string());
    (!unescaped.trim().is_empty()).then_some(unescaped)
}

fn workflow_finished(obj: &Map<String, Value>) -> WorkflowEvent {
    let mut payload = Map::new();
    for field in WORKFLOW_FINISHED_FIELDS {
        if let Some(value) = obj.get(*field)
            && !value.is_null()
        {
            payload.insert(field.to_string(), value.clone());
        }
    }
    if let Some(Value::Object(nested)) = obj.get("data") {
        for (key, value) in nested {
            payload.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    WorkflowEvent::new(
        WorkflowKind::WorkflowFinished,
        Value::Object(payload),
        first_text(obj, &["message", "text"]),
    )
}

fn agent_thought(obj: &Map<String, Value>) -> WorkflowEvent {
    let tool = ToolInvocation::new(
        first_text(obj, &["tool"]),
        text_field(obj, "tool_input").unwrap_or_else(|| "{}".to_string()),
        text_field(obj, "observation").unwrap_or_default(),
    );
    let thought = text_field(obj, "thought")
        .or_else(|| text_field(obj, "observation"))
        .unwrap_or_default();
    WorkflowEvent::new(
        WorkflowKind::AgentThought,
        Value::Object(obj.clone()),
        thought,
    )
    .with_tool(tool)
}

fn statistics_summary(obj: &Map<String, Value>) -> String {
    let nested = match obj.get("data") {
        Some(Value::Object(nested)) => Some(nested),
        _ => None,
    };
    let figure = |key: &str| {
        nested
            .and_then(|n| positive_figure(n, key))
            .or_else(|| positive_figure(obj, key))
    };
    let mut parts = Vec::new();
    if let Some(tokens) = figure("total_tokens_estimated") {
        parts.push(format!("~{} tokens", tokens.trunc() as u64));
    }
    if let Some(cost) = figure("estimated_cost") {
        parts.push(format!("estimated cost {cost}"));
    }
    if parts.is_empty() {
        "Statistics updated".to_string()
    } else {
        format!("Statistics updated: {}", parts.join(", "))
    }
}

/// Positive number or numeric string.
fn positive_figure(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    let n = match obj.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n.is_finite() && n > 0.0).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(value: Value) -> Classification {
        let frame = value.to_string();
        Classifier::default().classify_value(&value, &frame)
    }

    fn content_text(c: Classification) -> String {
        match c {
            Classification::Content { text, .. } => text,
            other => panic!("expected content, got {other:?}"),
        }
    }

    fn workflow(c: Classification) -> WorkflowEvent {
        match c {
            Classification::Workflow(event) => event,
            other => panic!("expected workflow, got {other:?}"),
        }
    }

    #[test]
    fn message_kinds_follow_field_preference() {
        let c = classify(json!({"event":"message","answer":"A","text":"T"}));
        assert_eq!(content_text(c), "A");
        let c = classify(json!({"event":"text_chunk","data":{"text":"nested"}}));
        assert_eq!(content_text(c), "nested");
        let c = classify(json!({"event":"agent_message","message":"m"}));
        assert_eq!(content_text(c), "m");
    }

    #[test]
    fn content_keeps_raw_envelope() {
        let value = json!({"event":"message","answer":"hi","conversation_id":"c1"});
        match classify(value.clone()) {
            Classification::Content { text, raw } => {
                assert_eq!(text, "hi");
                assert_eq!(raw, Some(value));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sentinels_are_skipped_in_favour_of_later_fields() {
        let c = classify(json!({"event":"text_chunk","content":"[waiting]","text":"real"}));
        assert_eq!(content_text(c), "real");
        let c = classify(json!({"event":"text_chunk","text":"text_chunk"}));
        assert_eq!(c, Classification::Ignored(Ignored::NoContent));
    }

    #[test]
    fn workflow_finished_keeps_top_level_over_nested() {
        let event = workflow(classify(json!({
            "event":"workflow_finished",
            "status":"succeeded",
            "data":{"status":"failed","total_tokens":42}
        })));
        assert_eq!(event.kind, WorkflowKind::WorkflowFinished);
        assert_eq!(event.payload["status"], "succeeded");
        assert_eq!(event.payload["total_tokens"], 42);
    }

    #[test]
    fn agent_thought_extracts_tool_and_thought() {
        let event = workflow(classify(json!({
            "event":"agent_thought",
            "tool":"search",
            "tool_input":"",
            "observation":"found it",
            "thought":""
        })));
        assert!(event.is_tool_thought());
        assert_eq!(event.message, "found it");
        assert_eq!(event.tool, Some(ToolInvocation::new("search", "{}", "found it")));
    }

    #[test]
    fn message_end_completes_with_nested_payload() {
        match classify(json!({"event":"message_end","data":{"usage":{"total_tokens":3}}})) {
            Classification::EndOfMessage(event) => {
                assert_eq!(event.kind, WorkflowKind::MessageEnd);
                assert_eq!(event.payload, json!({"usage":{"total_tokens":3}}));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ping_is_swallowed_and_error_is_surfaced() {
        assert_eq!(
            classify(json!({"event":"ping"})),
            Classification::Ignored(Ignored::Heartbeat)
        );
        assert_eq!(
            classify(json!({"event":"error","message":"quota"})),
            Classification::Error(StreamFailure::upstream("quota"))
        );
        assert_eq!(
            classify(json!({"event":"error"})),
            Classification::Error(StreamFailure::upstream("Unknown error"))
        );
    }

    #[test]
    fn statistics_summary_mentions_present_figures() {
        let event = workflow(classify(json!({
            "event":"statistics",
            "data":{"total_tokens_estimated":"150","estimated_cost":0.0018}
        })));
        assert_eq!(event.kind, WorkflowKind::Statistics);
        assert_eq!(
            event.message,
            "Statistics updated: ~150 tokens, estimated cost 0.0018"
        );
        let event = workflow(classify(json!({"event":"statistics"})));
        assert_eq!(event.message, "Statistics updated");
    }

    #[test]
    fn statistics_summary_falls_back_to_top_level_and_skips_zero() {
        let event = workflow(classify(json!({
            "event":"statistics",
            "total_tokens_estimated":150,
            "estimated_cost":"0.0018",
            "data":{"total_tokens_estimated":0,"model":"m"}
        })));
        assert_eq!(
            event.message,
            "Statistics updated: ~150 tokens, estimated cost 0.0018"
        );
        let event = workflow(classify(json!({
            "event":"statistics",
            "data":{"total_tokens_estimated":"0","estimated_cost":"n/a"}
        })));
        assert_eq!(event.message, "Statistics updated");
    }

    #[test]
    fn unrecognized_workflow_kinds_merge_nested_data() {
        let event = workflow(classify(json!({
            "event":"node_started",
            "task_id":"t",
            "data":{"title":"LLM","task_id":"nested"}
        })));
        assert_eq!(event.kind, WorkflowKind::Other("node_started".into()));
        assert_eq!(event.payload["title"], "LLM");
        assert_eq!(event.payload["task_id"], "nested");
    }

    #[test]
    fn unrecognized_message_like_kinds_use_content_search() {
        let c = classify(json!({"event":"message_replace","answer":"fixed"}));
        assert_eq!(content_text(c), "fixed");
    }

    #[test]
    fn unknown_kind_without_text_is_dropped() {
        assert_eq!(
            classify(json!({"event":"foo_bar","value":1})),
            Classification::Ignored(Ignored::Unrecognized("foo_bar".into()))
        );
    }

    #[test]
    fn objects_without_event_are_plain_content() {
        let c = classify(json!({"answer":"no discriminator"}));
        assert_eq!(content_text(c), "no discriminator");
        let c = classify(json!({"code":400}));
        assert_eq!(content_text(c), "{\"code\":400}");
    }

    #[test]
    fn find_content_in_object_searches_nested_then_loose_fields() {
        let placeholders = Vec::new();
        let filter = ContentFilter::new(&placeholders);
        let obj = json!({"payload":{"body":{"result":"deep"}}});
        assert_eq!(find_content_in_object(obj.as_object().unwrap(), &filter), Some("deep"));

        let obj = json!({"conversation_id":"abc-123","count":"42","note":"free text here"});
        assert_eq!(
            find_content_in_object(obj.as_object().unwrap(), &filter),
            Some("free text here")
        );

        let obj = json!({"shape":"{\"a\":1}","n":"3.14"});
        assert_eq!(find_content_in_object(obj.as_object().unwrap(), &filter), None);
    }

    #[test]
    fn text_frames_route_by_keyword() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify_text("  plain words  "),
            Classification::Content {
                text: "plain words".into(),
                raw: None
            }
        );
        assert!(matches!(
            classifier.classify_text("Internal Error occurred"),
            Classification::Error(StreamFailure::ErrorText { .. })
        ));
        assert_eq!(
            classifier.classify_text("{\"answer\":\"partial \\\"q\\\"\", broken"),
            Classification::Content {
                text: "partial \"q\"".into(),
                raw: None
            }
        );
        assert_eq!(
            classifier.classify_text("\u{1}\u{2}"),
            Classification::Ignored(Ignored::Invisible)
        );
        assert_eq!(
            classifier.classify_text("[waiting]"),
            Classification::Ignored(Ignored::NoContent)
        );
    }

    #[test]
    fn plain_number_detection() {
        assert!(is_plain_number("42"));
        assert!(is_plain_number("3.14"));
        assert!(!is_plain_number("3."));
        assert!(!is_plain_number("v1.2"));
    }
}
