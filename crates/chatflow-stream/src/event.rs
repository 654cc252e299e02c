use std::fmt;

use crate::errors::StreamFailure;
use crate::session::EventSink;

/// Typed events produced by a `StreamSession`.
///
/// This is the only shape downstream code depends on; upstream wire shapes
/// never leak past the classifier.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental text, with the JSON envelope it came from when there was one.
    Content {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<serde_json::Value>,
    },
    /// Workflow lifecycle, statistics, or tool-thought event.
    Workflow(WorkflowEvent),
    /// End of stream. Emitted at most once per session.
    Complete,
    /// Upstream reported a failure. The session keeps decoding.
    Error { error: StreamFailure },
}

impl StreamEvent {
    /// Hands the event to the matching sink callback.
    pub fn deliver<S: EventSink + ?Sized>(self, sink: &mut S) {
        match self {
            Self::Content { text, raw } => sink.on_content(text, raw),
            Self::Workflow(event) => sink.on_workflow(event),
            Self::Complete => sink.on_complete(),
            Self::Error { error } => sink.on_error(error),
        }
    }
}

/// Kind of a workflow event.
///
/// `Other` carries generic `workflow_*`/`node_*` kinds verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WorkflowKind {
    WorkflowFinished,
    AgentThought,
    MessageEnd,
    Statistics,
    Other(String),
}

impl WorkflowKind {
    /// Wire name of the kind (for example `workflow_finished`).
    pub fn as_str(&self) -> &str {
        match self {
            Self::WorkflowFinished => "workflow_finished",
            Self::AgentThought => "agent_thought",
            Self::MessageEnd => "message_end",
            Self::Statistics => "statistics",
            Self::Other(kind) => kind,
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for WorkflowKind {
    fn from(value: &str) -> Self {
        match value {
            "workflow_finished" => Self::WorkflowFinished,
            "agent_thought" => Self::AgentThought,
            "message_end" => Self::MessageEnd,
            "statistics" => Self::Statistics,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for WorkflowKind {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<WorkflowKind> for String {
    fn from(value: WorkflowKind) -> Self {
        value.as_str().to_string()
    }
}

/// A workflow-side event, serialized in the flat shape that gets persisted
/// alongside a message: `{"event", "data", "message", "toolInfo"?}`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WorkflowEvent {
    #[serde(rename = "event")]
    pub kind: WorkflowKind,
    #[serde(rename = "data", default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "toolInfo", default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolInvocation>,
}

impl WorkflowEvent {
    pub fn new(kind: WorkflowKind, payload: serde_json::Value, message: impl Into<String>) -> Self {
        Self {
            kind,
            payload,
            message: message.into(),
            tool: None,
        }
    }

    pub fn with_tool(mut self, tool: ToolInvocation) -> Self {
        self.tool = Some(tool);
        self
    }

    /// True for `agent_thought` events, which carry tool calls and reasoning
    /// rather than workflow progress.
    pub fn is_tool_thought(&self) -> bool {
        self.kind == WorkflowKind::AgentThought
    }

    /// Persisted flat representation of the event.
    pub fn to_history_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// One tool call observed in an `agent_thought` event.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ToolInvocation {
    #[serde(default)]
    pub name: String,
    /// Tool input as JSON text.
    #[serde(default)]
    pub input: String,
    /// Tool result as text (usually JSON).
    #[serde(default)]
    pub observation: String,
}

impl ToolInvocation {
    pub fn new(
        name: impl Into<String>,
        input: impl Into<String>,
        observation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            observation: observation.into(),
        }
    }

    /// Parsed input, if the input text is valid JSON.
    pub fn parsed_input(&self) -> Option<serde_json::Value> {
        serde_json::from_str(self.input.trim()).ok()
    }

    /// Same tool and structurally equal input.
    ///
    /// Inputs that are not JSON fall back to comparing trimmed text.
    pub fn same_call(&self, other: &ToolInvocation) -> bool {
        if self.name != other.name {
            return false;
        }
        match (self.parsed_input(), other.parsed_input()) {
            (Some(a), Some(b)) => a == b,
            _ => self.input.trim() == other.input.trim(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn workflow_kind_round_trips_known_and_other_names() {
        assert_eq!(WorkflowKind::from("agent_thought"), WorkflowKind::AgentThought);
        assert_eq!(
            WorkflowKind::from("node_started"),
            WorkflowKind::Other("node_started".into())
        );
        assert_eq!(WorkflowKind::MessageEnd.to_string(), "message_end");
    }

    #[test]
    fn workflow_event_serializes_in_persisted_flat_shape() {
        let event = WorkflowEvent::new(
            WorkflowKind::AgentThought,
            json!({"tool": "search"}),
            "looking things up",
        )
        .with_tool(ToolInvocation::new("search", "{\"q\":1}", ""));
        let value = event.to_history_value();
        assert_eq!(value["event"], "agent_thought");
        assert_eq!(value["data"]["tool"], "search");
        assert_eq!(value["toolInfo"]["name"], "search");

        let back: WorkflowEvent = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, event);
    }

    #[test]
    fn same_call_compares_input_structurally() {
        let a = ToolInvocation::new("x", "{\"q\":1}", "");
        let b = ToolInvocation::new("x", "{\"q\": 1}", "done");
        let c = ToolInvocation::new("x", "{\"q\": 2}", "");
        let d = ToolInvocation::new("y", "{\"q\":1}", "");
        assert!(a.same_call(&b));
        assert!(!a.same_call(&c));
        assert!(!a.same_call(&d));
    }

    #[test]
    fn same_call_ignores_key_order() {
        let a = ToolInvocation::new("x", "{\"a\":1,\"b\":2}", "");
        let b = ToolInvocation::new("x", "{\"b\":2,\"a\":1}", "");
        assert!(a.same_call(&b));
    }

    #[test]
    fn deliver_replays_into_another_sink() {
        let events = vec![
            StreamEvent::Content {
                text: "a".into(),
                raw: None,
            },
            StreamEvent::Error {
                error: StreamFailure::upstream("boom"),
            },
            StreamEvent::Complete,
        ];
        let mut replayed: Vec<StreamEvent> = Vec::new();
        for event in events.clone() {
            event.deliver(&mut replayed);
        }
        assert_eq!(replayed, events);
    }

    #[test]
    fn stream_event_is_tagged_by_type() {
        let value = serde_json::to_value(StreamEvent::Content {
            text: "hi".into(),
            raw: None,
        })
        .expect("serialize");
        assert_eq!(value, json!({"type": "content", "text": "hi"}));
        let value = serde_json::to_value(StreamEvent::Complete).expect("serialize");
        assert_eq!(value, json!({"type": "complete"}));
    }
}
