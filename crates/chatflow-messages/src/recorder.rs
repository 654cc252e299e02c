use chatflow_stream::{EventSink, StreamFailure, WorkflowEvent};
use serde_json::Value;
use tracing::debug;

use crate::history::PersistedMessage;

/// Builds the message being streamed, in the same shape it will be stored.
///
/// Feed it as a session sink; `into_persisted` then yields a row the
/// `Normalizer` treats exactly like one reloaded from history.
#[derive(Debug, Default, Clone)]
pub struct MessageRecorder {
    content: String,
    reasoning: String,
    workflow_events: Vec<Value>,
    errors: Vec<StreamFailure>,
    completed: bool,
    created_at: Option<String>,
}

impl MessageRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps the message with its creation time (RFC 3339).
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn workflow_events(&self) -> &[Value] {
        &self.workflow_events
    }

    pub fn errors(&self) -> &[StreamFailure] {
        &self.errors
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn into_persisted(self) -> PersistedMessage {
        PersistedMessage {
            role: Some("agent".to_string()),
            content: Some(self.content),
            thought_content: (!self.reasoning.is_empty()).then_some(self.reasoning),
            workflow_events: self.workflow_events,
            created_at: self.created_at,
            ..Default::default()
        }
    }
}

impl EventSink for MessageRecorder {
    fn on_content(&mut self, text: String, _raw: Option<Value>) {
        self.content.push_str(&text);
    }

    fn on_workflow(&mut self, event: WorkflowEvent) {
        let thought = event.message.trim();
        // Thoughts are re-sent as the agent iterates; keep each one once.
        if event.is_tool_thought() && !thought.is_empty() && !self.reasoning.ends_with(thought) {
            if !self.reasoning.is_empty() {
                self.reasoning.push('\n');
            }
            self.reasoning.push_str(thought);
        }
        self.workflow_events.push(event.to_history_value());
    }

    fn on_complete(&mut self) {
        debug!(
            content_len = self.content.len(),
            events = self.workflow_events.len(),
            "message recorded"
        );
        self.completed = true;
    }

    fn on_error(&mut self, error: StreamFailure) {
        self.errors.push(error);
    }
}
