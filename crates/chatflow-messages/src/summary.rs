//! One-line summaries of stored workflow events for display.

use serde::Serialize;
use serde_json::Value;

use crate::history::EventView;
use crate::lenient::number_of;

/// A stored workflow event prepared for display. `data` keeps the original
/// event and starts collapsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowEventSummary {
    pub kind: String,
    pub message: String,
    pub data: Value,
    pub collapsed: bool,
}

impl WorkflowEventSummary {
    pub fn new(event: &Value, preview_chars: usize) -> Self {
        let kind = EventView::parse(event)
            .map(|view| view.kind().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            kind,
            message: summarize_event(event, preview_chars),
            data: event.clone(),
            collapsed: true,
        }
    }
}

/// Human-readable one-liner for a stored workflow event.
///
/// Content previews are cut to `preview_chars` characters.
pub fn summarize_event(event: &Value, preview_chars: usize) -> String {
    let Some(view) = EventView::parse(event) else {
        return "Event: unknown".to_string();
    };
    match view.kind() {
        "text_chunk" => format!(
            "Text chunk: {}",
            preview(first_str(&view, &["text", "content"]), preview_chars)
        ),
        "message" => format!(
            "Message: {}",
            preview(first_str(&view, &["answer", "content"]), preview_chars)
        ),
        "workflow_started" => "Workflow started".to_string(),
        "workflow_finished" => format!(
            "Workflow finished: {}",
            first_str(&view, &["status"]).unwrap_or("succeeded")
        ),
        "node_started" => format!("Node started: {}", node_label(&view)),
        "node_finished" => format!("Node finished: {}", node_label(&view)),
        "message_end" => "Message ended".to_string(),
        "agent_thought" => match first_str(&view, &["tool"]) {
            Some(tool) => format!("Agent thought: using {tool}"),
            None => match first_str(&view, &["thought", "message"]) {
                Some(thought) => format!("Agent thought: {}", preview(Some(thought), preview_chars)),
                None => "Agent thought".to_string(),
            },
        },
        "statistics" => statistics_line(&view),
        "error" => format!(
            "Error: {}",
            first_str(&view, &["message", "error"]).unwrap_or("unknown error")
        ),
        other => format!("Event: {other}"),
    }
}

fn first_str<'a>(view: &EventView<'a>, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| view.str_field(name))
}

fn node_label(view: &EventView<'_>) -> String {
    let from_node_data = view
        .field("node_data")
        .and_then(Value::as_object)
        .and_then(|node| {
            ["title", "node_id"].iter().find_map(|key| {
                node.get(*key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
            })
        });
    from_node_data
        .or_else(|| view.str_field("title"))
        .or_else(|| view.str_field("node_id"))
        .unwrap_or("unknown node")
        .to_string()
}

fn statistics_line(view: &EventView<'_>) -> String {
    let tokens = view
        .positive_number("total_tokens_estimated")
        .or_else(|| view.positive_number("total_tokens"));
    let cost = view
        .field("estimated_cost")
        .or_else(|| view.field("total_cost"))
        .and_then(number_of);
    match (tokens, cost) {
        (Some(tokens), Some(cost)) => {
            format!("Statistics: ~{} tokens, estimated cost {cost}", tokens.trunc() as u64)
        }
        (Some(tokens), None) => format!("Statistics: ~{} tokens", tokens.trunc() as u64),
        (None, Some(cost)) => format!("Statistics: estimated cost {cost}"),
        (None, None) => "Statistics updated".to_string(),
    }
}

fn preview(text: Option<&str>, max_chars: usize) -> String {
    let Some(text) = text else {
        return "no content".to_string();
    };
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}
