use chatflow_stream::ToolInvocation;
use serde_json::Value;

use crate::history::EventView;
use crate::lenient::text_of;

/// Tool call carried by an `agent_thought` event, from its `toolInfo` (top
/// level or under `data`) or the raw `tool`/`tool_input`/`observation` fields.
///
/// Events without a tool name yield `None`.
pub fn tool_invocation_from_event(view: &EventView<'_>) -> Option<ToolInvocation> {
    if view.kind() != "agent_thought" {
        return None;
    }
    let tool = match view.field("toolInfo").and_then(Value::as_object) {
        Some(info) => ToolInvocation::new(
            info.get("name").and_then(text_of).unwrap_or_default(),
            info.get("input").and_then(text_of).unwrap_or_default(),
            info.get("observation").and_then(text_of).unwrap_or_default(),
        ),
        None => ToolInvocation::new(
            view.str_field("tool").unwrap_or_default(),
            view.field("tool_input").and_then(text_of).unwrap_or_default(),
            view.field("observation").and_then(text_of).unwrap_or_default(),
        ),
    };
    if tool.name.trim().is_empty() {
        return None;
    }
    Some(tool)
}

/// Distinct tool calls in first-seen order.
///
/// Two calls are the same when the names match and the inputs are
/// structurally equal JSON. A later duplicate fills in the observation when
/// the first occurrence had none.
pub fn dedup_tool_invocations(events: &[Value]) -> Vec<ToolInvocation> {
    let mut seen: Vec<ToolInvocation> = Vec::new();
    for tool in events
        .iter()
        .filter_map(EventView::parse)
        .filter_map(|view| tool_invocation_from_event(&view))
    {
        match seen.iter_mut().find(|known| known.same_call(&tool)) {
            Some(known) => {
                if known.observation.trim().is_empty() && !tool.observation.trim().is_empty() {
                    known.observation = tool.observation;
                }
            }
            None => seen.push(tool),
        }
    }
    seen
}
