use chrono::{DateTime, FixedOffset, NaiveDateTime};
use chatflow_stream::ToolInvocation;
use serde::Serialize;
use serde_json::Value;

use crate::config::NormalizerConfig;
use crate::history::{MessageKey, PersistedMessage, StoredTotals};
use crate::summary::WorkflowEventSummary;
use crate::tools::dedup_tool_invocations;
use crate::usage::{UsageEstimate, resolve_usage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// Which side of the conversation a message is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Start,
    End,
}

/// Display-ready form of one history message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedMessage {
    pub key: MessageKey,
    pub role: Role,
    pub placement: Placement,
    pub is_markdown: bool,
    pub avatar: String,
    pub content: String,
    pub reasoning: String,
    pub tool_invocations: Vec<ToolInvocation>,
    pub workflow_events: Vec<WorkflowEventSummary>,
    /// Stored events exactly as loaded.
    pub raw_workflow_events: Vec<Value>,
    pub usage: UsageEstimate,
    pub files: Vec<Value>,
    /// `HH:MM:SS` in the configured offset, the raw text when it does not
    /// parse, or empty.
    pub timestamp: String,
}

/// Tools, summaries and usage derived from a message's stored events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventFold {
    pub tool_invocations: Vec<ToolInvocation>,
    pub summaries: Vec<WorkflowEventSummary>,
    pub usage: UsageEstimate,
}

/// Turns persisted history into display-ready messages.
///
/// Holds only configuration, so one normalizer can be shared freely and gives
/// the same output for the same input.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalizes one message. `index` is its position in the history and
    /// becomes the key when the message has no id.
    pub fn normalize(&self, message: &PersistedMessage, index: usize) -> NormalizedMessage {
        let role = match message.role.as_deref() {
            Some("user") => Role::User,
            _ => Role::Agent,
        };
        let fold = self.fold_events(&message.workflow_events, StoredTotals::from_message(message));
        NormalizedMessage {
            key: message.id.clone().unwrap_or_else(|| index_key(index)),
            placement: match role {
                Role::User => Placement::End,
                Role::Agent => Placement::Start,
            },
            is_markdown: role == Role::Agent,
            avatar: self.avatar(role).to_string(),
            role,
            content: message.content.clone().unwrap_or_default(),
            reasoning: message.thought_content.clone().unwrap_or_default(),
            tool_invocations: fold.tool_invocations,
            workflow_events: fold.summaries,
            raw_workflow_events: message.workflow_events.clone(),
            usage: fold.usage,
            files: message.files.clone(),
            timestamp: message
                .created_at
                .as_deref()
                .map(|raw| format_timestamp(raw, self.config.utc_offset))
                .unwrap_or_default(),
        }
    }

    /// Normalizes a whole history. Missing or undecodable rows become empty
    /// agent placeholders so every position still renders.
    pub fn normalize_all(&self, history: &[Option<PersistedMessage>]) -> Vec<NormalizedMessage> {
        history
            .iter()
            .enumerate()
            .map(|(index, entry)| match entry {
                Some(message) => self.normalize(message, index),
                None => self.placeholder(index),
            })
            .collect()
    }

    pub fn fold_events(&self, events: &[Value], stored: StoredTotals) -> EventFold {
        EventFold {
            tool_invocations: dedup_tool_invocations(events),
            summaries: events
                .iter()
                .map(|event| WorkflowEventSummary::new(event, self.config.preview_chars))
                .collect(),
            usage: resolve_usage(events, stored, self.config.cost_per_million_tokens),
        }
    }

    fn placeholder(&self, index: usize) -> NormalizedMessage {
        NormalizedMessage {
            key: index_key(index),
            role: Role::Agent,
            placement: Placement::Start,
            is_markdown: false,
            avatar: self.config.agent_avatar.clone(),
            content: String::new(),
            reasoning: String::new(),
            tool_invocations: Vec::new(),
            workflow_events: Vec::new(),
            raw_workflow_events: Vec::new(),
            usage: UsageEstimate::default(),
            files: Vec::new(),
            timestamp: String::new(),
        }
    }

    fn avatar(&self, role: Role) -> &str {
        match role {
            Role::User => &self.config.user_avatar,
            Role::Agent => &self.config.agent_avatar,
        }
    }
}

fn index_key(index: usize) -> MessageKey {
    i64::try_from(index)
        .map(MessageKey::Number)
        .unwrap_or_else(|_| MessageKey::Text(index.to_string()))
}

/// Formats a stored timestamp as `HH:MM:SS` in `offset`.
///
/// RFC 3339 timestamps keep their own offset; naive ones are taken as UTC.
/// Text that does not parse is returned unchanged.
pub fn format_timestamp(raw: &str, offset: FixedOffset) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return parsed.with_timezone(&offset).format("%H:%M:%S").to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return naive
                .and_utc()
                .with_timezone(&offset)
                .format("%H:%M:%S")
                .to_string();
        }
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_AGENT_AVATAR, DEFAULT_USER_AVATAR};
    use crate::history::parse_history_payload;
    use serde_json::json;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).expect("utc")
    }

    #[test]
    fn user_and_agent_display_fields() {
        let normalizer = Normalizer::default();
        let user = normalizer.normalize(
            &PersistedMessage {
                role: Some("user".into()),
                content: Some("hi".into()),
                ..Default::default()
            },
            0,
        );
        assert_eq!(user.role, Role::User);
        assert_eq!(user.placement, Placement::End);
        assert!(!user.is_markdown);
        assert_eq!(user.avatar, DEFAULT_USER_AVATAR);
        assert_eq!(user.key, MessageKey::Number(0));

        let agent = normalizer.normalize(
            &PersistedMessage {
                id: Some(MessageKey::Number(17)),
                role: Some("assistant".into()),
                thought_content: Some("pondering".into()),
                ..Default::default()
            },
            3,
        );
        assert_eq!(agent.role, Role::Agent);
        assert_eq!(agent.placement, Placement::Start);
        assert!(agent.is_markdown);
        assert_eq!(agent.avatar, DEFAULT_AGENT_AVATAR);
        assert_eq!(agent.key, MessageKey::Number(17));
        assert_eq!(agent.reasoning, "pondering");
        assert_eq!(agent.content, "");
    }

    #[test]
    fn history_with_events_folds_usage_tools_and_summaries() {
        let payload = json!({"data": [
            null,
            {
                "id": 9,
                "role": "agent",
                "content": "Done.",
                "total_tokens": 0,
                "cost": 0,
                "created_at": "2024-05-01 10:15:30",
                "workflow_events": [
                    {"event": "agent_thought", "toolInfo": {"name": "search", "input": "{\"q\":1}", "observation": ""}},
                    {"event": "agent_thought", "toolInfo": {"name": "search", "input": "{\"q\": 1}", "observation": "found"}},
                    {"event": "statistics", "data": {"total_tokens_estimated": "150"}},
                    {"event": "workflow_finished", "data": {"total_tokens": 1000000}}
                ]
            }
        ]});
        let history = parse_history_payload(&payload);
        let messages = Normalizer::default().normalize_all(&history);
        assert_eq!(messages.len(), 2);

        let placeholder = &messages[0];
        assert_eq!(placeholder.role, Role::Agent);
        assert!(!placeholder.is_markdown);
        assert_eq!(placeholder.key, MessageKey::Number(0));

        let message = &messages[1];
        assert_eq!(message.usage.tokens, 150);
        assert_eq!(message.usage.cost, 12.0);
        assert_eq!(
            message.tool_invocations,
            vec![ToolInvocation::new("search", "{\"q\":1}", "found")]
        );
        assert_eq!(message.workflow_events.len(), 4);
        assert_eq!(message.workflow_events[3].message, "Workflow finished: succeeded");
        assert_eq!(message.raw_workflow_events.len(), 4);
        assert_eq!(message.timestamp, "10:15:30");
    }

    #[test]
    fn loose_id_and_role_fall_back_to_index_and_agent() {
        let history = parse_history_payload(&json!([
            {"id": 1.0, "role": "user", "content": "hi"},
            {"id": null, "role": 7, "content": "there"}
        ]));
        let messages = Normalizer::default().normalize_all(&history);
        assert_eq!(messages[0].key, MessageKey::Number(1));
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].key, MessageKey::Number(1));
        assert_eq!(messages[1].role, Role::Agent);
        assert!(messages[1].is_markdown);
        assert_eq!(messages[1].content, "there");
    }

    #[test]
    fn normalization_is_idempotent() {
        let message = PersistedMessage {
            role: Some("agent".into()),
            workflow_events: vec![json!({"event": "workflow_finished", "total_tokens": 10})],
            created_at: Some("2024-05-01T10:00:00Z".into()),
            ..Default::default()
        };
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.normalize(&message, 1), normalizer.normalize(&message, 1));
    }

    #[test]
    fn timestamps_follow_configured_offset() {
        let plus_eight = FixedOffset::east_opt(8 * 3600).expect("offset");
        assert_eq!(format_timestamp("2024-05-01T10:00:00Z", utc()), "10:00:00");
        assert_eq!(format_timestamp("2024-05-01T10:00:00Z", plus_eight), "18:00:00");
        assert_eq!(format_timestamp("2024-05-01T10:00:00+02:00", utc()), "08:00:00");
        assert_eq!(format_timestamp("2024-05-01T10:00:00.123456", utc()), "10:00:00");
        assert_eq!(format_timestamp("yesterday", utc()), "yesterday");
        assert_eq!(format_timestamp("  ", utc()), "");
    }

    #[test]
    fn configured_avatar_and_rate_are_used() {
        let config = NormalizerConfig {
            agent_avatar: "bot.png".into(),
            ..Default::default()
        }
        .cost_per_million_tokens(6.0);
        let normalizer = Normalizer::new(config);
        let message = PersistedMessage {
            workflow_events: vec![json!({"event": "workflow_finished", "total_tokens": 1000000})],
            ..Default::default()
        };
        let normalized = normalizer.normalize(&message, 0);
        assert_eq!(normalized.avatar, "bot.png");
        assert_eq!(normalized.usage.cost, 6.0);
    }
}
