//! Persisted message rows and the workflow-event shapes stored with them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::lenient;

/// Message identifier as stored: numeric or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageKey {
    Number(i64),
    Text(String),
}

/// One history row as the backend stores it.
///
/// Every field is optional and decoded leniently: numeric columns accept
/// numbers or numeric strings, and a non-array `workflow_events` is treated as
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedMessage {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_key"
    )]
    pub id: Option<MessageKey>,
    /// `"user"` or anything else (agent). Non-string roles decode as `None`.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub thought_content: Option<String>,
    #[serde(default, deserialize_with = "lenient::value_list")]
    pub workflow_events: Vec<Value>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub total_tokens_estimated: Option<u64>,
    #[serde(default, alias = "totalTokens", deserialize_with = "lenient::opt_u64")]
    pub total_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub cost: Option<f64>,
    #[serde(default, alias = "deductCost", deserialize_with = "lenient::opt_f64")]
    pub deduct_cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::value_list")]
    pub files: Vec<Value>,
}

/// Totals already stored with a message. Either may be missing or zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredTotals {
    pub tokens: Option<u64>,
    pub cost: Option<f64>,
}

impl StoredTotals {
    /// Estimated tokens before reported tokens, stored cost before deducted
    /// cost. The first positive value wins.
    pub fn from_message(message: &PersistedMessage) -> Self {
        let tokens = [message.total_tokens_estimated, message.total_tokens]
            .into_iter()
            .flatten()
            .find(|t| *t > 0)
            .or(message.total_tokens_estimated)
            .or(message.total_tokens);
        let cost = [message.cost, message.deduct_cost]
            .into_iter()
            .flatten()
            .find(|c| *c > 0.0)
            .or(message.cost)
            .or(message.deduct_cost);
        Self { tokens, cost }
    }
}

/// Extracts history rows from the response envelopes the store returns: a
/// bare array, `{data: [...]}`, `{data: {rows: [...]}}` or `{rows: [...]}`.
///
/// Null or undecodable rows are kept as `None` so positions stay stable.
pub fn parse_history_payload(payload: &Value) -> Vec<Option<PersistedMessage>> {
    let Some(rows) = history_rows(payload) else {
        debug!("history payload has no recognizable rows");
        return Vec::new();
    };
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            if row.is_null() {
                return None;
            }
            serde_json::from_value::<PersistedMessage>(row.clone())
                .map_err(|e| debug!(index, error = %e, "undecodable history row"))
                .ok()
        })
        .collect()
}

fn history_rows(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(rows) => Some(rows),
        Value::Object(obj) => match obj.get("data") {
            Some(Value::Array(rows)) => Some(rows),
            Some(Value::Object(data)) => data.get("rows").and_then(Value::as_array),
            _ => obj.get("rows").and_then(Value::as_array),
        },
        _ => None,
    }
}

/// Read-only view over one stored workflow event.
///
/// Accepts the flat persisted shape `{event, data, message, toolInfo?}`, raw
/// upstream events `{event, ...fields}`, and the display-wrapped shape
/// `{type, data: {event, ...}}`.
#[derive(Debug, Clone, Copy)]
pub struct EventView<'a> {
    kind: &'a str,
    body: &'a Map<String, Value>,
}

impl<'a> EventView<'a> {
    pub fn parse(value: &'a Value) -> Option<Self> {
        let obj = value.as_object()?;
        if let Some(kind) = obj.get("event").and_then(Value::as_str) {
            return Some(Self { kind, body: obj });
        }
        let data = obj.get("data").and_then(Value::as_object);
        if let Some(data) = data
            && let Some(kind) = data.get("event").and_then(Value::as_str)
        {
            return Some(Self { kind, body: data });
        }
        let kind = obj.get("type").and_then(Value::as_str)?;
        Some(Self {
            kind,
            body: data.unwrap_or(obj),
        })
    }

    pub fn kind(&self) -> &'a str {
        self.kind
    }

    /// First non-null `name` in the event body, its `data`, or `data.data`.
    pub fn field(&self, name: &str) -> Option<&'a Value> {
        let mut current = Some(self.body);
        for _ in 0..3 {
            let obj = current?;
            if let Some(value) = obj.get(name).filter(|v| !v.is_null()) {
                return Some(value);
            }
            current = obj.get("data").and_then(Value::as_object);
        }
        None
    }

    /// Non-blank string field.
    pub fn str_field(&self, name: &str) -> Option<&'a str> {
        self.field(name)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Positive number (or numeric string) field.
    pub fn positive_number(&self, name: &str) -> Option<f64> {
        self.field(name)
            .and_then(lenient::number_of)
            .filter(|n| *n > 0.0)
    }
}
