//! Token and cost resolution over stored totals and workflow events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::history::{EventView, StoredTotals};

/// Cost charged per one million tokens when only a token count is known.
pub const DEFAULT_COST_PER_MILLION_TOKENS: f64 = 12.0;

/// Best-known token count and cost of one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageEstimate {
    pub tokens: u64,
    pub cost: f64,
}

/// Resolves a message's token count.
///
/// Falls back from a positive stored total to the first statistics event's
/// estimated then reported tokens, then a finished-workflow event's total,
/// then the stored value (or 0).
pub fn resolve_tokens(events: &[Value], stored: Option<u64>) -> u64 {
    if let Some(tokens) = stored.filter(|t| *t > 0) {
        return tokens;
    }
    let views: Vec<EventView<'_>> = events.iter().filter_map(EventView::parse).collect();
    let from_events = first_number(&views, "statistics", "total_tokens_estimated")
        .or_else(|| first_number(&views, "statistics", "total_tokens"))
        .or_else(|| first_number(&views, "workflow_finished", "total_tokens"));
    match from_events {
        Some(tokens) => tokens.trunc() as u64,
        None => stored.unwrap_or(0),
    }
}

/// Resolves a message's cost.
///
/// Falls back from a positive stored cost to a statistics event's estimated
/// then total cost, then a finished-workflow token total priced at
/// `cost_per_million` per million tokens, then zero.
pub fn resolve_cost(events: &[Value], stored: Option<f64>, cost_per_million: f64) -> f64 {
    if let Some(cost) = stored.filter(|c| c.is_finite() && *c > 0.0) {
        return cost;
    }
    let views: Vec<EventView<'_>> = events.iter().filter_map(EventView::parse).collect();
    if let Some(cost) = first_number(&views, "statistics", "estimated_cost")
        .or_else(|| first_number(&views, "statistics", "total_cost"))
    {
        return cost;
    }
    if let Some(tokens) = first_number(&views, "workflow_finished", "total_tokens") {
        return tokens / 1_000_000.0 * cost_per_million;
    }
    0.0
}

/// Both resolutions at once.
pub fn resolve_usage(events: &[Value], stored: StoredTotals, cost_per_million: f64) -> UsageEstimate {
    UsageEstimate {
        tokens: resolve_tokens(events, stored.tokens),
        cost: resolve_cost(events, stored.cost, cost_per_million),
    }
}

/// The field from the first event of `kind` that carries it as a positive
/// number.
fn first_number(views: &[EventView<'_>], kind: &str, field: &str) -> Option<f64> {
    views
        .iter()
        .filter(|view| view.kind() == kind)
        .find_map(|view| view.positive_number(field))
}
