//! Normalization of persisted agent messages for display.
//!
//! History rows carry free-form workflow events next to their content. The
//! [`Normalizer`] resolves token and cost figures through a chain of
//! fallbacks, collapses repeated tool calls, and summarizes each event.
//!
//! ```
//! use chatflow_messages::{Normalizer, parse_history_payload};
//!
//! let payload = serde_json::json!({"data": [{
//!     "role": "agent",
//!     "content": "Done.",
//!     "workflow_events": [{"event": "workflow_finished", "data": {"total_tokens": 1000000}}]
//! }]});
//! let messages = Normalizer::default().normalize_all(&parse_history_payload(&payload));
//! assert_eq!(messages[0].usage.tokens, 1_000_000);
//! assert_eq!(messages[0].usage.cost, 12.0);
//! ```

pub mod config;
pub mod history;
pub mod lenient;
pub mod normalize;
pub mod recorder;
pub mod summary;
pub mod tools;
pub mod usage;

pub use config::NormalizerConfig;
pub use history::{EventView, MessageKey, PersistedMessage, StoredTotals, parse_history_payload};
pub use normalize::{EventFold, NormalizedMessage, Normalizer, Placement, Role, format_timestamp};
pub use recorder::MessageRecorder;
pub use summary::{WorkflowEventSummary, summarize_event};
pub use tools::{dedup_tool_invocations, tool_invocation_from_event};
pub use usage::{
    DEFAULT_COST_PER_MILLION_TOKENS, UsageEstimate, resolve_cost, resolve_tokens, resolve_usage,
};
