//! Tolerant decoder for the chunked event stream of a conversational-agent
//! backend.
//!
//! Chunks are split into frames, JSON is recovered from each frame on a
//! best-effort basis, and every recovered value (or bare text) is classified
//! into a [`StreamEvent`] delivered to an [`EventSink`].
//!
//! ```
//! use chatflow_stream::prelude::*;
//!
//! let mut session = StreamSession::new(Vec::new());
//! session.handle_chunk("data: {\"event\":\"message\",\"answer\":\"Hi\"}\n\ndata: [DONE]\n\n");
//! let events = session.into_sink();
//! assert_eq!(
//!     events,
//!     vec![
//!         StreamEvent::Content {
//!             text: "Hi".into(),
//!             raw: Some(serde_json::json!({"event": "message", "answer": "Hi"})),
//!         },
//!         StreamEvent::Complete,
//!     ]
//! );
//! ```

/// Event classification of recovered values and bare frames.
pub mod classify;
/// Decoder configuration and environment helpers.
pub mod config;
/// Failure and diagnostic types.
pub mod errors;
/// Typed output events.
pub mod event;
/// Frame splitting.
pub mod frame;
/// Logging initialization.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Byte-chunk reassembly for transports.
pub mod reassemble;
/// JSON recovery from noisy frames.
pub mod recover;
/// Per-stream session and sinks.
pub mod session;
/// Async adapter over transport byte streams.
pub mod transport;

pub use classify::{Classification, Classifier, ContentFilter, EventKind};
pub use config::{DecoderConfig, RecoveryLimits};
pub use errors::{ConfigError, DecodeIssue, StreamFailure};
pub use event::{StreamEvent, ToolInvocation, WorkflowEvent, WorkflowKind};
pub use frame::{Frame, split_frames};
pub use reassemble::ChunkReassembler;
pub use recover::recover_json;
pub use session::{Callbacks, EventSink, SessionStats, StreamSession};
pub use transport::decode_stream;
