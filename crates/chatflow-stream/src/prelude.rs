//! Common imports for decoding a stream.
pub use crate::{
    Callbacks, DecoderConfig, EventSink, StreamEvent, StreamFailure, StreamSession,
    ToolInvocation, WorkflowEvent, WorkflowKind,
};
