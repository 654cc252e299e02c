use serde_json::Value;
use tracing::{debug, warn};

use crate::classify::{Classification, Classifier, Ignored};
use crate::config::DecoderConfig;
use crate::errors::{DecodeIssue, StreamFailure};
use crate::event::{StreamEvent, WorkflowEvent};
use crate::frame::{Frame, split_at_marker, split_frames};
use crate::recover::recover;

/// Receiver for decoded events: the four registration points of a session.
pub trait EventSink {
    /// Incremental text, with the JSON envelope it came from when there was one.
    fn on_content(&mut self, text: String, raw: Option<Value>);
    /// Workflow lifecycle, statistics, or tool-thought event.
    fn on_workflow(&mut self, event: WorkflowEvent);
    /// End of stream; called at most once per session.
    fn on_complete(&mut self);
    /// Upstream-reported failure. The session keeps decoding afterwards.
    fn on_error(&mut self, error: StreamFailure);
}

impl EventSink for Vec<StreamEvent> {
    fn on_content(&mut self, text: String, raw: Option<Value>) {
        self.push(StreamEvent::Content { text, raw });
    }

    fn on_workflow(&mut self, event: WorkflowEvent) {
        self.push(StreamEvent::Workflow(event));
    }

    fn on_complete(&mut self) {
        self.push(StreamEvent::Complete);
    }

    fn on_error(&mut self, error: StreamFailure) {
        self.push(StreamEvent::Error { error });
    }
}

type ContentFn<'a> = Box<dyn FnMut(String, Option<Value>) + Send + 'a>;
type WorkflowFn<'a> = Box<dyn FnMut(WorkflowEvent) + Send + 'a>;
type CompleteFn<'a> = Box<dyn FnMut() + Send + 'a>;
type ErrorFn<'a> = Box<dyn FnMut(StreamFailure) + Send + 'a>;

/// Closure-based sink. Each callback is optional; unregistered events are
/// dropped.
#[derive(Default)]
pub struct Callbacks<'a> {
    content: Option<ContentFn<'a>>,
    workflow: Option<WorkflowFn<'a>>,
    complete: Option<CompleteFn<'a>>,
    error: Option<ErrorFn<'a>>,
}

impl<'a> Callbacks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_content(mut self, f: impl FnMut(String, Option<Value>) + Send + 'a) -> Self {
        self.content = Some(Box::new(f));
        self
    }

    pub fn on_workflow(mut self, f: impl FnMut(WorkflowEvent) + Send + 'a) -> Self {
        self.workflow = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnMut() + Send + 'a) -> Self {
        self.complete = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(StreamFailure) + Send + 'a) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

impl EventSink for Callbacks<'_> {
    fn on_content(&mut self, text: String, raw: Option<Value>) {
        if let Some(f) = self.content.as_mut() {
            f(text, raw);
        }
    }

    fn on_workflow(&mut self, event: WorkflowEvent) {
        if let Some(f) = self.workflow.as_mut() {
            f(event);
        }
    }

    fn on_complete(&mut self) {
        if let Some(f) = self.complete.as_mut() {
            f();
        }
    }

    fn on_error(&mut self, error: StreamFailure) {
        if let Some(f) = self.error.as_mut() {
            f(error);
        }
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub chunks: u64,
    pub frames: u64,
    /// Events delivered to the sink, completion included.
    pub events: u64,
    /// Objects recovered by brace scanning rather than a direct parse.
    pub recovered: u64,
    /// Fragments dropped because they did not parse.
    pub parse_failures: u64,
    /// Frames with no recoverable JSON that still looked structured.
    pub salvaged: u64,
    pub ignored: u64,
}

/// Decoder state for one response stream.
///
/// Owns its sink and the completion latch. One session per stream; feed it
/// chunks in arrival order with [`StreamSession::handle_chunk`] and call
/// [`StreamSession::complete`] when the transport is exhausted.
pub struct StreamSession<S: EventSink> {
    id: uuid::Uuid,
    config: DecoderConfig,
    classifier: Classifier,
    sink: S,
    finished: bool,
    stats: SessionStats,
}

impl<S: EventSink> StreamSession<S> {
    pub fn new(sink: S) -> Self {
        Self::with_config(DecoderConfig::default(), sink)
    }

    pub fn with_config(config: DecoderConfig, sink: S) -> Self {
        let id = uuid::Uuid::new_v4();
        debug!(session_id = %id, marker = %config.termination_marker, "stream session opened");
        Self {
            id,
            classifier: Classifier::from_config(&config),
            config,
            sink,
            finished: false,
            stats: SessionStats::default(),
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// True once the completion latch has fired.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Decodes one transport chunk and delivers its events in frame order.
    ///
    /// Text after the termination marker is discarded and completion fires.
    /// Chunks arriving after completion are still decoded; only the
    /// completion signal is latched.
    pub fn handle_chunk(&mut self, chunk: &str) {
        self.stats.chunks += 1;
        let (before, terminated) = split_at_marker(chunk, &self.config.termination_marker);
        for frame in split_frames(before) {
            self.handle_frame(frame);
        }
        if terminated {
            debug!(session_id = %self.id, "termination marker received");
            self.complete();
        }
    }

    /// Fires the completion latch. Idempotent.
    pub fn complete(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.stats.events += 1;
        debug!(
            session_id = %self.id,
            chunks = self.stats.chunks,
            frames = self.stats.frames,
            events = self.stats.events,
            parse_failures = self.stats.parse_failures,
            "stream session completed"
        );
        self.sink.on_complete();
    }

    fn handle_frame(&mut self, frame: Frame<'_>) {
        self.stats.frames += 1;
        let payload = frame.payload();
        let recovered = recover(payload, &self.config.recovery);
        if recovered.failures > 0 {
            self.stats.parse_failures += recovered.failures as u64;
            let issue = DecodeIssue::RecoverableParse {
                detail: format!("{} fragment(s) dropped", recovered.failures),
            };
            debug!(session_id = %self.id, %issue, "skipping unparseable fragments");
        }
        if recovered.values.is_empty() {
            if payload.contains('{') {
                self.stats.salvaged += 1;
                let issue = DecodeIssue::Salvaged {
                    detail: truncate(payload, 120),
                };
                debug!(session_id = %self.id, %issue, "no JSON recovered from frame");
            }
            let classification = self.classifier.classify_text(payload);
            self.dispatch(classification);
            return;
        }
        if !recovered.direct {
            self.stats.recovered += recovered.values.len() as u64;
        }
        for value in &recovered.values {
            let classification = self.classifier.classify_value(value, payload);
            self.dispatch(classification);
        }
    }

    fn dispatch(&mut self, classification: Classification) {
        match classification {
            Classification::Content { text, raw } => {
                self.stats.events += 1;
                self.sink.on_content(text, raw);
            }
            Classification::Workflow(event) => {
                self.stats.events += 1;
                self.sink.on_workflow(event);
            }
            Classification::EndOfMessage(event) => {
                self.stats.events += 1;
                self.sink.on_workflow(event);
                self.complete();
            }
            Classification::Error(error) => {
                warn!(session_id = %self.id, %error, "upstream reported an error");
                self.stats.events += 1;
                self.sink.on_error(error);
            }
            Classification::Ignored(reason) => {
                self.stats.ignored += 1;
                if let Ignored::Unrecognized(kind) = &reason {
                    debug!(session_id = %self.id, kind = %kind, "dropping unrecognized event");
                }
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
