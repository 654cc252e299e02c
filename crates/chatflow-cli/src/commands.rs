use std::io::{Read, Write};

use anyhow::{Context, Result};
use chatflow_messages::{MessageRecorder, Normalizer, parse_history_payload};
use chatflow_stream::{
    ChunkReassembler, DecoderConfig, EventSink, StreamEvent, StreamFailure, StreamSession,
    WorkflowEvent,
};
use serde_json::Value;
use tracing::{debug, info};

/// Collects events for printing and, when recording, feeds them to a
/// `MessageRecorder` as well.
struct DecodeSink {
    pending: Vec<StreamEvent>,
    recorder: Option<MessageRecorder>,
}

impl DecodeSink {
    fn push(&mut self, event: StreamEvent) {
        if let Some(recorder) = self.recorder.as_mut() {
            event.clone().deliver(recorder);
        }
        self.pending.push(event);
    }
}

impl EventSink for DecodeSink {
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

pub struct DecodeOptions {
    /// Re-chunk the input into slices of this many bytes.
    pub chunk_size: Option<usize>,
    /// Also print the normalized message assembled from the stream.
    pub record: bool,
}

/// Decodes a captured stream and writes one JSON line per event.
pub fn decode(
    mut input: impl Read,
    mut out: impl Write,
    config: DecoderConfig,
    normalizer: &Normalizer,
    options: &DecodeOptions,
) -> Result<()> {
    let mut bytes = Vec::new();
    input
        .read_to_end(&mut bytes)
        .context("failed to read stream input")?;

    let mut reassembler = ChunkReassembler::new(config.max_pending_bytes);
    let sink = DecodeSink {
        pending: Vec::new(),
        recorder: options.record.then(MessageRecorder::new),
    };
    let mut session = StreamSession::with_config(config, sink);
    info!(session_id = %session.id(), input_len = bytes.len(), "decoding stream");

    let chunk_size = options.chunk_size.unwrap_or(bytes.len()).max(1);
    for chunk in bytes.chunks(chunk_size) {
        if let Some(text) = reassembler.push_chunk(chunk) {
            session.handle_chunk(&text);
        }
        write_events(&mut out, &mut session.sink_mut().pending)?;
    }
    if let Some(text) = reassembler.finish() {
        session.handle_chunk(&text);
    }
    session.complete();
    write_events(&mut out, &mut session.sink_mut().pending)?;
    debug!(stats = ?session.stats(), "stream decoded");

    if let Some(recorder) = session.into_sink().recorder {
        let message = normalizer.normalize(&recorder.into_persisted(), 0);
        serde_json::to_writer_pretty(&mut out, &message)
            .context("failed to write recorded message")?;
        writeln!(out)?;
    }
    Ok(())
}

fn write_events(out: &mut impl Write, pending: &mut Vec<StreamEvent>) -> Result<()> {
    for event in pending.drain(..) {
        serde_json::to_writer(&mut *out, &event).context("failed to write event")?;
        writeln!(out)?;
    }
    Ok(())
}

/// Normalizes a stored history payload and writes it as pretty JSON.
pub fn normalize(mut input: impl Read, mut out: impl Write, normalizer: &Normalizer) -> Result<()> {
    let mut text = String::new();
    input
        .read_to_string(&mut text)
        .context("failed to read history input")?;
    let payload: Value = serde_json::from_str(&text).context("history is not valid JSON")?;
    let history = parse_history_payload(&payload);
    info!(rows = history.len(), "normalizing history");
    let messages = normalizer.normalize_all(&history);
    serde_json::to_writer_pretty(&mut out, &messages).context("failed to write messages")?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPTURE: &str = concat!(
        "data: {\"event\":\"message\",\"answer\":\"Hel\"}\n\n",
        "data: {\"event\":\"message\",\"answer\":\"lo\"}\n\n",
        "data: {\"event\":\"workflow_finished\",\"data\":{\"total_tokens\":1000000}}\n\n",
        "data: [DONE]\n\n",
    );

    fn run_decode(chunk_size: Option<usize>, record: bool) -> String {
        let mut out = Vec::new();
        decode(
            CAPTURE.as_bytes(),
            &mut out,
            DecoderConfig::default(),
            &Normalizer::default(),
            &DecodeOptions { chunk_size, record },
        )
        .expect("decode");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn small_chunks_decode_like_one_chunk() {
        assert_eq!(run_decode(Some(3), false), run_decode(None, false));
    }

    #[test]
    fn decode_prints_one_line_per_event() {
        let output = run_decode(Some(7), false);
        let events: Vec<StreamEvent> = output
            .lines()
            .map(|line| serde_json::from_str(line).expect("event line"))
            .collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], StreamEvent::Content { text, .. } if text == "Hel"));
        assert!(matches!(&events[1], StreamEvent::Content { text, .. } if text == "lo"));
        assert!(matches!(events[2], StreamEvent::Workflow(_)));
        assert_eq!(events[3], StreamEvent::Complete);
    }

    #[test]
    fn record_appends_normalized_message() {
        let output = run_decode(None, true);
        let start = output.find("{\n").expect("pretty message");
        let message: Value = serde_json::from_str(&output[start..]).expect("message json");
        assert_eq!(message["content"], "Hello");
        assert_eq!(message["role"], "agent");
        assert_eq!(message["usage"]["tokens"], 1_000_000);
        assert_eq!(message["usage"]["cost"], 12.0);
    }

    #[test]
    fn normalize_reads_history_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            "{}",
            serde_json::json!({"data": {"rows": [
                {"id": 1, "role": "user", "content": "hi"},
                null
            ]}})
        )
        .expect("write");
        let input = std::fs::File::open(file.path()).expect("open");
        let mut out = Vec::new();
        normalize(input, &mut out, &Normalizer::default()).expect("normalize");
        let messages: Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["placement"], "end");
        assert_eq!(messages[1]["role"], "agent");
        assert_eq!(messages[1]["content"], "");
    }

    #[test]
    fn normalize_rejects_invalid_json() {
        let mut out = Vec::new();
        let err = normalize("not json".as_bytes(), &mut out, &Normalizer::default())
            .expect_err("invalid");
        assert!(err.to_string().contains("not valid JSON"));
    }
}
