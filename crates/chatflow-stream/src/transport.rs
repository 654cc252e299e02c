use std::collections::VecDeque;

use futures::StreamExt as _;
use futures::stream;

use crate::config::DecoderConfig;
use crate::event::StreamEvent;
use crate::reassemble::ChunkReassembler;
use crate::session::StreamSession;

/// Decodes a stream of transport byte chunks into typed events.
///
/// Each chunk is reassembled at frame boundaries, decoded to completion, and
/// its events yielded in order before the next chunk is polled. When the
/// transport ends, any buffered tail is decoded and `Complete` is yielded
/// unless the stream already completed. Transport errors are passed through
/// and end the stream.
pub fn decode_stream<St, E>(
    chunks: St,
    config: DecoderConfig,
) -> impl futures::Stream<Item = Result<StreamEvent, E>>
where
    St: futures::Stream<Item = Result<bytes::Bytes, E>> + Unpin,
{
    struct State<St> {
        chunks: St,
        reassembler: ChunkReassembler,
        session: StreamSession<Vec<StreamEvent>>,
        pending: VecDeque<StreamEvent>,
        done: bool,
    }

    let reassembler = ChunkReassembler::new(config.max_pending_bytes);
    stream::try_unfold(
        State {
            chunks,
            reassembler,
            session: StreamSession::with_config(config, Vec::new()),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.chunks.next().await {
                    Some(Ok(chunk)) => {
                        if let Some(text) = state.reassembler.push_chunk(&chunk) {
                            state.session.handle_chunk(&text);
                        }
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        if let Some(text) = state.reassembler.finish() {
                            state.session.handle_chunk(&text);
                        }
                        state.session.complete();
                        state.done = true;
                    }
                }
                state.pending.extend(state.session.sink_mut().drain(..));
            }
        },
    )
}
