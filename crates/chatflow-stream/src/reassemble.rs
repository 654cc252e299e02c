use crate::frame::last_delimiter_end;

/// Buffers raw transport bytes and releases text cut at frame boundaries.
///
/// Transports deliver bytes at arbitrary offsets, possibly in the middle of
/// a frame or a UTF-8 sequence. The session itself never buffers, so byte
/// transports run their chunks through this first.
#[derive(Debug)]
pub struct ChunkReassembler {
    buf: Vec<u8>,
    max_pending: usize,
}

impl Default for ChunkReassembler {
    fn default() -> Self {
        Self::new(1_048_576)
    }
}

impl ChunkReassembler {
    /// `max_pending` bounds how many bytes may wait for a delimiter before
    /// they are released anyway.
    pub fn new(max_pending: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_pending: max_pending.max(1),
        }
    }

    /// Appends a chunk and returns the text up to the last complete frame,
    /// if any.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Option<String> {
        self.buf.extend_from_slice(chunk);
        let cut = match last_delimiter_end(&self.buf) {
            Some(end) => end,
            None if self.buf.len() > self.max_pending => utf8_safe_len(&self.buf),
            None => return None,
        };
        if cut == 0 {
            return None;
        }
        let released: Vec<u8> = self.buf.drain(..cut).collect();
        Some(String::from_utf8_lossy(&released).into_owned())
    }

    /// Releases whatever is left once the transport is exhausted.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

/// Length of the prefix that does not end inside a UTF-8 sequence.
fn utf8_safe_len(buf: &[u8]) -> usize {
    match std::str::from_utf8(buf) {
        Ok(_) => buf.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => buf.len(),
    }
}
