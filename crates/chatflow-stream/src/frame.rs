//! Frame splitting for the blank-line delimited stream format.

/// One delimited unit of a chunk, trimmed and never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Frame that carried a `data:` prefix; holds the text after it.
    Data(&'a str),
    /// Frame without the prefix (upstream deviations send these).
    Bare(&'a str),
}

impl<'a> Frame<'a> {
    /// Payload text with any `data:` marker already removed.
    pub fn payload(&self) -> &'a str {
        match self {
            Frame::Data(text) | Frame::Bare(text) => text,
        }
    }
}

/// Splits a chunk into frames on blank lines.
///
/// `\r\n\r\n` delimiters are accepted as well as `\n\n`.
pub fn split_frames(chunk: &str) -> Vec<Frame<'_>> {
    let mut frames = Vec::new();
    let mut rest = chunk;
    while !rest.is_empty() {
        let (head, tail) = match find_delimiter(rest) {
            Some((idx, len)) => (&rest[..idx], &rest[idx + len..]),
            None => (rest, ""),
        };
        if let Some(frame) = to_frame(head) {
            frames.push(frame);
        }
        rest = tail;
    }
    frames
}

fn find_delimiter(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'\n' && bytes[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if i + 3 < bytes.len()
            && bytes[i] == b'\r'
            && bytes[i + 1] == b'\n'
            && bytes[i + 2] == b'\r'
            && bytes[i + 3] == b'\n'
        {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

fn to_frame(raw: &str) -> Option<Frame<'_>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let payload = rest.trim();
            (!payload.is_empty()).then_some(Frame::Data(payload))
        }
        None => Some(Frame::Bare(trimmed)),
    }
}

/// Byte offset just past the last frame delimiter, if any.
pub(crate) fn last_delimiter_end(bytes: &[u8]) -> Option<usize> {
    let mut i = bytes.len();
    while i >= 2 {
        if bytes[i - 2] == b'\n' && bytes[i - 1] == b'\n' {
            return Some(i);
        }
        if i >= 4 && &bytes[i - 4..i] == b"\r\n\r\n" {
            return Some(i);
        }
        i -= 1;
    }
    None
}

/// Splits a chunk at the first termination marker.
///
/// Returns the text before the marker and whether a marker was present.
pub fn split_at_marker<'a>(chunk: &'a str, marker: &str) -> (&'a str, bool) {
    match chunk.find(marker) {
        Some(idx) => (&chunk[..idx], true),
        None => (chunk, false),
    }
}

/// True when the text has at least one printable character.
///
/// Printable means ASCII 0x20..=0x7E or anything outside ASCII.
pub fn has_visible_characters(text: &str) -> bool {
    text.chars().any(|c| (' '..='~').contains(&c) || !c.is_ascii())
}
