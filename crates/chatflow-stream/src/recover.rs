//! Best-effort recovery of JSON objects from frames that are not a single
//! clean JSON document.

use serde_json::Value;

use crate::config::RecoveryLimits;

/// Outcome of recovering JSON from one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recovered {
    /// Recovered values in left-to-right order.
    pub values: Vec<Value>,
    /// Candidates that were found but dropped (parse failure or bound hit).
    pub failures: usize,
    /// True when the frame parsed directly without scanning.
    pub direct: bool,
}

/// Recovers zero or more JSON values from `text`.
pub fn recover_json(text: &str, limits: &RecoveryLimits) -> Vec<Value> {
    recover(text, limits).values
}

/// Recovers JSON from `text`: a direct parse first, then a brace-depth scan
/// whose balanced `{...}` candidates are parsed independently.
pub fn recover(text: &str, limits: &RecoveryLimits) -> Recovered {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Recovered {
            values: vec![value],
            failures: 0,
            direct: true,
        };
    }
    if !trimmed.contains('{') {
        return Recovered::default();
    }
    if trimmed.len() > limits.max_scan_bytes {
        return Recovered {
            values: Vec::new(),
            failures: 1,
            direct: false,
        };
    }
    scan_balanced(trimmed, limits)
}

fn scan_balanced(text: &str, limits: &RecoveryLimits) -> Recovered {
    let mut out = Recovered::default();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    let mut too_deep = false;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                    too_deep = false;
                }
                depth += 1;
                if depth > limits.max_depth {
                    too_deep = true;
                }
            }
            '}' => {
                if depth == 0 {
                    continue;
                }
                depth -= 1;
                if depth > 0 {
                    continue;
                }
                let Some(begin) = start.take() else {
                    continue;
                };
                if too_deep {
                    out.failures += 1;
                    continue;
                }
                match serde_json::from_str::<Value>(&text[begin..=idx]) {
                    Ok(value) => out.values.push(value),
                    Err(_) => out.failures += 1,
                }
            }
            _ => {}
        }
    }
    if start.is_some() {
        // Unclosed trailing candidate.
        out.failures += 1;
    }
    out
}
