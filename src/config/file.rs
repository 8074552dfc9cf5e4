//! Line-oriented `key=value` parser shared by the injector config file and the
//! "all agents" environment file.
//!
//! Invariants
//! - `#` starts a comment that runs to the end of the line; it is stripped before trimming.
//! - The key is everything before the first `=`, the value everything after it; both trimmed.
//! - Lines longer than [`MAX_LINE_LEN`] bytes are reported and dropped as a whole.
//! - Malformed lines never abort parsing; the next line is parsed normally.

use tracing::warn;

use crate::util::trim_ws;

/// Longest accepted line, in bytes, not counting the line terminator.
pub const MAX_LINE_LEN: usize = 8192;

/// One parsed `key=value` entry and the 1-based line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    pub line: usize,
}

/// Parse a config buffer; `source` names the file in diagnostics.
pub fn parse_lines(buf: &[u8], source: &str) -> Vec<KeyValue> {
    let mut out = Vec::new();
    for (idx, raw) in buf.split(|b| *b == b'\n').enumerate() {
        let line_no = idx + 1;
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.len() > MAX_LINE_LEN {
            warn!(
                "{source}:{line_no}: line exceeds {MAX_LINE_LEN} bytes ({} bytes), ignoring it",
                raw.len()
            );
            continue;
        }
        let line = match std::str::from_utf8(raw) {
            Ok(s) => s,
            Err(_) => {
                warn!("{source}:{line_no}: line is not valid UTF-8, ignoring it");
                continue;
            }
        };
        if let Some(kv) = parse_line(line, line_no, source) {
            out.push(kv);
        }
    }
    out
}

fn parse_line(line: &str, line_no: usize, source: &str) -> Option<KeyValue> {
    let uncommented = match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    };
    if trim_ws(uncommented).is_empty() {
        return None;
    }
    let Some((key, value)) = uncommented.split_once('=') else {
        warn!("{source}:{line_no}: cannot parse line, expected key=value, ignoring it");
        return None;
    };
    let key = trim_ws(key);
    if key.is_empty() {
        warn!("{source}:{line_no}: line has an empty key, ignoring it");
        return None;
    }
    Some(KeyValue {
        key: key.to_string(),
        value: trim_ws(value).to_string(),
        line: line_no,
    })
}
