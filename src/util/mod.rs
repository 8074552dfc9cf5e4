#![allow(clippy::module_name_repetitions)]
//! Small utilities: comma-list splitting, boolean parsing, whitespace trimming.

pub mod fs;

/// Whitespace recognized around configuration keys, values and list items.
const TRIM_CHARS: [char; 4] = [' ', '\t', '\r', '\n'];

/// Trim spaces, tabs, CR and LF on both ends.
pub fn trim_ws(s: &str) -> &str {
    s.trim_matches(&TRIM_CHARS[..])
}

/// Split a comma-separated value into trimmed, non-empty items (order and duplicates kept).
pub fn split_comma_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(trim_ws)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a boolean flag: `true`, `t` and `1` (case-insensitive) are truthy, everything else is not.
pub fn parse_bool(s: &str) -> bool {
    let v = trim_ws(s);
    v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("t") || v == "1"
}
