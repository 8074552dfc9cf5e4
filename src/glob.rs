//! Glob pattern matching for executable paths and command-line arguments.
//!
//! Supported wildcards:
//! - `*` matches any sequence of characters, including the empty one. It is not
//!   scoped to a path segment: `/usr/*` matches `/usr/local/bin/node`.
//! - `?` matches exactly one character.
//!
//! Matching is anchored at both ends and compares Unicode scalar values.

/// Check if `text` matches `pattern` as a whole.
///
/// Single pass with one remembered star: on a mismatch the most recent `*` absorbs one more
/// character and matching resumes after it. Worst case is O(pattern * text).
pub fn matches(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    // (pattern index after the last `*`, text index that star currently extends to)
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        match p.get(pi) {
            Some('*') => {
                pi += 1;
                star = Some((pi, ti));
            }
            Some('?') => {
                pi += 1;
                ti += 1;
            }
            Some(c) if *c == t[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    pi = sp;
                    ti = st + 1;
                    star = Some((sp, ti));
                }
                None => return false,
            },
        }
    }
    // Text consumed: only stars may remain.
    p[pi..].iter().all(|c| *c == '*')
}

/// True if any pattern matches `text`. No patterns means no match.
pub fn matches_any(text: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| matches(p, text))
}

/// True if any of `texts` matches any of `patterns`.
pub fn any_matches_any(texts: &[String], patterns: &[String]) -> bool {
    texts.iter().any(|t| matches_any(t, patterns))
}
