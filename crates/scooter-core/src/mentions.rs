//! # Mentions
//!
//! Extraction of `@handle` tokens from post and comment text.
//!
//! A mention is `@` followed by 3 to 20 handle characters (`a-z`, `0-9`,
//! `_`, case-insensitive), not preceded by a handle character (so `a@b.io`
//! is not a mention) and not followed by one (so an over-long run is
//! ignored rather than truncated).

use crate::primitives::{MAX_HANDLE_LEN, MIN_HANDLE_LEN};
use std::collections::BTreeSet;

fn is_handle_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Distinct lower-cased handles mentioned in `text`, in order of first
/// appearance.
#[must_use]
pub fn extract(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut seen = BTreeSet::new();
    let mut handles = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '@' || (i > 0 && is_handle_char(chars[i - 1])) {
            i += 1;
            continue;
        }

        let start = i + 1;
        let mut end = start;
        while end < chars.len() && is_handle_char(chars[end]) {
            end += 1;
        }

        let len = end - start;
        if (MIN_HANDLE_LEN..=MAX_HANDLE_LEN).contains(&len) {
            let handle: String = chars[start..end]
                .iter()
                .map(|c| c.to_ascii_lowercase())
                .collect();
            if seen.insert(handle.clone()) {
                handles.push(handle);
            }
        }
        i = end.max(i + 1);
    }

    handles
}

/// Handles mentioned in `after` but not in `before`, and the reverse.
#[must_use]
pub fn diff(before: &str, after: &str) -> (Vec<String>, Vec<String>) {
    let old = extract(before);
    let new = extract(after);
    let added = new.iter().filter(|h| !old.contains(h)).cloned().collect();
    let removed = old.iter().filter(|h| !new.contains(h)).cloned().collect();
    (added, removed)
}
