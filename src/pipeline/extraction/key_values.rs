use std::sync::LazyLock;

use regex::Regex;

use super::types::KeyValuePair;

/// Only the leading lines of a document are inspected; headers and cover
/// pages carry the metadata, bodies produce noise.
pub const MAX_KEY_VALUE_LINES: usize = 120;
pub const MIN_KEY_CHARS: usize = 2;
pub const MAX_KEY_CHARS: usize = 60;

/// `Key: value` with a colon-free key of 2-60 chars and a non-empty value.
static KEY_VALUE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]{2,60}):\s*(.+)$").unwrap());

/// Colon-delimited pairs from the first `MAX_KEY_VALUE_LINES` lines of `text`,
/// in line order. Lines that don't fit the pattern are skipped.
pub fn extract_key_values(text: &str) -> Vec<KeyValuePair> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    text.split('\n')
        .take(MAX_KEY_VALUE_LINES)
        .filter_map(|line| parse_line(line.trim()))
        .collect()
}

fn parse_line(line: &str) -> Option<KeyValuePair> {
    let captures = KEY_VALUE_LINE.captures(line)?;
    let key = captures.get(1)?.as_str().trim();
    let value = captures.get(2)?.as_str().trim();

    let key_chars = key.chars().count();
    if !(MIN_KEY_CHARS..=MAX_KEY_CHARS).contains(&key_chars) || value.is_empty() {
        return None;
    }
    Some(KeyValuePair::new(key, value))
}
