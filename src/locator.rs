//! Text locator: every occurrence of a query in one plain-text string.
//!
//! Occurrences come back in ascending offset order and never overlap. They are only valid for
//! the exact string they were computed against, so a batch of edits built from them has to be
//! applied from the last occurrence to the first.

use crate::offsets::{byte_to_char, len_chars};
use regex::Regex;
use thiserror::Error;

/// A located match, in chars.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Occurrence {
    /// Char index of the first matched char.
    pub offset: usize,
    /// Matched length in chars.
    pub length: usize,
    /// The matched text itself.
    pub matched_text: String,
}

impl Occurrence {
    #[must_use]
    /// Char index just past the match.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// How a query is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// Exact substring.
    #[default]
    Literal,
    /// Regular expression.
    Pattern,
}

/// Errors from pattern queries. Literal queries cannot fail.
#[derive(Debug, Error)]
pub enum LocateError {
    /// The pattern did not compile.
    #[error("invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Find all non-overlapping occurrences of `query` in `text`.
///
/// # Errors
///
/// Returns [`LocateError::InvalidPattern`] when `mode` is [`QueryMode::Pattern`] and the query
/// does not compile.
pub fn find_all(text: &str, query: &str, mode: QueryMode) -> Result<Vec<Occurrence>, LocateError> {
    match mode {
        QueryMode::Literal => Ok(find_literal(text, query)),
        QueryMode::Pattern => find_pattern(text, query),
    }
}

fn find_literal(text: &str, query: &str) -> Vec<Occurrence> {
    if query.is_empty() {
        return Vec::new();
    }
    let length = len_chars(query);
    let mut found = Vec::new();
    // Track the char index alongside the byte position so each match costs one scan.
    let mut byte_pos = 0;
    let mut char_pos = 0;
    while let Some(rel) = text[byte_pos..].find(query) {
        let start = byte_pos + rel;
        char_pos += len_chars(&text[byte_pos..start]);
        found.push(Occurrence {
            offset: char_pos,
            length,
            matched_text: query.to_string(),
        });
        byte_pos = start + query.len();
        char_pos += length;
    }
    found
}

fn find_pattern(text: &str, pattern: &str) -> Result<Vec<Occurrence>, LocateError> {
    let re = Regex::new(pattern)?;
    Ok(re
        .find_iter(text)
        .filter(|m| !m.as_str().is_empty())
        .map(|m| Occurrence {
            offset: byte_to_char(text, m.start()),
            length: len_chars(m.as_str()),
            matched_text: m.as_str().to_string(),
        })
        .collect())
}

#[must_use]
/// `radius` chars either side of an occurrence, with the match wrapped in `**`.
pub fn context_preview(text: &str, occurrence: &Occurrence, radius: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let start = occurrence.offset.saturating_sub(radius);
    let end = (occurrence.end() + radius).min(chars.len());
    let before: String = chars[start..occurrence.offset.min(chars.len())].iter().collect();
    let after: String = chars[occurrence.end().min(chars.len())..end].iter().collect();
    let lead = if start > 0 { "…" } else { "" };
    let trail = if end < chars.len() { "…" } else { "" };
    format!(
        "{lead}{}**{}**{}{trail}",
        before.replace('\n', " "),
        occurrence.matched_text,
        after.replace('\n', " ")
    )
}

#[cfg(test)]
#[path = "tests/locator.rs"]
mod tests;
