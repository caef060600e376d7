//! Conversions between char offsets and UTF-8 byte offsets.
//!
//! Every offset the core hands out is a char index into the plain text. Rust strings index by
//! byte, so anything that slices or searches goes through these helpers.

#[must_use]
/// Byte index of the char at `char_offset`, or `None` when it lies past the end.
///
/// `char_offset == len_chars(text)` maps to `text.len()`.
pub fn char_to_byte(text: &str, char_offset: usize) -> Option<usize> {
    if char_offset == 0 {
        return Some(0);
    }
    match text.char_indices().nth(char_offset) {
        Some((byte_idx, _)) => Some(byte_idx),
        None if char_offset == len_chars(text) => Some(text.len()),
        None => None,
    }
}

#[must_use]
/// Char index of the char starting at (or containing) `byte_offset`.
pub fn byte_to_char(text: &str, byte_offset: usize) -> usize {
    text.char_indices()
        .take_while(|(idx, _)| *idx < byte_offset)
        .count()
}

#[must_use]
/// Length of `text` in chars.
pub fn len_chars(text: &str) -> usize {
    text.chars().count()
}

#[must_use]
/// Slice `len` chars starting at `start`, or `None` if the range runs past the end.
pub fn slice_chars(text: &str, start: usize, len: usize) -> Option<&str> {
    let from = char_to_byte(text, start)?;
    let to = char_to_byte(text, start.checked_add(len)?)?;
    text.get(from..to)
}
