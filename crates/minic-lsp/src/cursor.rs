//! Cursor helpers for hover, definition and completion.
//!
//! Queries work on a prefix of the buffer: everything after the cursor, and
//! the rest of the token the cursor sits in, is cut off and the prefix is
//! reparsed on its own. The symbol being asked about is whatever identifier
//! the prefix ends with.

/// Cut `text` at `(line, character)`, extended over any alphanumerics that
/// follow the cursor.
///
/// Offsets are in bytes. A position past the end of the text leaves it
/// whole.
pub fn truncate_at_cursor(text: &str, line: u32, character: u32) -> &str {
    let bytes = text.as_bytes();
    let mut offset = 0usize;
    for _ in 0..line {
        match bytes[offset.min(bytes.len())..].iter().position(|&b| b == b'\n') {
            Some(newline) => offset += newline + 1,
            None => return text,
        }
    }
    offset = offset.saturating_add(character as usize);
    if offset >= bytes.len() {
        return text;
    }

    while !text.is_char_boundary(offset) {
        offset += 1;
    }
    while offset < bytes.len() && bytes[offset].is_ascii_alphanumeric() {
        offset += 1;
    }
    &text[..offset]
}

/// The maximal run of ASCII alphanumerics at the end of `text`.
///
/// Empty when the text ends with anything else; the whole text when it is a
/// single identifier.
pub fn trailing_identifier(text: &str) -> &str {
    let start = text
        .bytes()
        .rposition(|b| !b.is_ascii_alphanumeric())
        .map_or(0, |last_other| last_other + 1);
    &text[start..]
}
