//! Splitting rendered text into gateway-sized chunks.
//!
//! Limits are counted in characters. A split prefers the last line break
//! inside the limit and never separates an escaping backslash from the
//! character it escapes, so every chunk is valid MarkdownV2 on its own as
//! long as the entities it contains fit.

/// Maximum length of a text message.
pub const TEXT_LIMIT: usize = 4096;

/// Maximum length of a media caption.
pub const CAPTION_LIMIT: usize = 1024;

/// Per-message size limits of the messaging gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLimits {
    /// Maximum characters in a text message.
    pub text: usize,
    /// Maximum characters in a media caption.
    pub caption: usize,
}

impl Default for MessageLimits {
    fn default() -> Self {
        Self { text: TEXT_LIMIT, caption: CAPTION_LIMIT }
    }
}

/// Returns the byte index at which the first chunk of `text` ends.
///
/// Returns `text.len()` when the whole text fits in `limit` characters.
pub fn split_point(text: &str, limit: usize) -> usize {
    // One escape pair must always fit, otherwise no split can make progress.
    let limit = limit.max(2);

    let Some((hard, _)) = text.char_indices().nth(limit) else {
        return text.len();
    };

    let window = &text[..hard];
    let mut split = match window.rfind('\n') {
        Some(index) if index > 0 => index + 1,
        _ => hard,
    };

    let trailing_backslashes = text[..split].bytes().rev().take_while(|b| *b == b'\\').count();
    if trailing_backslashes % 2 == 1 {
        split -= 1;
    }

    split
}

/// Splits text into chunks of at most `limit` characters, in order.
///
/// Concatenating the chunks yields the original text. Empty input yields no
/// chunks.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let split = split_point(rest, limit);
        chunks.push(rest[..split].to_string());
        rest = &rest[split..];
    }

    chunks
}
