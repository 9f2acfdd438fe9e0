//! Paragraph-aligned chunking.
//!
//! `split` packs consecutive paragraphs greedily into chunks of at most
//! `max_chars` characters; `merge` is its exact inverse. Paragraphs are
//! never cut, so a single paragraph longer than `max_chars` becomes its own
//! oversized chunk.
//!
//! The separator is exactly `"\n\n"`. Text with longer newline runs still
//! round-trips: the extra newlines stay attached to the neighbouring
//! paragraph.

/// Chunk separator. `merge(split(t, n)) == t` for every `t` and `n >= 1`.
pub const SEPARATOR: &str = "\n\n";

const SEPARATOR_CHARS: usize = 2;

/// Split `text` into paragraph-aligned chunks of at most `max_chars`
/// characters (oversized single paragraphs excepted).
///
/// `max_chars == 0` is treated as 1.
pub fn split(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0usize;
    let mut buffer_open = false;

    for paragraph in text.split(SEPARATOR) {
        let para_chars = paragraph.chars().count();

        if buffer_open && buffer_chars + SEPARATOR_CHARS + para_chars > max_chars {
            chunks.push(std::mem::take(&mut buffer));
            buffer_chars = 0;
            buffer_open = false;
        }

        if buffer_open {
            buffer.push_str(SEPARATOR);
            buffer_chars += SEPARATOR_CHARS;
        }
        buffer.push_str(paragraph);
        buffer_chars += para_chars;
        buffer_open = true;
    }

    if buffer_open {
        chunks.push(buffer);
    }
    chunks
}

/// Reassemble chunks produced by [`split`] (or rewritten versions of them).
pub fn merge<S: AsRef<str>>(chunks: &[S]) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            out.push_str(SEPARATOR);
        }
        out.push_str(chunk.as_ref());
    }
    out
}
