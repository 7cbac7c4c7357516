//! Splitting long replies for Telegram's message size cap
//!
//! Telegram rejects messages over 4096 characters. Long model output is
//! split on paragraph boundaries where possible, keeping fenced code blocks
//! intact, with a hard split as the last resort.

/// A little headroom under Telegram's 4096-character cap
pub(crate) const MESSAGE_LIMIT: usize = 4000;

/// Split `text` into chunks of at most `limit` bytes.
///
/// Splits prefer paragraph boundaries (blank lines) and never break inside
/// a fenced code block unless a single block alone exceeds the limit.
/// Returned chunks are trimmed and non-empty.
#[must_use]
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.len() <= limit {
        return vec![trimmed.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for segment in paragraphs_keeping_fences(trimmed) {
        let extra = if current.is_empty() { 0 } else { 2 };
        if current.len() + extra + segment.len() <= limit {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(segment);
            continue;
        }

        flush(&mut chunks, &mut current);

        if segment.len() <= limit {
            current.push_str(segment);
        } else {
            // A single oversized paragraph (or code block): hard split
            chunks.extend(hard_split(segment, limit));
        }
    }

    flush(&mut chunks, &mut current);
    chunks
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
}

/// Split on blank lines, treating fenced code blocks as atomic segments.
fn paragraphs_keeping_fences(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_fence = false;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim().starts_with("```") {
            in_fence = !in_fence;
        }
        if !in_fence && line.trim().is_empty() {
            let segment = text[start..offset].trim_matches('\n');
            if !segment.is_empty() {
                segments.push(segment);
            }
            start = offset + line.len();
        }
        offset += line.len();
    }

    let tail = text[start..].trim_matches('\n');
    if !tail.is_empty() {
        segments.push(tail);
    }

    segments
}

/// Split at the last newline (or space) under the limit, respecting char
/// boundaries.
fn hard_split(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    while remaining.len() > limit {
        let cut = split_point(remaining, limit);
        let chunk = remaining[..cut].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        remaining = remaining[cut..].trim_start();
    }

    let tail = remaining.trim();
    if !tail.is_empty() {
        chunks.push(tail.to_string());
    }

    chunks
}

fn split_point(text: &str, limit: usize) -> usize {
    let mut boundary = limit.min(text.len());
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    if boundary == 0 {
        // Limit smaller than the first character; take it whole
        return text.chars().next().map_or(text.len(), char::len_utf8);
    }

    let window = &text[..boundary];
    window
        .rfind('\n')
        .or_else(|| window.rfind(' '))
        .filter(|&pos| pos > 0)
        .unwrap_or(boundary)
}
