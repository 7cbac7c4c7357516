//! Markdown to Telegram-compatible HTML
//!
//! Telegram's HTML parse mode accepts a small tag set and is far more
//! forgiving than MarkdownV2, which demands escaping of most punctuation.
//! This converts the markdown subset chat models actually emit: bold,
//! italic, inline code, fenced code blocks, and links.

/// Convert markdown text to Telegram-compatible HTML.
#[must_use]
pub fn markdown_to_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let lines: Vec<&str> = input.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if let Some(lang) = line.trim().strip_prefix("```") {
            let mut block = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].trim().starts_with("```") {
                block.push(lines[i]);
                i += 1;
            }
            // Skip the closing fence
            if i < lines.len() {
                i += 1;
            }

            let code = escape_html(&block.join("\n"));
            if lang.trim().is_empty() {
                output.push_str(&format!("<pre><code>{code}</code></pre>"));
            } else {
                output.push_str(&format!(
                    "<pre><code class=\"language-{}\">{code}</code></pre>",
                    lang.trim()
                ));
            }
            output.push('\n');
            continue;
        }

        output.push_str(&convert_inline(line));
        output.push('\n');
        i += 1;
    }

    if output.ends_with('\n') {
        output.pop();
    }

    output
}

/// Convert inline markdown in one line, escaping everything else.
fn convert_inline(line: &str) -> String {
    let mut output = String::with_capacity(line.len());
    let mut i = 0;

    while i < line.len() {
        let rest = &line[i..];

        // Inline code: contents escaped verbatim, no nested formatting
        if let Some(after) = rest.strip_prefix('`')
            && let Some(end) = after.find('`')
        {
            output.push_str("<code>");
            output.push_str(&escape_html(&after[..end]));
            output.push_str("</code>");
            i += end + 2;
            continue;
        }

        // Bold
        if let Some(after) = rest.strip_prefix("**")
            && let Some(end) = after.find("**")
        {
            output.push_str("<b>");
            output.push_str(&escape_html(&after[..end]));
            output.push_str("</b>");
            i += end + 4;
            continue;
        }

        // Italic: single underscores around a non-space span
        if let Some(after) = rest.strip_prefix('_')
            && let Some(end) = after.find('_')
        {
            let inner = &after[..end];
            if !inner.is_empty() && !inner.starts_with(' ') && !inner.ends_with(' ') {
                output.push_str("<i>");
                output.push_str(&escape_html(inner));
                output.push_str("</i>");
                i += end + 2;
                continue;
            }
        }

        // Link: [text](http…)
        if rest.starts_with('[')
            && let Some((text, url, consumed)) = parse_link(rest)
        {
            output.push_str(&format!(
                "<a href=\"{}\">{}</a>",
                escape_html(url),
                escape_html(text)
            ));
            i += consumed;
            continue;
        }

        let Some(ch) = rest.chars().next() else { break };
        push_escaped(&mut output, ch);
        i += ch.len_utf8();
    }

    output
}

/// Parse a `[text](url)` form at the start of `s`.
///
/// Only http(s) targets convert; anything else stays literal text.
fn parse_link(s: &str) -> Option<(&str, &str, usize)> {
    let close = s.find("](")?;
    let text = &s[1..close];
    let rest = &s[close + 2..];
    let end = rest.find(')')?;
    let url = &rest[..end];

    let is_http = url.starts_with("http://") || url.starts_with("https://");
    if text.is_empty() || !is_http {
        return None;
    }

    Some((text, url, close + 2 + end + 1))
}

/// Escape HTML special characters
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        push_escaped(&mut escaped, ch);
    }
    escaped
}

fn push_escaped(output: &mut String, ch: char) {
    match ch {
        '&' => output.push_str("&amp;"),
        '<' => output.push_str("&lt;"),
        '>' => output.push_str("&gt;"),
        '"' => output.push_str("&quot;"),
        _ => output.push(ch),
    }
}
