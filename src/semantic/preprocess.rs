//! Content preprocessing for embedding generation.
//!
//! Turns a note into the text that gets embedded:
//! 1. Strip rich-text markup from the body
//! 2. Prefix the title and tag line
//! 3. Hard-truncate to the maximum input length

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Bullet marker that replaces list item openers.
const BULLET: &str = "• ";

static BLOCK_TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)</?(?:p|div|h[1-6]|br|blockquote|pre|ul|ol|tr|table|hr|section|article|header|footer)\b[^>]*>|</li\s*>",
    )
    .expect("block tag regex is valid")
});

static LIST_ITEM_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<li\b[^>]*>").expect("list item regex is valid"));

static ANY_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex is valid"));

static ENTITY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").expect("entity regex is valid")
});

/// Build the embedding input for a note.
///
/// Layout is `title`, a blank line, an optional `Tags: a, b` line followed by
/// a blank line, then the plain-text body. The result is capped at
/// `max_length` characters without an ellipsis since it is never shown to
/// anyone.
pub fn prepare_for_embedding(title: &str, body: &str, tags: &[String], max_length: usize) -> String {
    let mut content = format!("{}\n\n", title.trim());

    if !tags.is_empty() {
        content.push_str("Tags: ");
        content.push_str(&tags.join(", "));
        content.push_str("\n\n");
    }

    content.push_str(&strip_markup(body));

    truncate_chars(content.trim(), max_length)
}

/// Convert rich-text markup into plain text.
///
/// Block-level tags become line breaks, list items get a bullet, any other
/// tag is dropped and entities are decoded. Lines are trimmed and blank
/// lines removed. A bullet left alone on its line, as with `<li><p>`, is
/// joined to the text that follows it.
pub fn strip_markup(markup: &str) -> String {
    let text = BLOCK_TAG_REGEX.replace_all(markup, "\n");
    let text = LIST_ITEM_REGEX.replace_all(&text, format!("\n{BULLET}").as_str());
    let text = ANY_TAG_REGEX.replace_all(&text, "");
    let text = decode_entities(&text);

    let marker = BULLET.trim_end();
    let mut lines: Vec<String> = Vec::new();
    let mut open_bullet = false;

    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if line == marker {
            open_bullet = true;
            continue;
        }

        if open_bullet && !line.starts_with(marker) {
            lines.push(format!("{BULLET}{line}"));
        } else {
            lines.push(line.to_string());
        }
        open_bullet = false;
    }

    lines.join("\n")
}

/// Truncate to at most `max_chars` characters (not bytes).
pub fn truncate_chars(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => content[..byte_idx].to_string(),
        None => content.to_string(),
    }
}

fn decode_entities(text: &str) -> String {
    ENTITY_REGEX
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let decoded = match name {
                "nbsp" => Some(' '),
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ if name.starts_with("#x") || name.starts_with("#X") => {
                    u32::from_str_radix(&name[2..], 16).ok().and_then(char::from_u32)
                }
                _ if name.starts_with('#') => name[1..].parse::<u32>().ok().and_then(char::from_u32),
                _ => None,
            };

            match decoded {
                Some(ch) => ch.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
