use crate::analyzer::lexical::{collapse_blank_lines, strip_comments};

pub const TRUNCATION_MARKER: &str = "/* ... truncated ... */";

/// Cosmetic cleanup of header text before it goes into a payload.
///
/// Strips comments, trailing whitespace and surrounding blank lines, and
/// collapses long blank runs. Code lines are never dropped.
pub fn normalize_header(text: &str) -> String {
    let stripped = strip_comments(text);
    let trimmed: Vec<&str> = stripped.lines().map(str::trim_end).collect();
    let collapsed = collapse_blank_lines(&trimmed.join("\n"));
    collapsed.trim_matches('\n').to_string()
}

/// Cuts `text` to at most `max_bytes` at a line boundary.
///
/// Returns the text and whether it was cut. A cut text ends with
/// [`TRUNCATION_MARKER`] on its own line.
pub fn truncate_at_line(text: &str, max_bytes: usize) -> (String, bool) {
    if text.len() <= max_bytes {
        return (text.to_string(), false);
    }

    let mut limit = max_bytes;
    while !text.is_char_boundary(limit) {
        limit -= 1;
    }
    let kept = match text[..limit].rfind('\n') {
        Some(newline) => &text[..newline],
        None => "",
    };

    let mut out = String::with_capacity(kept.len() + TRUNCATION_MARKER.len() + 1);
    out.push_str(kept);
    if !kept.is_empty() {
        out.push('\n');
    }
    out.push_str(TRUNCATION_MARKER);
    (out, true)
}
