//! Lexical helpers for C text
//!
//! Classifies every character of a C source as code, comment or literal so
//! that brace matching and pattern searches can ignore text that the
//! compiler would never see as code.

use std::iter::Peekable;
use std::str::CharIndices;

/// Lexical region a character belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Code,
    Comment,
    /// String or character literal, quotes included
    Literal,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Code,
    LineComment,
    BlockOpen,
    Block,
    BlockClose,
    Literal(char),
    Escape(char),
}

/// Iterator over `(byte_offset, char, Region)` for a C source text.
pub struct Regions<'a> {
    chars: Peekable<CharIndices<'a>>,
    state: State,
}

impl<'a> Regions<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            chars: text.char_indices().peekable(),
            state: State::Code,
        }
    }
}

impl Iterator for Regions<'_> {
    type Item = (usize, char, Region);

    fn next(&mut self) -> Option<Self::Item> {
        let (idx, ch) = self.chars.next()?;
        let next = self.chars.peek().map(|&(_, c)| c);

        let region = match self.state {
            State::Code => match (ch, next) {
                ('/', Some('/')) => {
                    self.state = State::LineComment;
                    Region::Comment
                }
                ('/', Some('*')) => {
                    self.state = State::BlockOpen;
                    Region::Comment
                }
                ('"', _) | ('\'', _) => {
                    self.state = State::Literal(ch);
                    Region::Literal
                }
                _ => Region::Code,
            },
            State::LineComment => {
                if ch == '\n' {
                    self.state = State::Code;
                    Region::Code
                } else {
                    Region::Comment
                }
            }
            State::BlockOpen => {
                self.state = State::Block;
                Region::Comment
            }
            State::Block => {
                if ch == '*' && next == Some('/') {
                    self.state = State::BlockClose;
                }
                Region::Comment
            }
            State::BlockClose => {
                self.state = State::Code;
                Region::Comment
            }
            State::Literal(quote) => {
                if ch == '\\' {
                    self.state = State::Escape(quote);
                    Region::Literal
                } else if ch == quote {
                    self.state = State::Code;
                    Region::Literal
                } else if ch == '\n' {
                    // unterminated literal ends at the line break
                    self.state = State::Code;
                    Region::Code
                } else {
                    Region::Literal
                }
            }
            State::Escape(quote) => {
                self.state = State::Literal(quote);
                Region::Literal
            }
        };

        Some((idx, ch, region))
    }
}

/// Which regions [`mask`] blanks out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mask {
    Comments,
    CommentsAndLiterals,
}

/// Replaces masked characters with spaces, keeping byte offsets and line breaks.
///
/// Offsets into the masked text are valid offsets into the original text.
/// Literal quotes are kept so a masked literal still reads as `"   "`.
pub fn mask(text: &str, which: Mask) -> String {
    let mut out = String::with_capacity(text.len());
    for (_, ch, region) in Regions::new(text) {
        let blank = match region {
            Region::Code => false,
            Region::Comment => true,
            Region::Literal => which == Mask::CommentsAndLiterals && ch != '"' && ch != '\'',
        };
        if blank && ch != '\n' {
            out.extend(std::iter::repeat(' ').take(ch.len_utf8()));
        } else {
            out.push(ch);
        }
    }
    out
}

/// Replaces block and line comments with whitespace.
///
/// A comment on one line becomes a single space, so `unsigned/**/int`
/// still reads as two tokens. A comment spanning lines leaves only its line
/// breaks.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_comment = false;
    let mut spanned_lines = false;

    for (_, ch, region) in Regions::new(text) {
        if region == Region::Comment {
            in_comment = true;
            if ch == '\n' {
                spanned_lines = true;
                out.push('\n');
            }
            continue;
        }
        if in_comment {
            let after_code = out.chars().last().is_some_and(|c| !c.is_whitespace());
            if !spanned_lines && after_code && !ch.is_whitespace() {
                out.push(' ');
            }
            in_comment = false;
            spanned_lines = false;
        }
        out.push(ch);
    }
    out
}

/// Collapses every run of three or more blank lines into a single blank line.
///
/// Runs of one or two blank lines are kept as they are.
pub fn collapse_blank_lines(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = 0usize;

    fn flush(lines: &mut Vec<&str>, run: usize) {
        let keep = if run >= 3 { 1 } else { run };
        lines.extend(std::iter::repeat("").take(keep));
    }

    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
        } else {
            flush(&mut lines, blank_run);
            blank_run = 0;
            lines.push(line);
        }
    }
    flush(&mut lines, blank_run);

    let mut out = lines.join("\n");
    if text.ends_with('\n') && !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Finds the byte offset of the `}` closing the `{` at `open`.
///
/// Depth starts at 1 on the opening brace; braces inside comments and
/// literals are ignored. Returns `None` when the text ends first.
pub fn matching_brace(text: &str, open: usize) -> Option<usize> {
    if text.as_bytes().get(open) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    for (idx, ch, region) in Regions::new(&text[open..]) {
        if region != Region::Code {
            continue;
        }
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regions_classify_comments_and_literals() {
        let text = "a /* b */ \"c\" // d\ne";
        let classes: Vec<(char, Region)> =
            Regions::new(text).map(|(_, c, r)| (c, r)).collect();

        assert_eq!(classes[0], ('a', Region::Code));
        assert_eq!(classes[2], ('/', Region::Comment));
        assert_eq!(classes[8], ('/', Region::Comment));
        assert_eq!(classes[10], ('"', Region::Literal));
        assert_eq!(classes[11], ('c', Region::Literal));
        assert_eq!(classes.last().unwrap(), &('e', Region::Code));
    }

    #[test]
    fn test_block_comment_does_not_close_on_opening_star() {
        let text = "/*/ x */y";
        let last = Regions::new(text).last().unwrap();
        assert_eq!(last.2, Region::Code);
        let x = Regions::new(text).find(|&(_, c, _)| c == 'x').unwrap();
        assert_eq!(x.2, Region::Comment);
    }

    #[test]
    fn test_escaped_quote_stays_in_literal() {
        let text = r#""a\"}" }"#;
        let brace: Vec<Region> = Regions::new(text)
            .filter(|&(_, c, _)| c == '}')
            .map(|(_, _, r)| r)
            .collect();
        assert_eq!(brace, vec![Region::Literal, Region::Code]);
    }

    #[test]
    fn test_mask_preserves_offsets() {
        let text = "int a; // ünïcode\nint b;";
        let masked = mask(text, Mask::Comments);
        assert_eq!(masked.len(), text.len());
        assert_eq!(masked.find("int b"), text.find("int b"));
        assert!(!masked.contains("//"));
    }

    #[test]
    fn test_mask_literals() {
        let masked = mask(r#"puts("call(x)");"#, Mask::CommentsAndLiterals);
        assert_eq!(masked, r#"puts("       ");"#);
    }

    #[test]
    fn test_strip_comments_keeps_code_and_strings() {
        let text = "int a; /* gone\nstill gone */ int b;\nchar *u = \"http://x\"; // tail\n";
        let stripped = strip_comments(text);
        assert_eq!(stripped, "int a; \n int b;\nchar *u = \"http://x\"; \n");
    }

    #[test]
    fn test_strip_comments_separates_tokens() {
        assert_eq!(strip_comments("unsigned/**/int x;"), "unsigned int x;");
        assert_eq!(strip_comments("a /* c */ b"), "a  b");
        assert_eq!(strip_comments("/* lead */int x;"), "int x;");
        assert_eq!(strip_comments("f(a/*\n*/b)"), "f(a\nb)");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\nb\n"), "a\n\nb\n");
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\n\nb"), "a\n\n\nb");
        assert_eq!(collapse_blank_lines("a\n\n b"), "a\n\n b");
        assert_eq!(collapse_blank_lines("a\n\nb\n"), "a\n\nb\n");
    }

    #[test]
    fn test_matching_brace_nested() {
        let text = "{ if (x) { y(); } }";
        assert_eq!(matching_brace(text, 0), Some(text.len() - 1));
    }

    #[test]
    fn test_matching_brace_ignores_literals_and_comments() {
        let text = "{ puts(\"}\"); /* } */ c = '}'; }";
        assert_eq!(matching_brace(text, 0), Some(text.len() - 1));
    }

    #[test]
    fn test_matching_brace_unbalanced() {
        assert_eq!(matching_brace("{ if (x) { y(); }", 0), None);
        assert_eq!(matching_brace("x {}", 0), None);
    }
}
