//! Call-set extraction for function bodies
//!
//! Every `identifier (` occurrence counts as a call. Macro invocations and
//! cast-like syntax are not told apart from real calls; the result answers
//! "what might need mocking", not "what is called at runtime".

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::lexical::{mask, Mask};

static CALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z_]\w*)\s*\(").expect("call pattern is valid"));

/// Control-flow keywords and literals that look like calls but are not.
pub const EXCLUDED_CALLEES: [&str; 7] = ["if", "while", "for", "switch", "return", "sizeof", "NULL"];

#[derive(Debug, Default, Clone, Copy)]
pub struct CallGraphExtractor;

impl CallGraphExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Returns the identifiers invoked in `body`, minus [`EXCLUDED_CALLEES`].
    ///
    /// Comments and literal contents are ignored.
    pub fn extract(&self, body: &str) -> BTreeSet<String> {
        let code = mask(body, Mask::CommentsAndLiterals);
        CALL_RE
            .captures_iter(&code)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|name| !EXCLUDED_CALLEES.contains(name))
            .map(str::to_string)
            .collect()
    }
}

/// True for identifiers written in macro style (`ASSERT_OK`, `MAX`).
pub fn is_likely_macro(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_alphabetic())
        && !name.chars().any(|c| c.is_ascii_lowercase())
}
