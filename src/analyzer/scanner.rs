//! Function definition scanner
//!
//! Finds `<return_type> <name> ( <params> ) {` definitions in a translation
//! unit, cuts out the brace-balanced body and records the call set.
//!
//! Parameter splitting takes the last whitespace-separated token as the
//! name, so `char *name` yields `("char", "*name")` and array declarators
//! keep their brackets on the name. Fragments without whitespace (`...`,
//! unnamed prototypes) are dropped.
//!
//! Parameter lists may nest parentheses one level deep, enough for
//! function-pointer parameters such as `int (*fn)(int)`; the whole
//! declarator then lands on the name. Deeper nesting is not recognised as a
//! definition.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;

use super::calls::CallGraphExtractor;
use super::lexical::{mask, matching_brace, Mask};
use super::{FunctionFact, FunctionStore, Parameter};
use crate::error::{ContextError, Warning, WarningKind};

static DEFINITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?P<ret>(?:(?:const|volatile|unsigned|signed|short|long|struct|union|enum|static|inline|extern)\s+)*[A-Za-z_]\w*)(?P<sep>[\s*]+)(?P<name>[A-Za-z_]\w*)\s*\((?P<params>(?:[^()]|\([^()]*\))*)\)\s*\{",
    )
    .expect("definition pattern is valid")
});

static INCLUDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*([<"])([^>"\n]+)[>"]"#)
        .expect("include pattern is valid")
});

/// Words that can precede `(...) {` without forming a definition.
const STATEMENT_KEYWORDS: [&str; 10] = [
    "if", "else", "while", "for", "switch", "return", "sizeof", "do", "case", "goto",
];

/// A located function definition, offsets into the original source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    pub return_type: String,
    pub raw_params: String,
    /// Offset of the first return type token
    pub start: usize,
    /// Offset of the function name
    pub name_offset: usize,
    /// Offset of the opening `{` of the body
    pub open_brace: usize,
}

impl Definition {
    pub fn line(&self, source: &str) -> usize {
        source[..self.name_offset].matches('\n').count() + 1
    }

    /// Full definition text, return type through closing brace.
    pub fn text<'s>(&self, source: &'s str) -> Option<&'s str> {
        matching_brace(source, self.open_brace).map(|close| &source[self.start..=close])
    }
}

/// An `#include` directive found in a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IncludeDirective {
    pub name: String,
    /// `<...>` form
    pub system: bool,
}

/// Result of scanning one translation unit.
#[derive(Debug, Default)]
pub struct FileScan {
    pub functions: Vec<FunctionFact>,
    pub warnings: Vec<Warning>,
}

/// Lists `#include` directives outside comments, in source order.
pub fn include_directives(source: &str) -> Vec<IncludeDirective> {
    let code = mask(source, Mask::Comments);
    INCLUDE_RE
        .captures_iter(&code)
        .map(|caps| IncludeDirective {
            name: caps[2].trim().to_string(),
            system: &caps[1] == "<",
        })
        .collect()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_return_type(ret: &str, sep: &str) -> String {
    let base = normalize_whitespace(ret);
    let stars: String = sep.chars().filter(|&c| c == '*').collect();
    if stars.is_empty() {
        base
    } else {
        format!("{} {}", base, stars)
    }
}

fn find_definitions(masked: &str) -> impl Iterator<Item = Definition> + '_ {
    DEFINITION_RE.captures_iter(masked).filter_map(|caps| {
        let ret = caps.name("ret")?;
        let name = caps.name("name")?;
        let whole = caps.get(0)?;

        let last_ret_word = ret.as_str().split_whitespace().last().unwrap_or("");
        if STATEMENT_KEYWORDS.contains(&name.as_str())
            || STATEMENT_KEYWORDS.contains(&last_ret_word)
        {
            return None;
        }

        Some(Definition {
            name: name.as_str().to_string(),
            return_type: normalize_return_type(ret.as_str(), &caps["sep"]),
            raw_params: caps["params"].to_string(),
            start: ret.start(),
            name_offset: name.start(),
            open_brace: whole.end() - 1,
        })
    })
}

/// Finds the first definition of `name` in `source`, ignoring commented-out code.
pub fn locate_definition(source: &str, name: &str) -> Option<Definition> {
    let masked = mask(source, Mask::Comments);
    let found = find_definitions(&masked).find(|def| def.name == name);
    found
}

/// Cuts the body starting at `open_brace` out of `source`, braces included.
///
/// Returns `None` when the end of the text is reached before the body closes.
pub fn extract_body(source: &str, open_brace: usize) -> Option<&str> {
    matching_brace(source, open_brace).map(|close| &source[open_brace..=close])
}

/// Splits a raw parameter list into `(type, name)` pairs.
pub fn parse_parameters(raw: &str) -> Vec<Parameter> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "void" {
        return Vec::new();
    }

    split_top_level(trimmed)
        .into_iter()
        .filter_map(|fragment| {
            let fragment = normalize_whitespace(fragment);
            let split = fragment.rfind(' ')?;
            Some(Parameter::new(&fragment[..split], &fragment[split + 1..]))
        })
        .collect()
}

fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

fn is_skipped_name(name: &str) -> bool {
    name == "main" || name.starts_with('_')
}

/// Scans one translation unit.
///
/// `main`, names starting with `_` and definitions whose body never closes
/// are left out; the latter are reported as warnings.
pub fn scan_source(path: &Path, source: &str) -> FileScan {
    let masked = mask(source, Mask::Comments);
    let extractor = CallGraphExtractor::new();
    let declared_includes: BTreeSet<String> = include_directives(source)
        .into_iter()
        .map(|inc| inc.name)
        .collect();

    let mut scan = FileScan::default();

    for def in find_definitions(&masked) {
        if is_skipped_name(&def.name) {
            tracing::debug!("Skipping {} in {}", def.name, path.display());
            continue;
        }

        let Some(body) = extract_body(source, def.open_brace) else {
            let err = ContextError::UnbalancedBody {
                function: def.name.clone(),
                file: path.to_path_buf(),
            };
            tracing::warn!("{}", err);
            scan.warnings.push(Warning::from_error(&def.name, &err));
            continue;
        };

        scan.functions.push(FunctionFact {
            line: def.line(source),
            parameters: parse_parameters(&def.raw_params),
            external_calls: extractor.extract(body),
            return_type: def.return_type,
            name: def.name,
            source_file: path.to_path_buf(),
            declared_includes: declared_includes.clone(),
        });
    }

    scan
}

fn read_and_scan(path: &Path) -> FileScan {
    match std::fs::read(path) {
        Ok(bytes) => scan_source(path, &String::from_utf8_lossy(&bytes)),
        Err(e) => {
            tracing::warn!("Cannot read {}: {}", path.display(), e);
            FileScan {
                functions: Vec::new(),
                warnings: vec![Warning::new(
                    WarningKind::FileUnreadable,
                    path.display().to_string(),
                    e.to_string(),
                )],
            }
        }
    }
}

/// Accumulates function facts across files.
///
/// The first definition seen for a name is kept; later ones are ignored so
/// repeated walks give the same result.
#[derive(Debug, Default)]
pub struct SourceScanner {
    store: FunctionStore,
    warnings: Vec<Warning>,
}

impl SourceScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyzes one file and merges its functions into the store.
    pub fn analyze(&mut self, path: &Path) {
        let scan = read_and_scan(path);
        self.merge(scan);
    }

    /// Analyzes `paths` in parallel; results are merged in the given order.
    pub fn analyze_files(&mut self, paths: &[PathBuf]) {
        let scans: Vec<FileScan> = paths.par_iter().map(|p| read_and_scan(p)).collect();
        for scan in scans {
            self.merge(scan);
        }
    }

    fn merge(&mut self, scan: FileScan) {
        for fact in scan.functions {
            let name = fact.name.clone();
            if !self.store.insert_if_absent(fact) {
                tracing::debug!("Keeping first definition of {}", name);
            }
        }
        self.warnings.extend(scan.warnings);
    }

    pub fn get(&self, name: &str) -> Option<&FunctionFact> {
        self.store.get(name)
    }

    pub fn get_all(&self) -> &std::collections::BTreeMap<String, FunctionFact> {
        self.store.all()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_parts(self) -> (FunctionStore, Vec<Warning>) {
        (self.store, self.warnings)
    }
}
