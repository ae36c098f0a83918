//! Preprocessor-aware include walk over a tree-sitter parse.
//!
//! Follows `#include` directives the way a compiler would for a given set of
//! command-line defines: `#ifdef`/`#ifndef`/`#if`/`#elif`/`#else` pick their
//! branch from a macro table that `#define` and `#undef` keep current while
//! the walk descends into headers. Conditions the evaluator cannot decide
//! keep every branch.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tree_sitter::{Language, Node, Parser};

use super::{find_in, IncludeRequest, IncludeResolutionStrategy, IncludeSet};
use crate::error::{ContextError, Result};
use crate::paths::normalize_path;

const MAX_MACRO_CHASE: usize = 8;

fn node_text<'s>(node: Node<'_>, source: &'s [u8]) -> &'s str {
    node.utf8_text(source).unwrap_or("")
}

/// Parses a C integer literal, suffixes and radix prefixes included.
pub fn parse_c_int(text: &str) -> Option<i64> {
    let digits = text.trim().trim_end_matches(['u', 'U', 'l', 'L']);
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()
    } else {
        digits.parse().ok()
    }
}

/// Object-like macro state during a walk.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: HashMap<String, Option<String>>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: &str, value: Option<String>) {
        self.macros.insert(name.to_string(), value);
    }

    pub fn undefine(&mut self, name: &str) {
        self.macros.remove(name);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Integer value of a macro as `#if` sees it.
    ///
    /// Undefined names are 0 and valueless defines are 1. Values naming
    /// another macro are followed a few levels deep.
    pub fn value_of(&self, name: &str) -> Option<i64> {
        let mut current = name;
        for _ in 0..MAX_MACRO_CHASE {
            match self.macros.get(current) {
                None => return Some(0),
                Some(None) => return Some(1),
                Some(Some(value)) => {
                    let value = value.trim();
                    if value.is_empty() {
                        return Some(1);
                    }
                    if let Some(n) = parse_c_int(value) {
                        return Some(n);
                    }
                    let is_identifier = value
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_');
                    if !is_identifier {
                        return None;
                    }
                    current = value;
                }
            }
        }
        None
    }

    /// Evaluates a preprocessor condition; `None` when it cannot be decided.
    pub fn evaluate(&self, node: Node<'_>, source: &[u8]) -> Option<i64> {
        match node.kind() {
            "number_literal" => parse_c_int(node_text(node, source)),
            "identifier" => self.value_of(node_text(node, source)),
            "preproc_defined" => {
                let mut cursor = node.walk();
                let name = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "identifier")?;
                Some(self.is_defined(node_text(name, source)) as i64)
            }
            "parenthesized_expression" => {
                let mut cursor = node.walk();
                let inner = node.named_children(&mut cursor).next()?;
                self.evaluate(inner, source)
            }
            "unary_expression" => {
                let operator = node.child_by_field_name("operator")?.kind();
                let value = self.evaluate(node.child_by_field_name("argument")?, source)?;
                match operator {
                    "!" => Some((value == 0) as i64),
                    "-" => Some(value.wrapping_neg()),
                    "+" => Some(value),
                    "~" => Some(!value),
                    _ => None,
                }
            }
            "binary_expression" => self.evaluate_binary(node, source),
            "conditional_expression" => {
                let condition = self.evaluate(node.child_by_field_name("condition")?, source)?;
                let branch = if condition != 0 { "consequence" } else { "alternative" };
                self.evaluate(node.child_by_field_name(branch)?, source)
            }
            _ => None,
        }
    }

    fn evaluate_binary(&self, node: Node<'_>, source: &[u8]) -> Option<i64> {
        let operator = node.child_by_field_name("operator")?.kind();
        let left = node
            .child_by_field_name("left")
            .and_then(|n| self.evaluate(n, source));
        let right = node
            .child_by_field_name("right")
            .and_then(|n| self.evaluate(n, source));

        match operator {
            "&&" => match (left, right) {
                (Some(0), _) | (_, Some(0)) => Some(0),
                (Some(_), Some(_)) => Some(1),
                _ => None,
            },
            "||" => match (left, right) {
                (Some(l), _) if l != 0 => Some(1),
                (_, Some(r)) if r != 0 => Some(1),
                (Some(_), Some(_)) => Some(0),
                _ => None,
            },
            _ => {
                let (l, r) = (left?, right?);
                match operator {
                    "==" => Some((l == r) as i64),
                    "!=" => Some((l != r) as i64),
                    "<" => Some((l < r) as i64),
                    ">" => Some((l > r) as i64),
                    "<=" => Some((l <= r) as i64),
                    ">=" => Some((l >= r) as i64),
                    "+" => Some(l.wrapping_add(r)),
                    "-" => Some(l.wrapping_sub(r)),
                    "*" => Some(l.wrapping_mul(r)),
                    "/" => l.checked_div(r),
                    "%" => l.checked_rem(r),
                    "&" => Some(l & r),
                    "|" => Some(l | r),
                    "^" => Some(l ^ r),
                    "<<" => u32::try_from(r).ok().and_then(|s| l.checked_shl(s)),
                    ">>" => u32::try_from(r).ok().and_then(|s| l.checked_shr(s)),
                    _ => None,
                }
            }
        }
    }
}

impl From<&BTreeMap<String, Option<String>>> for MacroTable {
    fn from(defines: &BTreeMap<String, Option<String>>) -> Self {
        Self {
            macros: defines.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }
}

/// Include resolution through the tree-sitter C/C++ grammar.
pub struct PreprocessorStrategy {
    language: Language,
}

impl PreprocessorStrategy {
    /// Fails with `BackendUnavailable` when the grammar cannot be loaded.
    pub fn new() -> Result<Self> {
        let strategy = Self {
            language: tree_sitter_cpp::LANGUAGE.into(),
        };
        strategy.parser()?;
        Ok(strategy)
    }

    fn parser(&self) -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| ContextError::BackendUnavailable(e.to_string()))?;
        Ok(parser)
    }
}

impl IncludeResolutionStrategy for PreprocessorStrategy {
    fn name(&self) -> &'static str {
        "precise"
    }

    fn resolve(&self, source: &Path, request: &IncludeRequest) -> Result<IncludeSet> {
        let mut walk = PreprocessorWalk {
            parser: self.parser()?,
            request,
            macros: MacroTable::from(&request.defines),
            set: IncludeSet::default(),
            visited: HashSet::new(),
            deadline: request.timeout.map(|t| Instant::now() + t),
        };
        walk.visit_file(source, true)?;
        Ok(walk.set)
    }
}

struct PreprocessorWalk<'r> {
    parser: Parser,
    request: &'r IncludeRequest,
    macros: MacroTable,
    set: IncludeSet,
    visited: HashSet<PathBuf>,
    deadline: Option<Instant>,
}

impl PreprocessorWalk<'_> {
    fn visit_file(&mut self, path: &Path, root: bool) -> Result<()> {
        if let (Some(deadline), Some(timeout)) = (self.deadline, self.request.timeout) {
            if Instant::now() >= deadline {
                return Err(ContextError::BackendTimeout {
                    file: path.to_path_buf(),
                    timeout,
                });
            }
        }

        let canonical = normalize_path(path);
        if !self.visited.insert(canonical.clone()) {
            return Ok(());
        }

        let source = match std::fs::read(&canonical) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if root => return Err(e.into()),
            Err(e) => {
                tracing::debug!("Skipping unreadable header {}: {}", canonical.display(), e);
                return Ok(());
            }
        };

        let tree = self.parser.parse(&source, None).ok_or_else(|| {
            ContextError::BackendUnavailable(format!("no parse tree for {}", canonical.display()))
        })?;
        let dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();

        self.visit_node(tree.root_node(), source.as_bytes(), &dir)
    }

    fn visit_node(&mut self, node: Node<'_>, source: &[u8], dir: &Path) -> Result<()> {
        match node.kind() {
            "preproc_include" => self.visit_include(node, source, dir),
            "preproc_def" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let value = node
                        .child_by_field_name("value")
                        .map(|v| node_text(v, source).trim().to_string());
                    self.macros.define(node_text(name, source), value);
                }
                Ok(())
            }
            "preproc_function_def" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.macros.define(node_text(name, source), None);
                }
                Ok(())
            }
            "preproc_call" => {
                let directive: String = node
                    .child_by_field_name("directive")
                    .map(|d| node_text(d, source))
                    .unwrap_or("")
                    .split_whitespace()
                    .collect();
                if directive == "#undef" {
                    let argument = node
                        .child_by_field_name("argument")
                        .map(|a| node_text(a, source))
                        .unwrap_or("");
                    if let Some(name) = argument.split_whitespace().next() {
                        self.macros.undefine(name);
                    }
                }
                Ok(())
            }
            "preproc_if" | "preproc_ifdef" | "preproc_elif" | "preproc_elifdef" => {
                self.visit_conditional(node, source, dir)
            }
            "comment" | "string_literal" | "char_literal" | "number_literal" => Ok(()),
            _ => self.visit_children(node, source, dir, &[]),
        }
    }

    fn visit_children(&mut self, node: Node<'_>, source: &[u8], dir: &Path, skip: &[usize]) -> Result<()> {
        let children: Vec<Node<'_>> = {
            let mut cursor = node.walk();
            node.named_children(&mut cursor)
                .filter(|c| !skip.contains(&c.id()))
                .collect()
        };
        for child in children {
            self.visit_node(child, source, dir)?;
        }
        Ok(())
    }

    fn visit_conditional(&mut self, node: Node<'_>, source: &[u8], dir: &Path) -> Result<()> {
        let name = node.child_by_field_name("name");
        let condition = node.child_by_field_name("condition");
        let alternative = node.child_by_field_name("alternative");

        let taken = match (name, condition) {
            (Some(name), _) => {
                let negated = {
                    let mut cursor = node.walk();
                    let first = node.children(&mut cursor).next();
                    first.is_some_and(|t| t.kind().ends_with("ndef"))
                };
                Some(self.macros.is_defined(node_text(name, source)) != negated)
            }
            (None, Some(condition)) => self.macros.evaluate(condition, source).map(|v| v != 0),
            (None, None) => None,
        };

        let skip: Vec<usize> = [name, condition, alternative]
            .into_iter()
            .flatten()
            .map(|n| n.id())
            .collect();

        match taken {
            Some(true) => self.visit_children(node, source, dir, &skip),
            Some(false) => match alternative {
                Some(alternative) => self.visit_node(alternative, source, dir),
                None => Ok(()),
            },
            None => {
                tracing::trace!("Undecidable condition in {}, keeping all branches", dir.display());
                self.visit_children(node, source, dir, &skip)?;
                if let Some(alternative) = alternative {
                    self.visit_node(alternative, source, dir)?;
                }
                Ok(())
            }
        }
    }

    fn visit_include(&mut self, node: Node<'_>, source: &[u8], dir: &Path) -> Result<()> {
        let Some(path) = node.child_by_field_name("path") else {
            return Ok(());
        };
        let raw = node_text(path, source);
        let (name, system) = match path.kind() {
            "string_literal" => (raw.trim_matches('"'), false),
            "system_lib_string" => (raw.trim_start_matches('<').trim_end_matches('>'), true),
            _ => return Ok(()),
        };
        if name.is_empty() {
            return Ok(());
        }

        let request = self.request;
        let search_dirs = request.include_dirs.iter().map(PathBuf::as_path);
        let found = if system {
            find_in(name, search_dirs.chain(request.header_root.as_deref()))
        } else {
            find_in(
                name,
                std::iter::once(dir)
                    .chain(search_dirs)
                    .chain(std::iter::once(request.project_root.as_path()))
                    .chain(request.header_root.as_deref()),
            )
        };

        match found {
            Some(header) => {
                self.set.record_resolved(name, header.clone());
                self.visit_file(&header, false)
            }
            None => {
                self.set.record_unresolved(name, system);
                Ok(())
            }
        }
    }
}
