//! C source analysis
//!
//! Locates top-level function definitions, their parameters, bodies and
//! outbound call sets, and collects them into a [`FunctionStore`].

pub mod calls;
pub mod lexical;
pub mod scanner;
pub mod walker;

pub use calls::{is_likely_macro, CallGraphExtractor, EXCLUDED_CALLEES};
pub use scanner::{
    extract_body, include_directives, locate_definition, parse_parameters, scan_source,
    Definition, FileScan, IncludeDirective, SourceScanner,
};
pub use walker::SourceWalker;

use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One `(type, name)` entry of a parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(rename = "type")]
    pub ty: String,
    pub name: String,
}

impl Parameter {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
        }
    }
}

/// A discovered C function definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionFact {
    pub name: String,
    /// Raw return type text, pointer stars included
    pub return_type: String,
    /// Empty for `()` and `(void)`
    pub parameters: Vec<Parameter>,
    /// Identifiers invoked in the body
    pub external_calls: BTreeSet<String>,
    pub source_file: PathBuf,
    /// `#include` targets of the whole translation unit
    pub declared_includes: BTreeSet<String>,
    /// 1-based line of the definition
    pub line: usize,
}

impl FunctionFact {
    /// Renders `return_type name(type name, ...)`.
    pub fn signature(&self) -> String {
        let params = if self.parameters.is_empty() {
            "void".to_string()
        } else {
            self.parameters
                .iter()
                .map(|p| format!("{} {}", p.ty, p.name))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let sep = if self.return_type.ends_with('*') { "" } else { " " };
        format!("{}{}{}({})", self.return_type, sep, self.name, params)
    }
}

/// Owned map of function facts with first-writer-wins insertion.
#[derive(Debug, Clone, Default)]
pub struct FunctionStore {
    functions: BTreeMap<String, FunctionFact>,
}

impl FunctionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `fact` unless a function with the same name is already stored.
    ///
    /// Returns `true` when the fact was inserted.
    pub fn insert_if_absent(&mut self, fact: FunctionFact) -> bool {
        match self.functions.entry(fact.name.clone()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(fact);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&FunctionFact> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn all(&self) -> &BTreeMap<String, FunctionFact> {
        &self.functions
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
