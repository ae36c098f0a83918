//! Context assembly
//!
//! Merges a function fact, its header closure and its compiler settings into
//! one bounded payload for a test generation backend.

pub mod generation;
pub mod normalize;
pub mod render;

pub use generation::{request_tests, strip_code_fence, GenerationBackend, GenerationParams};
pub use normalize::{normalize_header, truncate_at_line, TRUNCATION_MARKER};
pub use render::{header_banner, CALLS_BANNER, METADATA_BANNER, SIGNATURE_BANNER, SOURCE_BANNER};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analyzer::{
    include_directives, locate_definition, parse_parameters, CallGraphExtractor, FunctionFact,
    FunctionStore,
};
use crate::build::{BuildConfig, BuildDatabase, OptimizationLevel};
use crate::error::{ContextError, Result, Warning, WarningKind};
use crate::include::IncludeResolver;
use crate::paths::relative_label;

pub const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1024;
pub const DEFAULT_MAX_CONTEXT_BYTES: usize = 256 * 1024;

/// Size limits applied while assembling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    /// Longer headers are truncated at a line boundary
    pub max_header_bytes: usize,
    /// Headers that would exceed this are left out
    pub max_context_bytes: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_context_bytes: DEFAULT_MAX_CONTEXT_BYTES,
        }
    }
}

/// Normalised text of one resolved header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderText {
    /// Name as written in the `#include`
    pub name: String,
    /// Project-relative path, used as the section label
    pub label: String,
    pub path: PathBuf,
    pub text: String,
    pub truncated: bool,
}

/// Compiler settings of the translation unit defining the function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetadata {
    pub c_standard: Option<String>,
    pub cxx_standard: Option<String>,
    pub optimization_level: OptimizationLevel,
    pub defines: BTreeMap<String, Option<String>>,
    pub include_dirs: Vec<PathBuf>,
    pub warning_flags: BTreeSet<String>,
}

impl From<&BuildConfig> for BuildMetadata {
    fn from(config: &BuildConfig) -> Self {
        Self {
            c_standard: config.c_standard.clone(),
            cxx_standard: config.cxx_standard.clone(),
            optimization_level: config.optimization_level,
            defines: config.defines.clone(),
            include_dirs: config.resolved_include_dirs(),
            warning_flags: config.warning_flags.clone(),
        }
    }
}

/// Everything a generation backend gets to see about one function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    /// Fact rebuilt from the current file contents
    pub function: FunctionFact,
    pub signature: String,
    /// Definition text, return type through closing brace
    pub source: String,
    /// Body text, braces included
    pub body: String,
    pub external_calls: Vec<String>,
    pub headers: Vec<HeaderText>,
    pub system_headers: Vec<String>,
    pub unresolved_headers: Vec<String>,
    pub build: Option<BuildMetadata>,
    /// Include strategy that produced `headers`
    pub strategy: String,
    pub warnings: Vec<Warning>,
}

impl AssembledContext {
    pub fn render(&self) -> String {
        render::render(self)
    }

    /// Bytes of source and header text carried.
    pub fn payload_bytes(&self) -> usize {
        self.source.len() + self.headers.iter().map(|h| h.text.len()).sum::<usize>()
    }
}

/// Builds [`AssembledContext`]s from a scan result and a build database.
pub struct ContextAssembler<'a> {
    functions: &'a FunctionStore,
    builds: &'a BuildDatabase,
    resolver: &'a IncludeResolver,
    budget: ContextBudget,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(functions: &'a FunctionStore, builds: &'a BuildDatabase, resolver: &'a IncludeResolver) -> Self {
        Self {
            functions,
            builds,
            resolver,
            budget: ContextBudget::default(),
        }
    }

    pub fn with_budget(mut self, budget: ContextBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Assembles the context of `function_name`.
    ///
    /// The definition is read again from its file so the payload matches
    /// the current text. Fails with `FunctionNotFound` when the name is not
    /// in the scan result or no longer defined in its file.
    pub fn assemble(&self, function_name: &str) -> Result<AssembledContext> {
        let fact = self
            .functions
            .get(function_name)
            .ok_or_else(|| ContextError::FunctionNotFound(function_name.to_string()))?;

        let bytes = std::fs::read(&fact.source_file)?;
        let source = String::from_utf8_lossy(&bytes);

        let definition = locate_definition(&source, function_name)
            .ok_or_else(|| ContextError::FunctionNotFound(function_name.to_string()))?;
        let text = definition
            .text(&source)
            .ok_or_else(|| ContextError::UnbalancedBody {
                function: function_name.to_string(),
                file: fact.source_file.clone(),
            })?;
        let body = &text[definition.open_brace - definition.start..];

        let function = FunctionFact {
            name: fact.name.clone(),
            return_type: definition.return_type.clone(),
            parameters: parse_parameters(&definition.raw_params),
            external_calls: CallGraphExtractor::new().extract(body),
            source_file: fact.source_file.clone(),
            declared_includes: include_directives(&source).into_iter().map(|d| d.name).collect(),
            line: definition.line(&source),
        };

        let config = self.builds.get(&fact.source_file);
        let resolution = self.resolver.resolve(&fact.source_file, config);
        let mut warnings = resolution.warnings;

        let mut used = text.len();
        let mut headers = Vec::new();
        for (path, name) in &resolution.includes.paths {
            let label = relative_label(self.resolver.project_root(), path);
            if let Some(header) = self.load_header(name, label, path, &mut used, &mut warnings) {
                headers.push(header);
            }
        }

        tracing::info!(
            "Assembled context for {}: {} headers, {} calls, strategy {}",
            function.name,
            headers.len(),
            function.external_calls.len(),
            resolution.strategy
        );

        Ok(AssembledContext {
            signature: function.signature(),
            source: text.to_string(),
            body: body.to_string(),
            external_calls: function.external_calls.iter().cloned().collect(),
            headers,
            system_headers: resolution.includes.system.iter().cloned().collect(),
            unresolved_headers: resolution
                .includes
                .unresolved()
                .into_iter()
                .map(String::from)
                .collect(),
            build: config.map(BuildMetadata::from),
            strategy: resolution.strategy.to_string(),
            warnings,
            function,
        })
    }

    fn load_header(
        &self,
        name: &str,
        label: String,
        path: &Path,
        used: &mut usize,
        warnings: &mut Vec<Warning>,
    ) -> Option<HeaderText> {
        let raw = match std::fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::warn!("Cannot read header {}: {}", path.display(), e);
                warnings.push(Warning::new(WarningKind::HeaderUnreadable, label, e.to_string()));
                return None;
            }
        };

        let (text, truncated) = truncate_at_line(&normalize_header(&raw), self.budget.max_header_bytes);
        if *used + text.len() > self.budget.max_context_bytes {
            tracing::warn!("Leaving out header {}: context budget exhausted", label);
            warnings.push(Warning::new(
                WarningKind::HeaderOmitted,
                label,
                format!(
                    "{} bytes would exceed the {} byte context limit",
                    text.len(),
                    self.budget.max_context_bytes
                ),
            ));
            return None;
        }
        *used += text.len();

        Some(HeaderText {
            name: name.to_string(),
            label,
            path: path.to_path_buf(),
            text,
            truncated,
        })
    }
}
