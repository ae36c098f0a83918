use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{IncludeRequest, IncludeResolutionStrategy, IncludeSet, PreprocessorStrategy, TextualStrategy};
use crate::build::BuildConfig;
use crate::error::{ContextError, Warning, WarningKind};

/// Which strategy the resolver tries first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyMode {
    /// Precise when the backend loads, textual otherwise
    #[default]
    Auto,
    Precise,
    Fallback,
}

impl StrategyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyMode::Auto => "auto",
            StrategyMode::Precise => "precise",
            StrategyMode::Fallback => "fallback",
        }
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyMode {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(StrategyMode::Auto),
            "precise" => Ok(StrategyMode::Precise),
            "fallback" | "textual" => Ok(StrategyMode::Fallback),
            other => Err(ContextError::Settings(format!(
                "unknown include strategy '{}' (expected auto, precise or fallback)",
                other
            ))),
        }
    }
}

/// Outcome of resolving one translation unit.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub includes: IncludeSet,
    /// Name of the strategy whose result this is
    pub strategy: &'static str,
    pub warnings: Vec<Warning>,
}

/// Resolves header closures with a primary strategy and a textual fallback.
///
/// The primary strategy is fixed at construction. A failure of the primary
/// on one file degrades that file only; the next call tries the primary
/// again.
pub struct IncludeResolver {
    primary: Option<Box<dyn IncludeResolutionStrategy>>,
    fallback: TextualStrategy,
    project_root: PathBuf,
    header_root: Option<PathBuf>,
    timeout: Option<Duration>,
    startup_warnings: Vec<Warning>,
}

impl IncludeResolver {
    pub fn new(project_root: impl Into<PathBuf>, mode: StrategyMode) -> Self {
        let mut startup_warnings = Vec::new();
        let primary: Option<Box<dyn IncludeResolutionStrategy>> = match mode {
            StrategyMode::Fallback => None,
            StrategyMode::Auto | StrategyMode::Precise => match PreprocessorStrategy::new() {
                Ok(strategy) => Some(Box::new(strategy)),
                Err(e) => {
                    tracing::warn!("Precise include backend unavailable, using textual scan: {}", e);
                    startup_warnings.push(Warning::from_error("include resolver", &e));
                    None
                }
            },
        };

        Self {
            primary,
            fallback: TextualStrategy::new(),
            project_root: project_root.into(),
            header_root: None,
            timeout: None,
            startup_warnings,
        }
    }

    /// Uses `strategy` as the primary in place of the built-in one.
    pub fn with_strategy(mut self, strategy: Box<dyn IncludeResolutionStrategy>) -> Self {
        self.primary = Some(strategy);
        self
    }

    pub fn with_header_root(mut self, header_root: impl Into<PathBuf>) -> Self {
        self.header_root = Some(header_root.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Name of the strategy tried first.
    pub fn primary_name(&self) -> &'static str {
        self.primary
            .as_ref()
            .map(|p| p.name())
            .unwrap_or_else(|| self.fallback.name())
    }

    /// Problems found while setting the resolver up.
    pub fn warnings(&self) -> &[Warning] {
        &self.startup_warnings
    }

    /// Computes the header closure of `source`.
    ///
    /// Without a build configuration only the textual scan runs, with no
    /// include dirs and no defines.
    pub fn resolve(&self, source: &Path, config: Option<&BuildConfig>) -> Resolution {
        let mut request = IncludeRequest::new(&self.project_root).with_timeout(self.timeout);
        if let Some(header_root) = &self.header_root {
            request = request.with_header_root(header_root);
        }

        let (Some(primary), Some(config)) = (&self.primary, config) else {
            if let Some(config) = config {
                request = request.with_build_config(config);
            }
            return self.run_fallback(source, &request, Vec::new());
        };

        let request = request.with_build_config(config);
        match primary.resolve(source, &request) {
            Ok(includes) => {
                tracing::debug!(
                    "Resolved {} headers for {} with {}",
                    includes.headers.len(),
                    source.display(),
                    primary.name()
                );
                Resolution {
                    includes,
                    strategy: primary.name(),
                    warnings: Vec::new(),
                }
            }
            Err(e) => {
                tracing::warn!("{} include resolution failed for {}: {}", primary.name(), source.display(), e);
                let warning = Warning::new(
                    WarningKind::BackendDegraded,
                    source.display().to_string(),
                    format!("{} strategy failed, used textual scan: {}", primary.name(), e),
                );
                self.run_fallback(source, &request, vec![warning])
            }
        }
    }

    fn run_fallback(&self, source: &Path, request: &IncludeRequest, mut warnings: Vec<Warning>) -> Resolution {
        let includes = match self.fallback.resolve(source, request) {
            Ok(includes) => includes,
            Err(e) => {
                warnings.push(Warning::from_error(source.display().to_string(), &e));
                IncludeSet::default()
            }
        };
        Resolution {
            includes,
            strategy: self.fallback.name(),
            warnings,
        }
    }
}
