//! Engine settings
//!
//! Built-in defaults, overridden by a `.ctest-context.toml` in the project
//! root (or an explicit file), overridden by command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::{ContextBudget, DEFAULT_MAX_CONTEXT_BYTES, DEFAULT_MAX_HEADER_BYTES};
use crate::error::{ContextError, Result};
use crate::include::StrategyMode;
use crate::paths::absolutize;

pub const CONFIG_FILE_NAME: &str = ".ctest-context.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub project_root: PathBuf,
    /// Header tree, relative to the project root
    pub include_dir: PathBuf,
    /// Translation unit tree, relative to the project root
    pub src_dir: PathBuf,
    /// Build log, relative to the project root
    pub compile_commands: PathBuf,
    pub recursive: bool,
    pub strategy: StrategyMode,
    /// 0 disables the limit
    pub backend_timeout_ms: u64,
    pub max_header_bytes: usize,
    pub max_context_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            include_dir: PathBuf::from("include"),
            src_dir: PathBuf::from("src"),
            compile_commands: PathBuf::from("build/compile_commands.json"),
            recursive: false,
            strategy: StrategyMode::Auto,
            backend_timeout_ms: 5000,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_context_bytes: DEFAULT_MAX_CONTEXT_BYTES,
        }
    }
}

impl EngineConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Default::default()
        }
    }

    /// Parses a settings file. Fields left out keep their defaults.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| ContextError::Settings(format!("{}: {}", origin.display(), e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ContextError::Settings(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&text, path)?;
        if config.project_root.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.project_root = absolutize(base, &config.project_root);
        }
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(config)
    }

    /// Finds the settings for a run.
    ///
    /// `explicit` must exist when given. Otherwise `.ctest-context.toml` in
    /// the project root is used when present, defaults when not. A
    /// `project_root` argument overrides the one in the file.
    pub fn discover(project_root: Option<&Path>, explicit: Option<&Path>) -> Result<Self> {
        let base = project_root.unwrap_or_else(|| Path::new("."));
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let candidate = base.join(CONFIG_FILE_NAME);
                if candidate.is_file() {
                    Self::load(&candidate)?
                } else {
                    Self::default()
                }
            }
        };
        if let Some(root) = project_root {
            config.project_root = root.to_path_buf();
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_header_bytes == 0 {
            return Err(ContextError::Settings("max_header_bytes must be positive".to_string()));
        }
        if self.max_context_bytes == 0 {
            return Err(ContextError::Settings("max_context_bytes must be positive".to_string()));
        }
        Ok(())
    }

    pub fn include_root(&self) -> PathBuf {
        absolutize(&self.project_root, &self.include_dir)
    }

    pub fn src_root(&self) -> PathBuf {
        absolutize(&self.project_root, &self.src_dir)
    }

    pub fn compile_commands_path(&self) -> PathBuf {
        absolutize(&self.project_root, &self.compile_commands)
    }

    pub fn backend_timeout(&self) -> Option<Duration> {
        (self.backend_timeout_ms > 0).then(|| Duration::from_millis(self.backend_timeout_ms))
    }

    pub fn budget(&self) -> ContextBudget {
        ContextBudget {
            max_header_bytes: self.max_header_bytes,
            max_context_bytes: self.max_context_bytes,
        }
    }
}

/// Command-line values that take precedence over the settings file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub compile_commands: Option<PathBuf>,
    pub recursive: bool,
    pub strategy: Option<StrategyMode>,
    pub backend_timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut EngineConfig) {
        if let Some(path) = self.compile_commands {
            config.compile_commands = path;
        }
        if self.recursive {
            config.recursive = true;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(timeout) = self.backend_timeout_ms {
            config.backend_timeout_ms = timeout;
        }
    }
}
