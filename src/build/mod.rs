//! Build log analysis
//!
//! Turns a `compile_commands.json` style build log into per-file compiler
//! configuration: include dirs, macro definitions, language standards,
//! optimisation level and warning flags.

pub mod flags;
pub mod parser;

pub use flags::{extract_flags, split_command_line, Flag, FlagSet};
pub use parser::{BuildConfigParser, RawEntry};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::paths::{absolutize, normalize_path};

/// Optimisation level, normalised across compiler dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OptimizationLevel {
    O0,
    O1,
    #[default]
    O2,
    O3,
    Os,
}

impl OptimizationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationLevel::O0 => "O0",
            OptimizationLevel::O1 => "O1",
            OptimizationLevel::O2 => "O2",
            OptimizationLevel::O3 => "O3",
            OptimizationLevel::Os => "Os",
        }
    }

    /// Maps a GCC flag without its leading `-` (`O3`, `Os`, bare `O`).
    pub fn from_gcc(flag: &str) -> Option<Self> {
        match flag {
            "O0" => Some(OptimizationLevel::O0),
            "O" | "O1" => Some(OptimizationLevel::O1),
            "O2" => Some(OptimizationLevel::O2),
            "O3" => Some(OptimizationLevel::O3),
            "Os" => Some(OptimizationLevel::Os),
            _ => None,
        }
    }

    /// Maps an MSVC flag without its leading `/` (`Od`, `Ox`, `O1`, `O2`).
    pub fn from_msvc(flag: &str) -> Option<Self> {
        match flag {
            "Od" => Some(OptimizationLevel::O0),
            "O1" => Some(OptimizationLevel::O1),
            "O2" | "Ox" => Some(OptimizationLevel::O2),
            _ => None,
        }
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalised compiler invocation for one translation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Source file as written in the build log
    pub file: PathBuf,
    /// Working directory of the compiler invocation
    pub directory: PathBuf,
    pub raw_command: String,
    /// Normalised include dirs, first occurrence order
    pub include_dirs: Vec<String>,
    /// Macro name to value; `None` for `-DNAME`
    pub defines: BTreeMap<String, Option<String>>,
    pub c_standard: Option<String>,
    pub cxx_standard: Option<String>,
    pub optimization_level: OptimizationLevel,
    pub warning_flags: BTreeSet<String>,
}

impl BuildConfig {
    /// Absolute path of the compiled file.
    pub fn source_path(&self) -> PathBuf {
        absolutize(&self.directory, &self.file)
    }

    /// Include dirs made absolute against the invocation directory.
    pub fn resolved_include_dirs(&self) -> Vec<PathBuf> {
        self.include_dirs
            .iter()
            .map(|dir| absolutize(&self.directory, Path::new(dir)))
            .collect()
    }

    /// The data a build/test runner needs to compile against this unit.
    pub fn compile_environment(&self) -> CompileEnvironment {
        CompileEnvironment {
            include_dirs: self.resolved_include_dirs(),
            defines: self.defines.clone(),
            c_standard: self.c_standard.clone(),
        }
    }
}

/// Plain compile settings handed to an external build/test runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileEnvironment {
    pub include_dirs: Vec<PathBuf>,
    pub defines: BTreeMap<String, Option<String>>,
    pub c_standard: Option<String>,
}

impl CompileEnvironment {
    /// Renders the settings as GCC-style flags.
    pub fn to_gcc_flags(&self) -> Vec<String> {
        let mut flags: Vec<String> = self
            .include_dirs
            .iter()
            .map(|dir| format!("-I{}", dir.display()))
            .collect();
        flags.extend(self.defines.iter().map(|(name, value)| match value {
            Some(value) => format!("-D{}={}", name, value),
            None => format!("-D{}", name),
        }));
        if let Some(std) = &self.c_standard {
            flags.push(format!("-std={}", std));
        }
        flags
    }
}

/// `source file -> BuildConfig` map for a whole build log.
///
/// Keys are normalised absolute paths; the last log entry for a file wins.
#[derive(Debug, Clone, Default)]
pub struct BuildDatabase {
    configs: BTreeMap<PathBuf, BuildConfig>,
}

impl BuildDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(log_path: &Path) -> Result<Self> {
        let entries = BuildConfigParser::load(log_path)?;
        Ok(Self::from_entries(&entries))
    }

    pub fn from_entries(entries: &[RawEntry]) -> Self {
        let mut db = Self::new();
        for entry in entries.iter().filter(|e| !e.file.is_empty()) {
            db.insert(BuildConfigParser::parse_entry(entry));
        }
        db
    }

    pub fn insert(&mut self, config: BuildConfig) {
        let key = normalize_path(&config.source_path());
        self.configs.insert(key, config);
    }

    /// Looks up the configuration compiling `source`.
    pub fn get(&self, source: &Path) -> Option<&BuildConfig> {
        self.configs.get(&normalize_path(source))
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &BuildConfig)> {
        self.configs.iter()
    }

    pub fn source_files(&self) -> Vec<PathBuf> {
        self.configs.keys().cloned().collect()
    }

    /// Union of the include dirs of every entry.
    pub fn all_include_dirs(&self) -> BTreeSet<String> {
        self.configs
            .values()
            .flat_map(|c| c.include_dirs.iter().cloned())
            .collect()
    }

    /// Union of the macro definitions of every entry; later files override.
    pub fn all_defines(&self) -> BTreeMap<String, Option<String>> {
        let mut defines = BTreeMap::new();
        for config in self.configs.values() {
            defines.extend(config.defines.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        defines
    }
}
