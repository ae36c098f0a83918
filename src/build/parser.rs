use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::flags::{extract_flags, split_command_line};
use super::BuildConfig;
use crate::error::{ContextError, Result};

/// One entry of a `compile_commands.json` style build log.
///
/// Unknown fields are ignored. `arguments` is accepted in place of `command`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntry {
    pub file: String,
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub arguments: Option<Vec<String>>,
}

impl RawEntry {
    pub fn new(file: impl Into<String>, directory: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            directory: directory.into(),
            command: Some(command.into()),
            arguments: None,
        }
    }

    /// The full command line, rebuilt from `arguments` when `command` is absent.
    pub fn command_line(&self) -> String {
        match (&self.command, &self.arguments) {
            (Some(command), _) => command.clone(),
            (None, Some(arguments)) => arguments
                .iter()
                .map(|a| {
                    if a.contains(char::is_whitespace) {
                        format!("\"{}\"", a)
                    } else {
                        a.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
            (None, None) => String::new(),
        }
    }

    fn tokens(&self) -> Vec<String> {
        match (&self.command, &self.arguments) {
            (None, Some(arguments)) => arguments.clone(),
            _ => split_command_line(&self.command_line()),
        }
    }
}

/// Reads build logs and turns their entries into [`BuildConfig`]s.
pub struct BuildConfigParser;

impl BuildConfigParser {
    /// Loads the raw entries of a build log.
    ///
    /// Fails with `ConfigNotFound` when the file does not exist and with
    /// `ConfigFormat` when it is not a JSON array of entries.
    pub fn load(log_path: &Path) -> Result<Vec<RawEntry>> {
        if !log_path.exists() {
            return Err(ContextError::ConfigNotFound(log_path.to_path_buf()));
        }

        let content = std::fs::read_to_string(log_path)?;
        let entries: Vec<RawEntry> =
            serde_json::from_str(&content).map_err(|e| ContextError::ConfigFormat {
                path: log_path.to_path_buf(),
                message: e.to_string(),
            })?;

        tracing::info!("Loaded {} compile commands from {}", entries.len(), log_path.display());
        Ok(entries)
    }

    pub fn parse_entry(entry: &RawEntry) -> BuildConfig {
        let flags = extract_flags(&entry.tokens());

        BuildConfig {
            file: PathBuf::from(&entry.file),
            directory: PathBuf::from(&entry.directory),
            raw_command: entry.command_line(),
            include_dirs: flags.include_dirs,
            defines: flags.defines,
            c_standard: flags.c_standard,
            cxx_standard: flags.cxx_standard,
            optimization_level: flags.optimization_level.unwrap_or_default(),
            warning_flags: flags.warning_flags,
        }
    }
}
