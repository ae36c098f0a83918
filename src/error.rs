use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Build log not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Malformed build log {}: {message}", path.display())]
    ConfigFormat { path: PathBuf, message: String },

    #[error("Invalid settings: {0}")]
    Settings(String),

    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Unbalanced body for {function} in {}", file.display())]
    UnbalancedBody { function: String, file: PathBuf },

    #[error("Include backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Include backend timed out after {timeout:?} on {}", file.display())]
    BackendTimeout { file: PathBuf, timeout: Duration },

    #[error("Generation backend failed: {0}")]
    Generation(String),
}

pub type Result<T> = std::result::Result<T, ContextError>;

/// Category of a non-fatal problem attached to one file, function or header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    FileUnreadable,
    UnbalancedBody,
    BuildLogUnavailable,
    BackendDegraded,
    HeaderUnreadable,
    HeaderOmitted,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::FileUnreadable => "file_unreadable",
            WarningKind::UnbalancedBody => "unbalanced_body",
            WarningKind::BuildLogUnavailable => "build_log_unavailable",
            WarningKind::BackendDegraded => "backend_degraded",
            WarningKind::HeaderUnreadable => "header_unreadable",
            WarningKind::HeaderOmitted => "header_omitted",
        }
    }
}

/// A skipped or degraded item, reported to the caller instead of failing the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// File, function or header the warning is about
    pub subject: String,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Builds a warning from an error, picking the kind from the error variant.
    pub fn from_error(subject: impl Into<String>, err: &ContextError) -> Self {
        let kind = match err {
            ContextError::UnbalancedBody { .. } => WarningKind::UnbalancedBody,
            ContextError::ConfigNotFound(_) | ContextError::ConfigFormat { .. } => {
                WarningKind::BuildLogUnavailable
            }
            ContextError::BackendUnavailable(_) | ContextError::BackendTimeout { .. } => {
                WarningKind::BackendDegraded
            }
            _ => WarningKind::FileUnreadable,
        };
        Self::new(kind, subject, err.to_string())
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.as_str(), self.subject, self.message)
    }
}
