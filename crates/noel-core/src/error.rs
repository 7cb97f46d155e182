//! Error types for database swapping, config patching and process driving.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during noel operations.
#[derive(Debug, Error)]
pub enum NoelError {
    /// A required environment variable is not set
    #[error("environment variable {var} is not set")]
    Environment { var: String },

    /// Open, read, write or delete failed on a path
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The updater configuration document is malformed
    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// The named key is absent from the settings list
    #[error("setting {key:?} not found in {}", .path.display())]
    SettingNotFound { key: String, path: PathBuf },

    /// An external process failed to launch or exited unsuccessfully
    #[error("process {program} failed: {message}")]
    Process { program: String, message: String },

    /// The tool's own configuration is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Coarse classification of [`NoelError`], used for exit codes and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Environment,
    Io,
    Parse,
    SettingNotFound,
    Process,
    Config,
}

impl NoelError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        NoelError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn parse(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        NoelError::Parse {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub(crate) fn process(program: impl Into<String>, message: impl Into<String>) -> Self {
        NoelError::Process {
            program: program.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NoelError::Environment { .. } => ErrorKind::Environment,
            NoelError::Io { .. } => ErrorKind::Io,
            NoelError::Parse { .. } => ErrorKind::Parse,
            NoelError::SettingNotFound { .. } => ErrorKind::SettingNotFound,
            NoelError::Process { .. } => ErrorKind::Process,
            NoelError::Config(_) => ErrorKind::Config,
        }
    }

    /// True when the underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            NoelError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
