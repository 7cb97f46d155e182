//! noel - operator CLI around Ketarin package runs
//!
//! This crate provides a command-line interface for:
//! - Swapping the Ketarin job database out and back in
//! - Listing database backups
//! - Pointing chocopkgup at a packages folder
//! - Running Ketarin and installing its settings

pub mod cli;
pub mod output;

pub use cli::Cli;
pub use output::{JsonResponse, OutputFormat, OutputFormatter};

use noel_core::{ConfigError, ErrorKind, NoelError};

/// Exit codes for CLI operations
///
/// - 0: Success
/// - 1: General error
/// - 2: Environment error - a required environment variable is unset
/// - 3: I/O error - a file could not be read, written or removed
/// - 4: Parse error - the updater config is malformed
/// - 5: Setting not found - the key is absent from the updater config
/// - 6: Process failed - Ketarin or the wait helper failed
/// - 7: Configuration error - noel's own config file is unusable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    EnvironmentError = 2,
    IoError = 3,
    ParseError = 4,
    SettingNotFound = 5,
    ProcessFailed = 6,
    ConfigError = 7,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<ErrorKind> for ExitCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Environment => ExitCode::EnvironmentError,
            ErrorKind::Io => ExitCode::IoError,
            ErrorKind::Parse => ExitCode::ParseError,
            ErrorKind::SettingNotFound => ExitCode::SettingNotFound,
            ErrorKind::Process => ExitCode::ProcessFailed,
            ErrorKind::Config => ExitCode::ConfigError,
        }
    }
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    /// Classify a command failure. Context added on top of a [`NoelError`]
    /// does not change its code.
    pub fn from_error(error: &anyhow::Error) -> Self {
        if let Some(e) = error.downcast_ref::<NoelError>() {
            return e.kind().into();
        }
        if error.downcast_ref::<ConfigError>().is_some() {
            return ExitCode::ConfigError;
        }
        ExitCode::GeneralError
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::GeneralError => "GENERAL_ERROR",
            ExitCode::EnvironmentError => "ENVIRONMENT_ERROR",
            ExitCode::IoError => "IO_ERROR",
            ExitCode::ParseError => "PARSE_ERROR",
            ExitCode::SettingNotFound => "SETTING_NOT_FOUND",
            ExitCode::ProcessFailed => "PROCESS_FAILED",
            ExitCode::ConfigError => "CONFIG_ERROR",
        }
    }

    /// Get a human-readable description of the exit code
    pub fn description(&self) -> &'static str {
        match self {
            ExitCode::Success => "Operation completed successfully",
            ExitCode::GeneralError => "An unspecified error occurred",
            ExitCode::EnvironmentError => "A required environment variable is not set",
            ExitCode::IoError => "A file could not be read, written or removed",
            ExitCode::ParseError => "The updater configuration is malformed",
            ExitCode::SettingNotFound => "The setting is missing from the updater configuration",
            ExitCode::ProcessFailed => "An external process failed",
            ExitCode::ConfigError => "The noel configuration file is unusable",
        }
    }
}
