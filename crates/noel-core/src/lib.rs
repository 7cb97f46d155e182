//! # noel-core
//!
//! Unattended package-update plumbing around Ketarin.
//!
//! This crate handles:
//! - Swapping Ketarin's job database out before a run and restoring it after
//! - Timestamped write-once backups of the live database
//! - Patching a single `appSettings` value in chocopkgup's `.exe.config`
//!   without disturbing the rest of the document
//! - Launching Ketarin and waiting for it to exit
//!
//! ## Data safety
//!
//! - The live database is read once per swap and never modified by a swap
//! - Backups are created exclusively and never overwritten
//! - Restores and config patches replace their target through a temp file
//!   renamed over it, so a failed write leaves the old content in place

pub mod app_config;
pub mod clock;
pub mod config;
pub mod error;
mod fsutil;
pub mod paths;
pub mod process;
#[cfg(test)]
mod proptests;
pub mod swap;
pub mod xml_doc;

pub use app_config::{set_setting_value, AppConfig, PatchOutcome, Setting, SupportedRuntime};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    ConfigError, DatabaseConfig, KetarinConfig, LoggingConfig, NoelConfig, UpdaterConfig,
};
pub use error::{ErrorKind, NoelError};
pub use paths::PathResolver;
pub use process::{
    CommandRunner, KetarinDriver, PowerShellWaiter, ProcessWaiter, RunReport,
    SystemCommandRunner,
};
pub use swap::{BackupInfo, DatabaseSwap, RestoreOutcome, SwapOutcome};
