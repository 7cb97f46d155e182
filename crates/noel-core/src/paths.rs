//! Well-known locations: the live job database, its backups, the working
//! copy and the updater config file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::debug;

use crate::config::{DatabaseConfig, UpdaterConfig};
use crate::error::NoelError;

/// Timestamp layout embedded in backup file names.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H%M%S";

/// Suffix shared by every backup file.
pub const BACKUP_SUFFIX: &str = ".noel.bak";

/// Computes noel's paths from configuration and the application data
/// directory captured at construction.
#[derive(Debug, Clone)]
pub struct PathResolver {
    database: DatabaseConfig,
    updater: UpdaterConfig,
    app_data: Option<PathBuf>,
}

impl PathResolver {
    /// Build a resolver reading the configured application data variable from
    /// the process environment.
    pub fn from_env(database: DatabaseConfig, updater: UpdaterConfig) -> Self {
        let app_data = std::env::var_os(&database.app_data_var)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self::with_app_data(database, updater, app_data)
    }

    /// Build a resolver with an explicit application data directory.
    ///
    /// `None` behaves like an unset environment variable.
    pub fn with_app_data(
        database: DatabaseConfig,
        updater: UpdaterConfig,
        app_data: Option<PathBuf>,
    ) -> Self {
        Self {
            database,
            updater,
            app_data,
        }
    }

    pub fn database_config(&self) -> &DatabaseConfig {
        &self.database
    }

    /// Ketarin's profile directory holding the live database and its backups.
    pub fn database_dir(&self) -> Result<PathBuf, NoelError> {
        let app_data = self
            .app_data
            .as_ref()
            .ok_or_else(|| NoelError::Environment {
                var: self.database.app_data_var.clone(),
            })?;
        Ok(app_data.join(&self.database.app_dir_name))
    }

    /// `<app data>/<app dir>/<database file>`
    pub fn live_database_path(&self) -> Result<PathBuf, NoelError> {
        let path = self.database_dir()?.join(&self.database.file_name);
        debug!("Live database path: {:?}", path);
        Ok(path)
    }

    /// `<app data>/<app dir>/<database file>_<YYYY-MM-DD-HHMMSS>.noel.bak`
    pub fn backup_path(&self, now: &NaiveDateTime) -> Result<PathBuf, NoelError> {
        Ok(self.database_dir()?.join(self.backup_file_name(now)))
    }

    pub fn backup_file_name(&self, now: &NaiveDateTime) -> OsString {
        OsString::from(format!(
            "{}_{}{}",
            self.database.file_name,
            now.format(BACKUP_TIMESTAMP_FORMAT),
            BACKUP_SUFFIX
        ))
    }

    /// Recover the timestamp from a backup file name, if it is one of ours.
    pub fn parse_backup_file_name(&self, file_name: &str) -> Option<NaiveDateTime> {
        let stamp = file_name
            .strip_prefix(self.database.file_name.as_str())?
            .strip_prefix('_')?
            .strip_suffix(BACKUP_SUFFIX)?;
        NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT).ok()
    }

    /// Working copy location; relative to the current directory unless a
    /// working directory is configured.
    pub fn working_copy_path(&self) -> PathBuf {
        match &self.database.working_dir {
            Some(dir) => dir.join(&self.database.file_name),
            None => PathBuf::from(&self.database.file_name),
        }
    }

    pub fn updater_config_path(&self) -> &Path {
        &self.updater.config_path
    }
}
