//! Configuration for noel.
//!
//! Every location noel touches (the Ketarin profile directory, the job
//! database name, the chocopkgup config file, the Ketarin executable) comes
//! from here rather than from compiled-in literals, so tests can point the
//! whole system at a temporary directory.
//!
//! # Configuration File Locations
//!
//! - Unix: `~/.config/noel/noel.toml`
//! - Windows: `%APPDATA%\noel\config\noel.toml`
//!
//! # Example TOML
//!
//! ```toml
//! [database]
//! app_data_var = "APPDATA"
//! app_dir_name = "Ketarin"
//! file_name = "jobs.db"
//!
//! [updater]
//! config_path = 'C:\tools\ChocolateyPackageUpdater\chocopkgup.exe.config'
//! packages_folder_key = "PackagesFolder"
//!
//! [ketarin]
//! executable = "ketarin"
//! process_name = "ketarin"
//!
//! [logging]
//! level = "warn"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Top-level noel configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoelConfig {
    /// Ketarin job database location
    #[serde(default)]
    pub database: DatabaseConfig,

    /// chocopkgup configuration file
    #[serde(default)]
    pub updater: UpdaterConfig,

    /// Ketarin executable and its files
    #[serde(default)]
    pub ketarin: KetarinConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the live job database is and where the working copy goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Environment variable holding the per-user application data directory
    #[serde(default = "default_app_data_var")]
    pub app_data_var: String,

    /// Ketarin's directory name under the application data directory
    #[serde(default = "default_app_dir_name")]
    pub app_dir_name: String,

    /// Job database file name
    #[serde(default = "default_database_file_name")]
    pub file_name: String,

    /// Directory for the working copy (empty = current directory)
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

fn default_app_data_var() -> String {
    "APPDATA".to_string()
}

fn default_app_dir_name() -> String {
    "Ketarin".to_string()
}

fn default_database_file_name() -> String {
    "jobs.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            app_data_var: default_app_data_var(),
            app_dir_name: default_app_dir_name(),
            file_name: default_database_file_name(),
            working_dir: None,
        }
    }
}

/// The chocopkgup XML configuration noel patches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Path to `chocopkgup.exe.config`
    #[serde(default = "default_updater_config_path")]
    pub config_path: PathBuf,

    /// Setting key holding the packages folder
    #[serde(default = "default_packages_folder_key")]
    pub packages_folder_key: String,
}

fn default_updater_config_path() -> PathBuf {
    PathBuf::from(r"C:\tools\ChocolateyPackageUpdater\chocopkgup.exe.config")
}

fn default_packages_folder_key() -> String {
    "PackagesFolder".to_string()
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            config_path: default_updater_config_path(),
            packages_folder_key: default_packages_folder_key(),
        }
    }
}

/// How Ketarin is launched and waited on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KetarinConfig {
    /// Executable to spawn (resolved through PATH)
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Process name passed to the wait helper
    #[serde(default = "default_process_name")]
    pub process_name: String,

    /// Settings file expected in each package directory
    #[serde(default = "default_setting_file_name")]
    pub setting_file_name: String,

    /// Log file name inside the per-run scratch directory
    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,

    /// Prefix of the per-run scratch directory
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,
}

fn default_executable() -> String {
    "ketarin".to_string()
}

fn default_process_name() -> String {
    "ketarin".to_string()
}

fn default_setting_file_name() -> String {
    "Ketarin.xml".to_string()
}

fn default_log_file_name() -> String {
    "ketarin.log".to_string()
}

fn default_temp_prefix() -> String {
    "nodel".to_string()
}

impl Default for KetarinConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            process_name: default_process_name(),
            setting_file_name: default_setting_file_name(),
            log_file_name: default_log_file_name(),
            temp_prefix: default_temp_prefix(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl NoelConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: NoelConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location, or defaults if there is none
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from custom path or default
    pub fn load_from(custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = custom_path {
            Self::load(path)
        } else {
            Self::load_default()
        }
    }

    /// Get default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "noel")
            .map(|dirs| dirs.config_dir().join("noel.toml"))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_empty("database.app_data_var", &self.database.app_data_var)?;
        bare_file_name("database.app_dir_name", &self.database.app_dir_name)?;
        bare_file_name("database.file_name", &self.database.file_name)?;

        if self.updater.config_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "updater.config_path must not be empty".to_string(),
            ));
        }
        non_empty("updater.packages_folder_key", &self.updater.packages_folder_key)?;

        non_empty("ketarin.executable", &self.ketarin.executable)?;
        non_empty("ketarin.process_name", &self.ketarin.process_name)?;
        bare_file_name("ketarin.setting_file_name", &self.ketarin.setting_file_name)?;
        bare_file_name("ketarin.log_file_name", &self.ketarin.log_file_name)?;
        bare_file_name("ketarin.temp_prefix", &self.ketarin.temp_prefix)?;

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Valid values: {:?}",
                self.logging.level, valid_levels
            )));
        }

        Ok(())
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

fn bare_file_name(field: &str, value: &str) -> Result<(), ConfigError> {
    non_empty(field, value)?;
    if value.contains(|c| c == '/' || c == '\\') || value == "." || value == ".." {
        return Err(ConfigError::ValidationError(format!(
            "{field} must be a bare file name, got '{value}'"
        )));
    }
    Ok(())
}
