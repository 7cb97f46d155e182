//! Output formatting for CLI results
//!
//! Three formats are supported:
//! - Table: Human-readable tables (default)
//! - JSON: Structured JSON for scripting and automation
//! - Quiet: No output, exit codes only

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDateTime;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use noel_core::{BackupInfo, NoelConfig, PatchOutcome, RestoreOutcome, RunReport, SwapOutcome};

use crate::ExitCode;

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Quiet,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "quiet" => Ok(Self::Quiet),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Quiet => write!(f, "quiet"),
        }
    }
}

/// Standard JSON response wrapper
#[derive(Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// ISO 8601 timestamp
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code_name: Option<&'static str>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn success(data: T, command: &str) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: Some(command.to_string()),
            exit_code: None,
            exit_code_name: None,
        }
    }
}

impl JsonResponse<()> {
    pub fn error(message: &str, code: ExitCode) -> JsonResponse<()> {
        JsonResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: None,
            exit_code: Some(code as i32),
            exit_code_name: Some(code.name()),
        }
    }
}

/// Formats command results for the selected output mode
pub struct OutputFormatter {
    format: OutputFormat,
    verbose: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    pub fn format_swap_out(&self, outcome: &SwapOutcome) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut table = property_table();
                table.add_row(vec!["Live Database", &display(&outcome.live)]);
                table.add_row(vec!["Working Copy", &display(&outcome.working)]);
                table.add_row(vec!["Backup", &display(&outcome.backup)]);
                table.add_row(vec!["Size", &format_size(outcome.bytes)]);
                if self.verbose {
                    table.add_row(vec!["SHA-256", &outcome.sha256]);
                }
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(&SwapOutOutput::from(outcome), "swap-out"),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_restore(&self, outcome: &RestoreOutcome) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut table = property_table();
                table.add_row(vec!["Live Database", &display(&outcome.live)]);
                table.add_row(vec!["Restored From", &display(&outcome.working)]);
                table.add_row(vec!["Size", &format_size(outcome.bytes)]);
                if self.verbose {
                    table.add_row(vec!["SHA-256", &outcome.sha256]);
                }
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(&RestoreOutput::from(outcome), "restore"),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_clear(&self, live: &Path) -> String {
        match self.format {
            OutputFormat::Table => format!("Deleted {}", live.display()),
            OutputFormat::Json => self.to_json_response(
                &ClearOutput {
                    deleted: live.to_path_buf(),
                },
                "clear",
            ),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_patch(&self, file: &Path, key: &str, value: &str, outcome: &PatchOutcome) -> String {
        match self.format {
            OutputFormat::Table => match outcome {
                PatchOutcome::Unchanged => {
                    format!("{key} already set to {value:?} in {}", file.display())
                }
                PatchOutcome::Updated { previous } => {
                    let mut table = property_table();
                    table.add_row(vec!["File", &display(file)]);
                    table.add_row(vec!["Setting", key]);
                    table.add_row(vec!["Old Value", previous]);
                    table.add_row(vec!["New Value", value]);
                    table.to_string()
                }
            },
            OutputFormat::Json => self.to_json_response(
                &PatchOutput {
                    file: file.to_path_buf(),
                    key: key.to_string(),
                    value: value.to_string(),
                    changed: !outcome.is_noop(),
                    previous: match outcome {
                        PatchOutcome::Updated { previous } => Some(previous.clone()),
                        PatchOutcome::Unchanged => None,
                    },
                },
                "set-setting",
            ),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// The run log is printed as is in table mode.
    pub fn format_run(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Table => report.log.clone(),
            OutputFormat::Json => self.to_json_response(
                &RunOutput {
                    log: report.log.clone(),
                },
                "run",
            ),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_install(&self, setting_file: &Path) -> String {
        match self.format {
            OutputFormat::Table => format!("Installed Ketarin settings from {}", setting_file.display()),
            OutputFormat::Json => self.to_json_response(
                &InstallOutput {
                    setting_file: setting_file.to_path_buf(),
                },
                "install",
            ),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_paths(&self, paths: &PathsOutput) -> String {
        match self.format {
            OutputFormat::Table => {
                let unresolved = || format!("<{} not set>", paths.app_data_var);
                let mut table = property_table();
                table.add_row(vec![
                    "Live Database".to_string(),
                    paths.live_database.as_deref().map(display).unwrap_or_else(unresolved),
                ]);
                table.add_row(vec![
                    "Backup Directory".to_string(),
                    paths.backup_dir.as_deref().map(display).unwrap_or_else(unresolved),
                ]);
                table.add_row(vec!["Working Copy".to_string(), display(&paths.working_copy)]);
                table.add_row(vec!["Updater Config".to_string(), display(&paths.updater_config)]);
                if let Some(config_file) = &paths.config_file {
                    table.add_row(vec!["Config File".to_string(), display(config_file)]);
                }
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(paths, "paths"),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_backups(&self, backups: &[BackupInfo]) -> String {
        match self.format {
            OutputFormat::Table => {
                if backups.is_empty() {
                    return "No backups found.".to_string();
                }

                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec!["Created", "Size", "File"]);
                for backup in backups {
                    table.add_row(vec![
                        format_time(&backup.created_at),
                        format_size(backup.size),
                        display(&backup.path),
                    ]);
                }
                table.to_string()
            }
            OutputFormat::Json => {
                let list: Vec<BackupOutput> = backups.iter().map(BackupOutput::from).collect();
                self.to_json_response(&list, "backups")
            }
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_config(&self, config: &NoelConfig) -> String {
        match self.format {
            OutputFormat::Table => toml::to_string_pretty(config)
                .unwrap_or_else(|e| format!("Failed to render configuration: {e}")),
            OutputFormat::Json => self.to_json_response(config, "config show"),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_config_written(&self, path: &Path) -> String {
        match self.format {
            OutputFormat::Table => format!("Wrote default configuration to {}", path.display()),
            OutputFormat::Json => self.to_json_response(
                &ConfigInitOutput {
                    path: path.to_path_buf(),
                },
                "config init",
            ),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Report a failed command. Table errors go to stderr, JSON errors to
    /// stdout.
    pub fn report_error(&self, error: &anyhow::Error, code: ExitCode) {
        match self.format {
            OutputFormat::Table => eprintln!("Error: {error:#}"),
            OutputFormat::Json => println!("{}", self.format_error(error, code)),
            OutputFormat::Quiet => {}
        }
    }

    pub fn format_error(&self, error: &anyhow::Error, code: ExitCode) -> String {
        self.to_json(&JsonResponse::error(&format!("{error:#}"), code))
    }

    /// Print a formatted result, skipping empty output.
    pub fn print(&self, output: &str) {
        if !output.is_empty() {
            println!("{output}");
        }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    fn to_json_response<T: Serialize>(&self, value: &T, command: &str) -> String {
        self.to_json(&JsonResponse::success(value, command))
    }
}

fn property_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Property", "Value"]);
    table
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn format_time(time: &NaiveDateTime) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

// JSON output structures

#[derive(Serialize)]
struct SwapOutOutput {
    live: PathBuf,
    working: PathBuf,
    backup: PathBuf,
    created_at: String,
    bytes: u64,
    sha256: String,
}

impl From<&SwapOutcome> for SwapOutOutput {
    fn from(outcome: &SwapOutcome) -> Self {
        Self {
            live: outcome.live.clone(),
            working: outcome.working.clone(),
            backup: outcome.backup.clone(),
            created_at: outcome.created_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            bytes: outcome.bytes,
            sha256: outcome.sha256.clone(),
        }
    }
}

#[derive(Serialize)]
struct RestoreOutput {
    live: PathBuf,
    working: PathBuf,
    bytes: u64,
    sha256: String,
}

impl From<&RestoreOutcome> for RestoreOutput {
    fn from(outcome: &RestoreOutcome) -> Self {
        Self {
            live: outcome.live.clone(),
            working: outcome.working.clone(),
            bytes: outcome.bytes,
            sha256: outcome.sha256.clone(),
        }
    }
}

#[derive(Serialize)]
struct ClearOutput {
    deleted: PathBuf,
}

#[derive(Serialize)]
struct PatchOutput {
    file: PathBuf,
    key: String,
    value: String,
    changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous: Option<String>,
}

#[derive(Serialize)]
struct RunOutput {
    log: String,
}

#[derive(Serialize)]
struct InstallOutput {
    setting_file: PathBuf,
}

#[derive(Serialize)]
struct ConfigInitOutput {
    path: PathBuf,
}

#[derive(Serialize)]
struct BackupOutput {
    path: PathBuf,
    created_at: String,
    size: u64,
}

impl From<&BackupInfo> for BackupOutput {
    fn from(backup: &BackupInfo) -> Self {
        Self {
            path: backup.path.clone(),
            created_at: backup.created_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            size: backup.size,
        }
    }
}

/// Resolved locations reported by `noel paths`.
#[derive(Debug, Serialize)]
pub struct PathsOutput {
    pub app_data_var: String,
    /// `None` when the application data variable is unset
    pub live_database: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub working_copy: PathBuf,
    pub updater_config: PathBuf,
    pub config_file: Option<PathBuf>,
}
