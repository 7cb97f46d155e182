//! CLI command definitions and argument parsing

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::debug;

use noel_core::{set_setting_value, DatabaseSwap, KetarinDriver, NoelConfig, PathResolver};

use crate::output::{OutputFormat, OutputFormatter, PathsOutput};
use crate::ExitCode;

/// noel - Ketarin job database swapping and chocopkgup config patching
#[derive(Parser, Debug)]
#[command(name = "noel")]
#[command(version, about = "Ketarin job database swapping and chocopkgup config patching")]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: table, json, quiet
    #[arg(long, default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file path
    #[arg(long, global = true, env = "NOEL_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Execute the command against a loaded configuration
    pub fn execute_with_config(self, config: NoelConfig) -> anyhow::Result<ExitCode> {
        let out = OutputFormatter::new(self.output, self.verbose);
        let config_path = self.config.clone().or_else(NoelConfig::default_path);

        match self.command {
            Commands::SwapOut => {
                let outcome = database_swap(&config)
                    .swap_out()
                    .context("Failed to swap out the job database")?;
                out.print(&out.format_swap_out(&outcome));
            }
            Commands::Restore => {
                let outcome = database_swap(&config)
                    .restore_in()
                    .context("Failed to restore the job database")?;
                out.print(&out.format_restore(&outcome));
            }
            Commands::Clear => {
                let live = database_swap(&config)
                    .clear()
                    .context("Failed to delete the job database")?;
                out.print(&out.format_clear(&live));
            }
            Commands::SetPackagesFolder(args) => {
                let key = args
                    .key
                    .unwrap_or_else(|| config.updater.packages_folder_key.clone());
                let file = config.updater.config_path.clone();
                let outcome = set_setting_value(&file, &key, &args.dir)
                    .context("Failed to set the chocopkgup packages folder")?;
                out.print(&out.format_patch(&file, &key, &args.dir, &outcome));
            }
            Commands::SetSetting(args) => {
                let file = args
                    .file
                    .unwrap_or_else(|| config.updater.config_path.clone());
                let outcome = set_setting_value(&file, &args.key, &args.value)
                    .with_context(|| format!("Failed to set {}", args.key))?;
                out.print(&out.format_patch(&file, &args.key, &args.value, &outcome));
            }
            Commands::Run => {
                let report = KetarinDriver::system(config.ketarin.clone())
                    .run()
                    .context("Ketarin run failed")?;
                out.print(&out.format_run(&report));
            }
            Commands::Install(args) => {
                let setting_file = KetarinDriver::system(config.ketarin.clone())
                    .install_settings(&args.package_dir)
                    .context("Failed to install Ketarin settings")?;
                out.print(&out.format_install(&setting_file));
            }
            Commands::Paths => {
                let resolver = path_resolver(&config);
                let paths = PathsOutput {
                    app_data_var: config.database.app_data_var.clone(),
                    live_database: resolver.live_database_path().ok(),
                    backup_dir: resolver.database_dir().ok(),
                    working_copy: resolver.working_copy_path(),
                    updater_config: resolver.updater_config_path().to_path_buf(),
                    config_file: config_path,
                };
                out.print(&out.format_paths(&paths));
            }
            Commands::Backups => {
                let backups = database_swap(&config)
                    .list_backups()
                    .context("Failed to list backups")?;
                out.print(&out.format_backups(&backups));
            }
            Commands::Config(args) => args.command.execute(&out, &config, config_path)?,
        }

        Ok(ExitCode::Success)
    }
}

fn path_resolver(config: &NoelConfig) -> PathResolver {
    PathResolver::from_env(config.database.clone(), config.updater.clone())
}

fn database_swap(config: &NoelConfig) -> DatabaseSwap {
    DatabaseSwap::new(path_resolver(config))
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy the live job database to the working copy and a new backup
    SwapOut,
    /// Replace the live job database with the working copy
    Restore,
    /// Delete the live job database
    Clear,
    /// Point chocopkgup at a packages folder
    SetPackagesFolder(SetPackagesFolderArgs),
    /// Set any appSettings value in a .NET config file
    SetSetting(SetSettingArgs),
    /// Run all Ketarin jobs silently and print the run log
    Run,
    /// Install the Ketarin settings shipped with a package
    Install(InstallArgs),
    /// Show resolved file locations
    Paths,
    /// List job database backups, newest first
    Backups,
    /// Manage the noel configuration file
    Config(ConfigArgs),
}

impl Commands {
    /// Whether the command can run when the config file fails to load.
    pub fn tolerates_bad_config(&self) -> bool {
        matches!(
            self,
            Commands::Config(ConfigArgs {
                command: ConfigCommands::Init { .. }
            })
        )
    }
}

/// Arguments for the set-packages-folder command
#[derive(Parser, Debug)]
pub struct SetPackagesFolderArgs {
    /// Packages folder to write into the updater config
    pub dir: String,

    /// Setting key to change instead of the configured one
    #[arg(long)]
    pub key: Option<String>,
}

/// Arguments for the set-setting command
#[derive(Parser, Debug)]
pub struct SetSettingArgs {
    /// Config file to patch (defaults to the configured updater config)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Setting key
    pub key: String,

    /// New value
    pub value: String,
}

/// Arguments for the install command
#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Package directory containing the Ketarin settings file
    pub package_dir: PathBuf,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

impl ConfigCommands {
    fn execute(
        self,
        out: &OutputFormatter,
        config: &NoelConfig,
        config_path: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        match self {
            ConfigCommands::Init { force } => {
                let Some(path) = config_path else {
                    bail!("Could not determine a configuration directory; pass --config");
                };
                if path.exists() && !force {
                    bail!(
                        "Configuration file {} already exists (use --force to overwrite)",
                        path.display()
                    );
                }
                debug!("Writing default configuration to {:?}", path);
                NoelConfig::default()
                    .save(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                out.print(&out.format_config_written(&path));
            }
            ConfigCommands::Show => out.print(&out.format_config(config)),
        }
        Ok(())
    }
}
