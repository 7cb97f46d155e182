//! Driving the Ketarin executable.
//!
//! Ketarin detaches from its launcher, so every invocation is followed by a
//! wait on the process name before its results are looked at.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::config::KetarinConfig;
use crate::error::NoelError;

/// Runs an external program to completion.
pub trait CommandRunner {
    /// Run `program` with `args`, inheriting stdout and stderr.
    ///
    /// A launch failure or a non-zero exit is a [`NoelError::Process`].
    fn run(&self, program: &str, args: &[String]) -> Result<(), NoelError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, program: &str, args: &[String]) -> Result<(), NoelError> {
        (**self).run(program, args)
    }
}

/// [`CommandRunner`] backed by [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<(), NoelError> {
        debug!("Running {} {:?}", program, args);

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| NoelError::process(program, format!("failed to launch: {}", e)))?;

        if !status.success() {
            return Err(NoelError::process(
                program,
                format!("exited with {}", status),
            ));
        }
        Ok(())
    }
}

/// Blocks until every process with a given name has exited.
pub trait ProcessWaiter {
    fn wait_for_exit(&self, process_name: &str) -> Result<(), NoelError>;
}

impl<W: ProcessWaiter + ?Sized> ProcessWaiter for &W {
    fn wait_for_exit(&self, process_name: &str) -> Result<(), NoelError> {
        (**self).wait_for_exit(process_name)
    }
}

/// Waits through PowerShell's `Wait-Process`. No timeout.
#[derive(Debug, Clone, Default)]
pub struct PowerShellWaiter<R = SystemCommandRunner> {
    runner: R,
}

impl<R: CommandRunner> PowerShellWaiter<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> ProcessWaiter for PowerShellWaiter<R> {
    fn wait_for_exit(&self, process_name: &str) -> Result<(), NoelError> {
        debug!("Waiting for {} to exit", process_name);
        self.runner.run("powershell", &wait_process_args(process_name))
    }
}

fn wait_process_args(process_name: &str) -> Vec<String> {
    vec![
        "-NoProfile".to_string(),
        "-ExecutionPolicy".to_string(),
        "unrestricted".to_string(),
        "-Command".to_string(),
        format!("Wait-Process -Name {}", process_name),
    ]
}

/// Output of an unattended Ketarin run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Content of the log Ketarin wrote during the run
    pub log: String,
}

/// Launches Ketarin for runs and settings installs.
pub struct KetarinDriver<R = SystemCommandRunner, W = PowerShellWaiter> {
    config: KetarinConfig,
    runner: R,
    waiter: W,
}

impl KetarinDriver {
    /// Driver using the system runner and a PowerShell waiter.
    pub fn system(config: KetarinConfig) -> Self {
        Self::new(config, SystemCommandRunner, PowerShellWaiter::default())
    }
}

impl<R: CommandRunner, W: ProcessWaiter> KetarinDriver<R, W> {
    pub fn new(config: KetarinConfig, runner: R, waiter: W) -> Self {
        Self {
            config,
            runner,
            waiter,
        }
    }

    /// Run every Ketarin job silently and return the run log.
    ///
    /// The log is written into a fresh temp directory which is removed before
    /// returning, whether or not the run succeeded.
    pub fn run(&self) -> Result<RunReport, NoelError> {
        let temp_dir = tempfile::Builder::new()
            .prefix(&self.config.temp_prefix)
            .tempdir()
            .map_err(|e| NoelError::io(std::env::temp_dir(), e))?;
        let log_path = temp_dir.path().join(&self.config.log_file_name);

        info!("Running {} with log {:?}", self.config.executable, log_path);
        let args = vec![
            "/silent".to_string(),
            "/notify".to_string(),
            format!("/log={}", log_path.display()),
        ];
        self.runner.run(&self.config.executable, &args)?;
        self.waiter.wait_for_exit(&self.config.process_name)?;

        let log = fs::read(&log_path).map_err(|e| NoelError::io(&log_path, e))?;
        let log = String::from_utf8_lossy(&log).into_owned();

        let dir = temp_dir.path().to_path_buf();
        temp_dir.close().map_err(|e| NoelError::io(&dir, e))?;

        Ok(RunReport { log })
    }

    /// Install the settings file shipped in `package_dir` into Ketarin.
    ///
    /// Returns the settings file that was installed.
    pub fn install_settings(&self, package_dir: &Path) -> Result<PathBuf, NoelError> {
        let setting_path = package_dir.join(&self.config.setting_file_name);
        if !setting_path.exists() {
            return Err(NoelError::io(
                &setting_path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "setting file not found"),
            ));
        }

        info!("Installing Ketarin settings from {:?}", setting_path);
        let args = vec![
            format!("/install={}", setting_path.display()),
            "/exit".to_string(),
        ];
        self.runner.run(&self.config.executable, &args)?;
        self.waiter.wait_for_exit(&self.config.process_name)?;

        Ok(setting_path)
    }
}
