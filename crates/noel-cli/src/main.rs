//! noel CLI entry point

use clap::Parser;
use noel_cli::{Cli, ExitCode, OutputFormatter};
use noel_core::NoelConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let out = OutputFormatter::new(cli.output, cli.verbose);

    let loaded = NoelConfig::load_from(cli.config.as_deref());
    let log_level = loaded
        .as_ref()
        .map(|config| config.logging.level.clone())
        .unwrap_or_else(|_| "warn".to_string());

    // Logs go to stderr so stdout stays parseable in JSON mode
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match loaded {
        Ok(config) => config,
        Err(e) if cli.command.tolerates_bad_config() => {
            tracing::warn!("Ignoring unusable configuration: {}", e);
            NoelConfig::default()
        }
        Err(e) => {
            let e = anyhow::Error::new(e);
            out.report_error(&e, ExitCode::ConfigError);
            return ExitCode::ConfigError.to_exit_code();
        }
    };

    match cli.execute_with_config(config) {
        Ok(code) => code.to_exit_code(),
        Err(e) => {
            let code = ExitCode::from_error(&e);
            out.report_error(&e, code);
            code.to_exit_code()
        }
    }
}
