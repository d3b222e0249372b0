//! CLI argument definitions for logwatch-daemon.

use std::path::PathBuf;

use clap::Parser;
use logwatch_core::config::LogwatchConfig;

/// Tails access logs, derives metrics and raises alerts on them.
#[derive(Parser, Debug)]
#[command(name = "logwatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to the logwatch.toml configuration file.
    #[arg(short, long, default_value = "logwatch.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error, off).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Shorthand for `--log-level debug`.
    #[arg(long, conflicts_with = "log_level")]
    pub debug: bool,

    /// Override log format (json, pretty, compact).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the exporter (console, json).
    #[arg(short, long)]
    pub exporter: Option<String>,

    /// Validate the configuration file and exit.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Applies command-line overrides, which take precedence over the file
    /// and the environment.
    pub fn apply_overrides(&self, config: &mut LogwatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if self.debug {
            config.general.log_level = "debug".to_owned();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(exporter) = &self.exporter {
            config.server.exporter = exporter.clone();
        }
    }
}
