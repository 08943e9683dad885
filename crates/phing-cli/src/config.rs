//! Output settings resolved from CLI flags and user configuration
//!
//! Flags win over `~/.phing/config.toml` and the `PHING_*` variables, which
//! `phing_config` has already merged.

use crate::Cli;
use anyhow::{anyhow, Result};
use clap::ValueEnum;
use phing_build::Priority;
use phing_config::Config;

/// Available loggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LoggerKind {
    /// Target headers, [task] column and a summary
    Default,
    /// Like default, but silent targets print no header
    Nobanner,
    /// Default output coloured by priority
    Ansi,
    /// One JSON report when the build finishes
    Json,
}

/// Resolved output settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub logger: LoggerKind,
    pub level: Priority,
    pub emacs: bool,
    pub color: bool,
    /// No logger at all
    pub silent: bool,
    /// Build file name used when `-f` is not given
    pub buildfile: String,
}

impl Settings {
    pub fn resolve(cli: &Cli, config: &Config) -> Result<Self> {
        let logger = match cli.logger {
            Some(kind) => kind,
            None => LoggerKind::from_str(&config.logger, true)
                .map_err(|_| anyhow!("Unknown logger '{}'", config.logger))?,
        };

        let level = if cli.debug {
            Priority::Debug
        } else if cli.verbose {
            Priority::Verbose
        } else if cli.quiet {
            Priority::Warn
        } else {
            Priority::Info
        };

        Ok(Self {
            logger,
            level,
            emacs: cli.emacs || config.emacs,
            color: config.color && !cli.no_color,
            silent: cli.silent,
            buildfile: config.buildfile.clone(),
        })
    }
}
