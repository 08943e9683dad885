use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

mod build;
mod config;

use config::LoggerKind;

/// Phing, a build tool driven by TOML build files.
///
/// Runs the requested targets of a build file, each after the targets it
/// depends on. Without targets the project's default target runs.
///
/// EXAMPLES:
///     phing                          Run the default target of ./build.toml
///     phing dist test                Run 'dist', then 'test'
///     phing -f ci.toml -Denv=prod    Use another build file and set a property
///     phing -l                       List the targets of the build file
///     phing --find -k all            Search parent directories, keep going on failure
///
/// ENVIRONMENT VARIABLES:
///     PHING_BUILDFILE   Build file name used when -f is not given
///     PHING_LOGGER      Logger used when --logger is not given
///     PHING_CONFIG      Alternate global configuration file
///     PHING_LOG         Diagnostic log filter (e.g. 'phing_build=debug')
///     NO_COLOR          Set to disable colored output
#[derive(Parser, Debug)]
#[command(name = "phing")]
#[command(version)]
#[command(after_help = "Global settings are read from ~/.phing/config.toml")]
pub struct Cli {
    /// Targets to run, in order
    pub targets: Vec<String>,

    /// Use the given build file
    #[arg(long = "buildfile", short = 'f', value_name = "FILE")]
    pub buildfile: Option<PathBuf>,

    /// Set a user property (overrides the build file)
    #[arg(short = 'D', value_name = "NAME=VALUE", value_parser = parse_define)]
    pub defines: Vec<(String, String)>,

    /// Load user properties from a .properties file
    #[arg(long, value_name = "FILE")]
    pub propertyfile: Option<PathBuf>,

    /// List the targets of the build file and exit
    #[arg(long, short = 'l')]
    pub list: bool,

    /// Only show warnings and errors
    #[arg(long, short = 'q', conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,

    /// Show no build output at all
    #[arg(long, short = 'S')]
    pub silent: bool,

    /// Show verbose messages
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Show debug messages and internal diagnostics
    #[arg(long)]
    pub debug: bool,

    /// Continue with independent targets after a failure
    #[arg(long, short = 'k')]
    pub keep_going: bool,

    /// Logger that renders the build
    #[arg(long, value_enum)]
    pub logger: Option<LoggerKind>,

    /// Write logger output to a file
    #[arg(long, value_name = "FILE")]
    pub logfile: Option<PathBuf>,

    /// Search for the build file in parent directories
    #[arg(long)]
    pub find: bool,

    /// Emacs-friendly output: no [task] column
    #[arg(long, short = 'e')]
    pub emacs: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Parse `-D name=value`
fn parse_define(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("PHING_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // The attached logger has already printed the failure summary.
            if err.downcast_ref::<build::Reported>().is_none() {
                eprintln!("{} {:#}", "Error:".red().bold(), err);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = phing_config::ConfigLoader::new()
        .load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    let settings = config::Settings::resolve(cli, &config)?;

    if !settings.color {
        colored::control::set_override(false);
    }
    tracing::debug!(?settings, "resolved settings");

    build::run(cli, &settings, &config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_targets_and_defines() {
        let cli = Cli::parse_from(["phing", "-Dversion=1.2", "-D", "env=", "dist", "test"]);
        assert_eq!(cli.targets, vec!["dist", "test"]);
        assert_eq!(
            cli.defines,
            vec![
                ("version".to_string(), "1.2".to_string()),
                ("env".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_define_value_may_contain_equals() {
        assert_eq!(
            parse_define("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
    }

    #[test]
    fn test_define_requires_name_and_equals() {
        assert!(parse_define("novalue").is_err());
        assert!(parse_define("=value").is_err());
    }

    #[test]
    fn test_logger_flag() {
        let cli = Cli::parse_from(["phing", "--logger", "nobanner"]);
        assert_eq!(cli.logger, Some(LoggerKind::Nobanner));
        assert!(Cli::try_parse_from(["phing", "--logger", "xml"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["phing", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::parse_from(["phing", "-f", "ci.toml", "-l", "-k", "-e", "-S"]);
        assert_eq!(cli.buildfile, Some(PathBuf::from("ci.toml")));
        assert!(cli.list && cli.keep_going && cli.emacs && cli.silent);
    }
}
