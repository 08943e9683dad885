//! Build command - load the build file, attach a logger, run targets

use crate::config::{LoggerKind, Settings};
use crate::Cli;
use anyhow::{anyhow, bail, Context, Result};
use phing_build::properties::load_properties_file;
use phing_build::{
    AnsiColorLogger, BuildError, BuildFileLoader, BuildListener, BuildLogger, DefaultLogger,
    JsonLogger, NoBannerLogger, Priority, Project, Target,
};
use phing_config::{find_build_file, Config};
use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A build failure the attached logger has already reported
#[derive(Debug)]
pub struct Reported(pub BuildError);

impl fmt::Display for Reported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for Reported {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Run the build described by the command line
pub fn run(cli: &Cli, settings: &Settings, config: &Config) -> Result<()> {
    let path = locate_build_file(cli, settings)?;

    // -D wins over --propertyfile.
    let mut user_properties = Vec::new();
    if let Some(file) = &cli.propertyfile {
        let entries = load_properties_file(file)
            .with_context(|| format!("Failed to load property file {}", file.display()))?;
        user_properties.extend(entries);
    }
    user_properties.extend(cli.defines.iter().cloned());

    let mut project = BuildFileLoader::new()
        .with_user_properties(user_properties)
        .with_properties(config.properties.iter().cloned())
        .load(&path)?;

    if cli.list {
        print!("{}", render_targets(&project, &path));
        return Ok(());
    }

    project.set_keep_going(cli.keep_going);

    let banner = !settings.silent
        && settings.level >= Priority::Info
        && settings.logger != LoggerKind::Json
        && cli.logfile.is_none();
    if banner {
        println!("Buildfile: {}", path.display());
    }

    if !settings.silent {
        project.add_listener(create_logger(cli, settings)?);
    }

    match project.run(&cli.targets) {
        Ok(()) => Ok(()),
        Err(err) if settings.silent => Err(err.into()),
        Err(err) => Err(Reported(err).into()),
    }
}

/// `-f` (or the configured name) in the current directory, or in the
/// nearest parent with `--find`
fn locate_build_file(cli: &Cli, settings: &Settings) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let name = cli
        .buildfile
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.buildfile));

    if cli.find {
        let file_name = name.to_string_lossy();
        return find_build_file(&cwd, &file_name).ok_or_else(|| {
            anyhow!(
                "Could not locate a build file named '{}' in {} or its parents",
                file_name,
                cwd.display()
            )
        });
    }

    let path = cwd.join(&name);
    if !path.is_file() {
        bail!("Buildfile: {} does not exist!", path.display());
    }
    Ok(path)
}

fn create_logger(cli: &Cli, settings: &Settings) -> Result<Box<dyn BuildListener>> {
    let (out, err): (Box<dyn Write>, Box<dyn Write>) = match &cli.logfile {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let err = file
                .try_clone()
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            (Box::new(file), Box::new(err))
        }
        None => (Box::new(io::stdout()), Box::new(io::stderr())),
    };

    let color = settings.color && cli.logfile.is_none();
    Ok(match settings.logger {
        LoggerKind::Json => configured(JsonLogger::with_output(out), settings),
        LoggerKind::Nobanner => configured(NoBannerLogger::with_output(out, err), settings),
        LoggerKind::Ansi if color => configured(AnsiColorLogger::with_output(out, err), settings),
        LoggerKind::Ansi | LoggerKind::Default => {
            configured(DefaultLogger::with_output(out, err), settings)
        }
    })
}

fn configured<L: BuildLogger + 'static>(mut logger: L, settings: &Settings) -> Box<dyn BuildListener> {
    logger.set_message_output_level(settings.level);
    logger.set_emacs_mode(settings.emacs);
    Box::new(logger)
}

/// The `-l` listing
fn render_targets(project: &Project, path: &Path) -> String {
    let rule = "-".repeat(79);
    let mut out = String::new();

    let _ = writeln!(out, "Buildfile: {}", path.display());
    if let Some(description) = project.description() {
        let _ = writeln!(out, "{}", description);
    }
    if let Some(default) = project.default_target() {
        let description = project
            .target(default)
            .and_then(|t| t.description.as_deref())
            .unwrap_or_default();
        let _ = writeln!(out, "Default target:\n{}", rule);
        let _ = writeln!(out, "{}", format!(" {}  {}", default, description).trim_end());
    }

    render_section(&mut out, "Main targets:", &project.main_targets(), &rule);
    render_section(&mut out, "Subtargets:", &project.sub_targets(), &rule);
    out
}

fn render_section(out: &mut String, title: &str, targets: &[&Target], rule: &str) {
    if targets.is_empty() {
        return;
    }
    let width = targets.iter().map(|t| t.name.len()).max().unwrap_or(0);
    let _ = writeln!(out, "\n{}\n{}", title, rule);
    for target in targets {
        match &target.description {
            Some(description) => {
                let _ = writeln!(out, " {:<width$}  {}", target.name, description, width = width);
            }
            None => {
                let _ = writeln!(out, " {}", target.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_targets() {
        let mut project = Project::new("demo");
        project.set_default_target(Some("dist".to_string()));
        project
            .add_target(Target::new("dist").with_description("Build the distribution"))
            .unwrap();
        project
            .add_target(Target::new("test").with_description("Run tests"))
            .unwrap();
        project.add_target(Target::new("init")).unwrap();

        let rule = "-".repeat(79);
        let expected = format!(
            "Buildfile: build.toml\nDefault target:\n{rule}\n dist  Build the distribution\n\n\
             Main targets:\n{rule}\n dist  Build the distribution\n test  Run tests\n\n\
             Subtargets:\n{rule}\n init\n",
            rule = rule
        );
        assert_eq!(render_targets(&project, Path::new("build.toml")), expected);
    }
}
