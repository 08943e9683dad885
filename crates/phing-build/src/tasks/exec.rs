//! Shell command execution

use super::{expand_opt, Task};
use crate::error::{BuildError, BuildResult};
use crate::listener::Priority;
use crate::project::Project;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Runs a command through the platform shell
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecTask {
    pub command: String,
    /// Working directory (default: project basedir)
    #[serde(default)]
    pub dir: Option<String>,
    /// Fail the build on a non-zero exit code
    #[serde(default)]
    pub checkreturn: bool,
    /// Property receiving stdout, trimmed
    #[serde(default)]
    pub outputproperty: Option<String>,
    /// Property receiving the exit code
    #[serde(default)]
    pub returnproperty: Option<String>,
    /// Let the command write straight to the terminal
    #[serde(default)]
    pub passthru: bool,
    /// Log captured output at info instead of verbose
    #[serde(default)]
    pub logoutput: bool,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Outcome of a finished command
#[derive(Debug)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecTask {
    /// Create a new exec task
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    fn shell(command: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }

    fn run(&self, project: &Project, command: &str) -> BuildResult<ExecResult> {
        let dir = match expand_opt(project, &self.dir) {
            Some(dir) => project.resolve_path(dir),
            None => project.basedir().to_path_buf(),
        };
        let env: BTreeMap<String, String> = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), project.expand(v)))
            .collect();

        let mut cmd = Self::shell(command);
        cmd.current_dir(&dir).envs(&env);

        if self.passthru {
            let status = cmd
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .map_err(|e| BuildError::task("exec", format!("failed to start '{}': {}", command, e)))?;
            return Ok(ExecResult {
                exit_code: status.code().unwrap_or(1),
                stdout: String::new(),
                stderr: String::new(),
            });
        }

        let output = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .and_then(|child| child.wait_with_output())
            .map_err(|e| BuildError::task("exec", format!("failed to start '{}': {}", command, e)))?;

        Ok(ExecResult {
            exit_code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

impl Task for ExecTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        let command = project.expand(&self.command);
        if command.trim().is_empty() {
            return Err(BuildError::missing_attribute("exec", "command"));
        }

        project.log(format!("Executing command: {}", command), Priority::Verbose);
        let start = Instant::now();
        let result = self.run(project, &command)?;
        tracing::debug!(
            command = %command,
            exit_code = result.exit_code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "command finished"
        );

        let output_priority = if self.logoutput { Priority::Info } else { Priority::Verbose };
        for line in result.stdout.lines() {
            project.log(line, output_priority);
        }
        for line in result.stderr.lines() {
            project.log(line, Priority::Warn);
        }

        if let Some(property) = expand_opt(project, &self.outputproperty) {
            project.set_property(property, result.stdout.trim_end().to_string());
        }
        if let Some(property) = expand_opt(project, &self.returnproperty) {
            project.set_property(property, result.exit_code.to_string());
        }

        if self.checkreturn && result.exit_code != 0 {
            return Err(BuildError::CommandFailed {
                command,
                exit_code: result.exit_code,
            });
        }
        Ok(())
    }
}
