use super::{expand_opt, Task};
use crate::error::{BuildError, BuildResult};
use crate::listener::Priority;
use crate::project::Project;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::io::Write;

/// Logs a message, or writes it to a file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EchoTask {
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub append: bool,
}

impl EchoTask {
    /// Create a new echo task
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

impl Task for EchoTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        let message = expand_opt(project, &self.message).unwrap_or_default();

        if let Some(file) = expand_opt(project, &self.file) {
            let path = project.resolve_path(&file);
            let mut out = OpenOptions::new()
                .create(true)
                .write(true)
                .append(self.append)
                .truncate(!self.append)
                .open(&path)
                .map_err(|e| BuildError::io(&path, e))?;
            writeln!(out, "{}", message).map_err(|e| BuildError::io(&path, e))?;
            return Ok(());
        }

        let priority = match expand_opt(project, &self.level) {
            None => Priority::Info,
            Some(level) => Priority::parse(&level)
                .ok_or_else(|| BuildError::invalid_attribute("echo", "level", format!("unknown level '{}'", level)))?,
        };
        project.log(message, priority);
        Ok(())
    }
}
