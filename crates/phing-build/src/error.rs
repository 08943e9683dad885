/// Build system error types
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to read build file at {path}: {error}")]
    BuildFileRead { path: PathBuf, error: String },

    #[error("Invalid build file {path}: {error}")]
    BuildFileParse { path: PathBuf, error: String },

    #[error("Invalid build file: {0}")]
    InvalidBuildFile(String),

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Target \"{target}\" does not exist in this project.{}", used_from_suffix(.used_from))]
    TargetNotFound {
        target: String,
        used_from: Option<String>,
    },

    #[error("No target specified and no default target in project '{project}'")]
    NoDefaultTarget { project: String },

    #[error("{element} requires the '{attribute}' attribute")]
    MissingAttribute { element: String, attribute: String },

    #[error("Invalid value for '{attribute}' on {element}: {reason}")]
    InvalidAttribute {
        element: String,
        attribute: String,
        reason: String,
    },

    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("Invalid regular expression '{pattern}': {error}")]
    InvalidRegex { pattern: String, error: regex::Error },

    #[error("Invalid file pattern '{pattern}': {error}")]
    InvalidPattern {
        pattern: String,
        error: globset::Error,
    },

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Task '{task}' failed: {message}")]
    TaskFailed { task: String, message: String },

    #[error("{0}")]
    Fail(String),

    #[error("Command '{command}' exited with code {exit_code}")]
    CommandFailed { command: String, exit_code: i32 },

    #[error("HTTP request to {url} failed: {error}")]
    Http { url: String, error: String },

    #[error("Archive error for {path}: {error}")]
    Archive { path: PathBuf, error: String },

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Build failed: {count} target(s) failed, first failure: {first}")]
    KeepGoingFailed { count: usize, first: Box<BuildError> },
}

fn used_from_suffix(used_from: &Option<String>) -> String {
    match used_from {
        Some(parent) => format!(" It is used from target \"{}\".", parent),
        None => String::new(),
    }
}

impl BuildError {
    /// Create a build file read error
    pub fn build_file_read(path: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::BuildFileRead {
            path: path.into(),
            error: error.to_string(),
        }
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a missing attribute error
    pub fn missing_attribute(element: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            element: element.into(),
            attribute: attribute.into(),
        }
    }

    /// Create an invalid attribute error
    pub fn invalid_attribute(
        element: impl Into<String>,
        attribute: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidAttribute {
            element: element.into(),
            attribute: attribute.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a task failure
    pub fn task(task: impl Into<String>, message: impl ToString) -> Self {
        Self::TaskFailed {
            task: task.into(),
            message: message.to_string(),
        }
    }

    /// Create a target not found error
    pub fn target_not_found(target: impl Into<String>, used_from: Option<&str>) -> Self {
        Self::TargetNotFound {
            target: target.into(),
            used_from: used_from.map(str::to_string),
        }
    }

    /// Create an invalid regex error
    pub fn regex(pattern: impl Into<String>, error: regex::Error) -> Self {
        Self::InvalidRegex {
            pattern: pattern.into(),
            error,
        }
    }

    /// Create an archive error
    pub fn archive(path: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::Archive {
            path: path.into(),
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_not_found_message_with_parent() {
        let err = BuildError::target_not_found("compile", Some("dist"));
        assert_eq!(
            err.to_string(),
            "Target \"compile\" does not exist in this project. It is used from target \"dist\"."
        );
    }

    #[test]
    fn test_target_not_found_message_without_parent() {
        let err = BuildError::target_not_found("compile", None);
        assert_eq!(
            err.to_string(),
            "Target \"compile\" does not exist in this project."
        );
    }

    #[test]
    fn test_missing_attribute_message() {
        let err = BuildError::missing_attribute("prefixlines", "prefix");
        assert_eq!(err.to_string(), "prefixlines requires the 'prefix' attribute");
    }
}
