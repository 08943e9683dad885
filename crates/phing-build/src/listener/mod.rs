//! Build event listeners and loggers
//!
//! Listeners observe the build lifecycle synchronously, on the thread that
//! executes tasks. Loggers are listeners that render events for a human (or a
//! tool) and filter messages by priority.

mod default_logger;
mod json_logger;
mod tracing_listener;

pub use default_logger::{format_time, AnsiColorLogger, DefaultLogger, NoBannerLogger};
pub use json_logger::JsonLogger;
pub use tracing_listener::TracingListener;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message priority, most important first
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
}

impl Priority {
    /// Get priority name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warning",
            Self::Info => "info",
            Self::Verbose => "verbose",
            Self::Debug => "debug",
        }
    }

    /// Parse a level name as used by `echo level=...`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" | "err" => Some(Self::Error),
            "warning" | "warn" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "verbose" => Some(Self::Verbose),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A build lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEvent {
    /// Project name
    pub project: String,
    /// Target the event belongs to, if any
    pub target: Option<String>,
    /// Target description (set on target events)
    pub target_description: Option<String>,
    /// Task the event belongs to, if any
    pub task: Option<String>,
    /// Logged message (message events only)
    pub message: Option<String>,
    /// Message priority
    pub priority: Priority,
    /// Failure description on `*_finished` events
    pub error: Option<String>,
}

impl BuildEvent {
    /// Create an event for the given project
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            target: None,
            target_description: None,
            task: None,
            message: None,
            priority: Priority::Info,
            error: None,
        }
    }

    /// Attach a target
    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    /// Attach a task
    pub fn with_task(mut self, task: Option<String>) -> Self {
        self.task = task;
        self
    }

    /// Attach a message and its priority
    pub fn with_message(mut self, message: impl Into<String>, priority: Priority) -> Self {
        self.message = Some(message.into());
        self.priority = priority;
        self
    }

    /// Attach a failure
    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    /// Whether the event reports a failure
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Receives build lifecycle events
pub trait BuildListener {
    /// Fired before any target runs
    fn build_started(&mut self, event: &BuildEvent);

    /// Fired after the last target, with `event.error` set on failure
    fn build_finished(&mut self, event: &BuildEvent);

    /// Fired before a target's tasks run
    fn target_started(&mut self, event: &BuildEvent);

    /// Fired after a target completes or fails
    fn target_finished(&mut self, event: &BuildEvent);

    /// Fired before a task executes
    fn task_started(&mut self, event: &BuildEvent);

    /// Fired after a task completes or fails
    fn task_finished(&mut self, event: &BuildEvent);

    /// Fired for each logged message
    fn message_logged(&mut self, event: &BuildEvent);
}

/// A listener that renders the build and filters by priority
pub trait BuildLogger: BuildListener {
    /// Only messages at this priority or more important are shown
    fn set_message_output_level(&mut self, level: Priority);

    /// Emacs mode drops the `[task]` column
    fn set_emacs_mode(&mut self, emacs: bool);
}
