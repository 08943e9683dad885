//! Forwards build events into `tracing`

use super::{BuildEvent, BuildListener, Priority};
use tracing::{debug, error, info, trace, warn};

/// Emits every build event as a `tracing` event under the `phing` target
#[derive(Debug, Default)]
pub struct TracingListener;

impl TracingListener {
    pub fn new() -> Self {
        Self
    }
}

impl BuildListener for TracingListener {
    fn build_started(&mut self, event: &BuildEvent) {
        info!(target: "phing", project = %event.project, "build started");
    }

    fn build_finished(&mut self, event: &BuildEvent) {
        match &event.error {
            Some(err) => error!(target: "phing", project = %event.project, error = %err, "build failed"),
            None => info!(target: "phing", project = %event.project, "build finished"),
        }
    }

    fn target_started(&mut self, event: &BuildEvent) {
        debug!(target: "phing", target_name = ?event.target, "target started");
    }

    fn target_finished(&mut self, event: &BuildEvent) {
        debug!(target: "phing", target_name = ?event.target, failed = event.is_failure(), "target finished");
    }

    fn task_started(&mut self, event: &BuildEvent) {
        trace!(target: "phing", task = ?event.task, "task started");
    }

    fn task_finished(&mut self, event: &BuildEvent) {
        trace!(target: "phing", task = ?event.task, failed = event.is_failure(), "task finished");
    }

    fn message_logged(&mut self, event: &BuildEvent) {
        let message = event.message.as_deref().unwrap_or_default();
        let task = event.task.as_deref().unwrap_or_default();
        match event.priority {
            Priority::Error => error!(target: "phing", task, "{}", message),
            Priority::Warn => warn!(target: "phing", task, "{}", message),
            Priority::Info => info!(target: "phing", task, "{}", message),
            Priority::Verbose => debug!(target: "phing", task, "{}", message),
            Priority::Debug => trace!(target: "phing", task, "{}", message),
        }
    }
}
