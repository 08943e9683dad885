//! Structured build report written as JSON when the build finishes

use super::{BuildEvent, BuildListener, BuildLogger, Priority};
use serde::Serialize;
use std::io::{self, Write};
use std::time::Instant;

#[derive(Debug, Serialize)]
struct MessageRecord {
    priority: Priority,
    text: String,
}

#[derive(Debug, Serialize)]
struct TaskRecord {
    name: String,
    duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    messages: Vec<MessageRecord>,
    #[serde(skip)]
    started: Option<Instant>,
}

#[derive(Debug, Serialize)]
struct TargetRecord {
    name: String,
    duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    messages: Vec<MessageRecord>,
    tasks: Vec<TaskRecord>,
    #[serde(skip)]
    started: Option<Instant>,
}

#[derive(Debug, Serialize)]
struct BuildRecord {
    project: String,
    status: &'static str,
    duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    messages: Vec<MessageRecord>,
    targets: Vec<TargetRecord>,
}

/// Collects the whole build as a tree and writes it as one JSON document
pub struct JsonLogger {
    out: Box<dyn Write>,
    level: Priority,
    started: Option<Instant>,
    messages: Vec<MessageRecord>,
    targets: Vec<TargetRecord>,
    /// Running targets, innermost last (phingcall and foreach nest), with
    /// the task stack depth at the moment each one started
    target_stack: Vec<(usize, usize)>,
    /// Open task records, innermost last (control-flow tasks nest)
    task_stack: Vec<TaskRecord>,
}

impl JsonLogger {
    /// Create a logger writing to stdout
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Create a logger with an explicit output stream
    pub fn with_output(out: Box<dyn Write>) -> Self {
        Self {
            out,
            level: Priority::Info,
            started: None,
            messages: Vec::new(),
            targets: Vec::new(),
            target_stack: Vec::new(),
            task_stack: Vec::new(),
        }
    }

    fn current_target(&mut self) -> Option<&mut TargetRecord> {
        let (index, _) = *self.target_stack.last()?;
        self.targets.get_mut(index)
    }

    /// Whether the innermost open task belongs to the innermost target
    fn task_is_open(&self) -> bool {
        let base = self.target_stack.last().map_or(0, |&(_, depth)| depth);
        self.task_stack.len() > base
    }

    fn elapsed_ms(started: Option<Instant>) -> u128 {
        started.map(|s| s.elapsed().as_millis()).unwrap_or(0)
    }
}

impl Default for JsonLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildListener for JsonLogger {
    fn build_started(&mut self, _event: &BuildEvent) {
        self.started = Some(Instant::now());
        self.messages.clear();
        self.targets.clear();
        self.target_stack.clear();
        self.task_stack.clear();
    }

    fn build_finished(&mut self, event: &BuildEvent) {
        let record = BuildRecord {
            project: event.project.clone(),
            status: if event.is_failure() { "failed" } else { "success" },
            duration_ms: Self::elapsed_ms(self.started),
            error: event.error.clone(),
            messages: std::mem::take(&mut self.messages),
            targets: std::mem::take(&mut self.targets),
        };
        if serde_json::to_writer_pretty(&mut self.out, &record).is_ok() {
            let _ = writeln!(self.out);
        }
        let _ = self.out.flush();
    }

    fn target_started(&mut self, event: &BuildEvent) {
        self.targets.push(TargetRecord {
            name: event.target.clone().unwrap_or_default(),
            duration_ms: 0,
            error: None,
            messages: Vec::new(),
            tasks: Vec::new(),
            started: Some(Instant::now()),
        });
        self.target_stack.push((self.targets.len() - 1, self.task_stack.len()));
    }

    fn target_finished(&mut self, event: &BuildEvent) {
        if let Some(target) = self.current_target() {
            target.duration_ms = Self::elapsed_ms(target.started);
            target.error = event.error.clone();
        }
        self.target_stack.pop();
    }

    fn task_started(&mut self, event: &BuildEvent) {
        self.task_stack.push(TaskRecord {
            name: event.task.clone().unwrap_or_default(),
            duration_ms: 0,
            error: None,
            messages: Vec::new(),
            started: Some(Instant::now()),
        });
    }

    fn task_finished(&mut self, event: &BuildEvent) {
        let Some(mut task) = self.task_stack.pop() else {
            return;
        };
        task.duration_ms = Self::elapsed_ms(task.started);
        task.error = event.error.clone();

        // Nested tasks are reported flat, in completion order.
        match self.current_target() {
            Some(target) => target.tasks.push(task),
            None => self.messages.extend(task.messages),
        }
    }

    fn message_logged(&mut self, event: &BuildEvent) {
        if event.priority > self.level {
            return;
        }
        let record = MessageRecord {
            priority: event.priority,
            text: event.message.clone().unwrap_or_default(),
        };
        if self.task_is_open() {
            if let Some(task) = self.task_stack.last_mut() {
                task.messages.push(record);
            }
        } else if let Some(target) = self.current_target() {
            target.messages.push(record);
        } else {
            self.messages.push(record);
        }
    }
}

impl BuildLogger for JsonLogger {
    fn set_message_output_level(&mut self, level: Priority) {
        self.level = level;
    }

    fn set_emacs_mode(&mut self, _emacs: bool) {}
}
