//! Control-flow tasks: conditionals, error handling, calls and loops

use super::{expand_opt, Task, TaskDef};
use crate::conditions::Condition;
use crate::de::{default_true, opt_scalar_string};
use crate::error::{BuildError, BuildResult};
use crate::listener::Priority;
use crate::project::Project;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

/// Sets a property from the outcome of a condition
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionTask {
    pub property: String,
    /// Value when the condition holds (default `true`)
    #[serde(default, deserialize_with = "opt_scalar_string")]
    pub value: Option<String>,
    /// Value when it does not; the property stays unset otherwise
    #[serde(default, rename = "else", deserialize_with = "opt_scalar_string")]
    pub else_value: Option<String>,
    pub condition: Condition,
}

impl Task for ConditionTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        let property = project.expand(&self.property);
        let value = if self.condition.evaluate(project)? {
            Some(expand_opt(project, &self.value).unwrap_or_else(|| "true".to_string()))
        } else {
            expand_opt(project, &self.else_value)
        };
        if let Some(value) = value {
            project.set_new_property(property, value);
        }
        Ok(())
    }
}

/// An `elseif` branch
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElseIf {
    pub condition: Condition,
    #[serde(default)]
    pub then: Vec<TaskDef>,
}

/// Runs the tasks of the first branch whose condition holds
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IfTask {
    pub condition: Condition,
    #[serde(default)]
    pub then: Vec<TaskDef>,
    #[serde(default)]
    pub elseif: Vec<ElseIf>,
    #[serde(default, rename = "else")]
    pub otherwise: Vec<TaskDef>,
}

impl Task for IfTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        if self.condition.evaluate(project)? {
            return project.execute_tasks(&self.then);
        }
        for branch in &self.elseif {
            if branch.condition.evaluate(project)? {
                return project.execute_tasks(&branch.then);
            }
        }
        project.execute_tasks(&self.otherwise)
    }
}

/// Stops the build, optionally only under a condition
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailTask {
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
    /// Fail only if this property is set
    #[serde(default, rename = "if")]
    pub if_property: Option<String>,
    /// Fail only if this property is not set
    #[serde(default)]
    pub unless: Option<String>,
    #[serde(default)]
    pub condition: Option<Condition>,
}

impl FailTask {
    fn should_fail(&self, project: &Project) -> BuildResult<bool> {
        if let Some(name) = expand_opt(project, &self.if_property) {
            if !project.properties().is_set(&name) {
                return Ok(false);
            }
        }
        if let Some(name) = expand_opt(project, &self.unless) {
            if project.properties().is_set(&name) {
                return Ok(false);
            }
        }
        match &self.condition {
            Some(condition) => condition.evaluate(project),
            None => Ok(true),
        }
    }
}

impl Task for FailTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        if !self.should_fail(project)? {
            return Ok(());
        }
        let message = expand_opt(project, &self.message).unwrap_or_else(|| "No message".to_string());
        Err(BuildError::Fail(message))
    }
}

/// Runs `try`, then `catch` on failure, then always `finally`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TryCatchTask {
    #[serde(default, rename = "try")]
    pub body: Vec<TaskDef>,
    /// Without a catch block the error is rethrown after `finally`
    #[serde(default)]
    pub catch: Option<Vec<TaskDef>>,
    #[serde(default)]
    pub finally: Vec<TaskDef>,
    /// Property receiving the error message
    #[serde(default)]
    pub property: Option<String>,
}

impl Task for TryCatchTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        let mut result = project.execute_tasks(&self.body);

        if let Err(err) = &result {
            let message = err.to_string();
            project.log(format!("Caught exception: {}", message), Priority::Info);
            if let Some(property) = expand_opt(project, &self.property) {
                project.set_property(property, message);
            }
            if let Some(catch) = &self.catch {
                result = project.execute_tasks(catch);
            }
        }

        let finally = project.execute_tasks(&self.finally);
        // A failure in `finally` wins over the earlier outcome.
        finally.and(result)
    }
}

/// Runs a target (with its dependencies) in a separate property scope
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhingCallTask {
    pub target: String,
    #[serde(default, alias = "param")]
    pub params: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub inheritall: bool,
}

impl Task for PhingCallTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        let target = project.expand(&self.target);
        let params: Vec<(String, String)> = self
            .params
            .iter()
            .map(|(name, value)| (name.clone(), project.expand(value)))
            .collect();
        project.log(format!("Calling target '{}'", target), Priority::Verbose);
        project.call_target(&target, &params, self.inheritall)
    }
}

fn default_delimiter() -> String {
    ",".to_string()
}

/// Calls a target once per list item, passing the item as a parameter
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForeachTask {
    pub list: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    pub param: String,
    pub target: String,
    #[serde(default)]
    pub trim: bool,
    #[serde(default = "default_true")]
    pub inheritall: bool,
}

impl Task for ForeachTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        let list = project.expand(&self.list);
        let param = project.expand(&self.param);
        let target = project.expand(&self.target);
        if self.delimiter.is_empty() {
            return Err(BuildError::invalid_attribute("foreach", "delimiter", "cannot be empty"));
        }

        let items: Vec<String> = list
            .split(self.delimiter.as_str())
            .map(|item| if self.trim { item.trim() } else { item })
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();

        for item in items {
            project.log(format!("{} = {}", param, item), Priority::Verbose);
            project.call_target(&target, &[(param.clone(), item)], self.inheritall)?;
        }
        Ok(())
    }
}

/// Runs every nested task even if some fail; fails at the end if any did
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelentlessTask {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
}

impl Task for RelentlessTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        if self.tasks.is_empty() {
            return Err(BuildError::task("relentless", "No tasks specified"));
        }
        if let Some(description) = expand_opt(project, &self.description) {
            project.log(format!("Relentlessly: {}", description), Priority::Info);
        }

        let mut failures = 0;
        for (index, task) in self.tasks.iter().enumerate() {
            if let Err(err) = project.execute_task(task) {
                failures += 1;
                project.log(
                    format!("Task {} ({}) failed: {}", index + 1, task.name(), err),
                    Priority::Error,
                );
            }
        }

        if failures > 0 {
            return Err(BuildError::task(
                "relentless",
                format!("{} of {} tasks failed", failures, self.tasks.len()),
            ));
        }
        Ok(())
    }
}

fn default_retry_count() -> u32 {
    1
}

/// Retries a nested task on failure
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryTask {
    /// Retries after the first attempt
    #[serde(default = "default_retry_count")]
    pub retrycount: u32,
    /// Seconds to wait between attempts
    #[serde(default)]
    pub retrydelay: u64,
    pub task: Box<TaskDef>,
}

impl Task for RetryTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        let attempts = self.retrycount.saturating_add(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match project.execute_task(&self.task) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if attempt < attempts {
                        let mut message = format!("Attempt [{}]: error occurred; retrying...", attempt);
                        if self.retrydelay > 0 {
                            message.push_str(&format!(" (waiting {}s)", self.retrydelay));
                        }
                        project.log(message, Priority::Warn);
                        if self.retrydelay > 0 {
                            thread::sleep(Duration::from_secs(self.retrydelay));
                        }
                    }
                    last_error = Some(err);
                }
            }
        }

        let detail = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(BuildError::task(
            "retry",
            format!(
                "Task [{}] failed after [{}] attempts; giving up. Error message: {}",
                self.task.name(),
                attempts,
                detail
            ),
        ))
    }
}
