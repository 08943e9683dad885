//! The project: properties, targets, listeners and the target executor
//!
//! Execution is single-threaded. Listeners are notified synchronously, in
//! order of registration, on the thread that runs the tasks.

use crate::build_order::{TargetGraph, TargetNode};
use crate::error::{BuildError, BuildResult};
use crate::listener::{BuildEvent, BuildListener, Priority};
use crate::properties::PropertySet;
use crate::target::{Gate, Target};
use crate::tasks::TaskDef;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Version reported as `phing.version`
pub const PHING_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A loaded build project
pub struct Project {
    name: String,
    description: Option<String>,
    default_target: Option<String>,
    basedir: PathBuf,
    build_file: Option<PathBuf>,
    properties: PropertySet,
    targets: HashMap<String, Rc<Target>>,
    /// Declaration order of `targets`
    target_order: Vec<String>,
    listeners: Vec<Box<dyn BuildListener>>,
    keep_going: bool,
    current_target: Option<String>,
    current_task: Option<String>,
}

impl Project {
    /// Create a new project rooted at the current directory
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            default_target: None,
            basedir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            build_file: None,
            properties: PropertySet::new(),
            targets: HashMap::new(),
            target_order: Vec::new(),
            listeners: Vec::new(),
            keep_going: false,
            current_target: None,
            current_task: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub fn default_target(&self) -> Option<&str> {
        self.default_target.as_deref()
    }

    pub fn set_default_target(&mut self, target: Option<String>) {
        self.default_target = target;
    }

    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    pub fn set_basedir(&mut self, basedir: impl Into<PathBuf>) {
        self.basedir = basedir.into();
    }

    pub fn build_file(&self) -> Option<&Path> {
        self.build_file.as_deref()
    }

    pub fn set_build_file(&mut self, path: impl Into<PathBuf>) {
        self.build_file = Some(path.into());
    }

    /// Continue with independent targets after a failure
    pub fn set_keep_going(&mut self, keep_going: bool) {
        self.keep_going = keep_going;
    }

    pub fn keep_going(&self) -> bool {
        self.keep_going
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertySet {
        &mut self.properties
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name)
    }

    /// Set a property, replacing any earlier non-user value
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if !self.properties.set_override(name.clone(), value) {
            tracing::trace!(property = %name, "user property not overridden");
        }
    }

    /// Set a property only if it is not already set. Returns whether it was set.
    pub fn set_new_property(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        self.properties.set(name, value)
    }

    /// Set a user property; user properties win over every other source
    pub fn set_user_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.set_user(name, value);
    }

    /// Expand `${...}` references with the current properties
    pub fn expand(&self, text: &str) -> String {
        self.properties.expand(text)
    }

    /// Resolve a path against the project basedir
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.basedir.join(path)
        }
    }

    /// Set the properties every build can rely on
    pub fn init_builtin_properties(&mut self) {
        let basedir = self.basedir.display().to_string();
        self.set_property("phing.version", PHING_VERSION);
        self.set_property("phing.project.name", self.name.clone());
        self.set_property("project.basedir", basedir.clone());
        self.set_property("basedir", basedir);
        self.set_property("host.os", std::env::consts::OS);
        self.set_property("host.arch", std::env::consts::ARCH);
        if let Some(home) = dirs::home_dir() {
            self.set_property("user.home", home.display().to_string());
        }
        self.set_property(
            "phing.startTime",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        );
        if let Some(file) = self.build_file.clone() {
            self.set_property("phing.file", file.display().to_string());
            if let Some(dir) = file.parent() {
                self.set_property("phing.dir", dir.display().to_string());
            }
        }
    }

    /// Add a target, replacing any target with the same name
    pub fn add_target(&mut self, target: Target) -> BuildResult<()> {
        target.validate().map_err(BuildError::InvalidBuildFile)?;
        if !self.targets.contains_key(&target.name) {
            self.target_order.push(target.name.clone());
        }
        self.targets.insert(target.name.clone(), Rc::new(target));
        Ok(())
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name).map(Rc::as_ref)
    }

    pub fn has_target(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    /// Targets in declaration order
    pub fn targets(&self) -> impl Iterator<Item = &Target> + '_ {
        self.target_order
            .iter()
            .filter_map(|name| self.targets.get(name).map(Rc::as_ref))
    }

    /// Targets with a description, sorted by name
    pub fn main_targets(&self) -> Vec<&Target> {
        let mut targets: Vec<&Target> = self.targets().filter(|t| t.is_main()).collect();
        targets.sort_by(|a, b| a.name.cmp(&b.name));
        targets
    }

    /// Visible targets without a description, sorted by name
    pub fn sub_targets(&self) -> Vec<&Target> {
        let mut targets: Vec<&Target> = self
            .targets()
            .filter(|t| !t.hidden && !t.is_main())
            .collect();
        targets.sort_by(|a, b| a.name.cmp(&b.name));
        targets
    }

    fn graph(&self) -> TargetGraph {
        let mut graph = TargetGraph::new();
        for target in self.targets() {
            graph.add_target(TargetNode::new(&target.name).with_dependencies(target.depends.clone()));
        }
        graph
    }

    /// Compute the execution order for one requested target
    pub fn execution_order(&self, target: &str) -> BuildResult<Vec<String>> {
        self.graph().execution_order(target)
    }

    pub fn add_listener(&mut self, listener: Box<dyn BuildListener>) {
        self.listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Log a message in the context of the running target and task
    pub fn log(&mut self, message: impl Into<String>, priority: Priority) {
        let event = self.event().with_message(message, priority);
        self.notify(&event, |l, e| l.message_logged(e));
    }

    fn event(&self) -> BuildEvent {
        BuildEvent::new(self.name.clone())
            .with_target(self.current_target.clone())
            .with_task(self.current_task.clone())
    }

    fn notify(&mut self, event: &BuildEvent, callback: impl Fn(&mut dyn BuildListener, &BuildEvent)) {
        for listener in self.listeners.iter_mut() {
            callback(listener.as_mut(), event);
        }
    }

    pub fn fire_build_started(&mut self) {
        let event = BuildEvent::new(self.name.clone());
        self.notify(&event, |l, e| l.build_started(e));
    }

    pub fn fire_build_finished(&mut self, error: Option<&BuildError>) {
        let event = BuildEvent::new(self.name.clone()).with_error(error.map(ToString::to_string));
        self.notify(&event, |l, e| l.build_finished(e));
    }

    /// Run the requested targets (the default target when empty), wrapped in
    /// build started/finished events
    pub fn run(&mut self, targets: &[String]) -> BuildResult<()> {
        self.fire_build_started();
        let result = self.execute_targets(targets);
        self.fire_build_finished(result.as_ref().err());
        result
    }

    /// Execute the requested targets in order, each with its dependencies
    pub fn execute_targets(&mut self, targets: &[String]) -> BuildResult<()> {
        let requested: Vec<String> = if targets.is_empty() {
            match &self.default_target {
                Some(default) => vec![default.clone()],
                None => {
                    return Err(BuildError::NoDefaultTarget {
                        project: self.name.clone(),
                    })
                }
            }
        } else {
            targets.to_vec()
        };

        let mut failures = Vec::new();
        for name in &requested {
            let order = self.execution_order(name)?;
            tracing::debug!(target_name = %name, order = ?order, "computed execution order");
            self.execute_sorted(&order, &mut failures)?;
        }

        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            count => Err(BuildError::KeepGoingFailed {
                count,
                first: Box::new(failures.remove(0)),
            }),
        }
    }

    /// Run targets in the given order. Without keep-going the first failure
    /// is returned; with it, failures are collected and dependents skipped.
    fn execute_sorted(&mut self, order: &[String], failures: &mut Vec<BuildError>) -> BuildResult<()> {
        let mut failed: HashSet<String> = HashSet::new();

        for name in order {
            if self.keep_going {
                let blocked = self
                    .targets
                    .get(name)
                    .and_then(|t| t.depends.iter().find(|d| failed.contains(d.as_str())).cloned());
                if let Some(dep) = blocked {
                    self.log(
                        format!("Cannot execute '{}' - '{}' failed or was not executed.", name, dep),
                        Priority::Error,
                    );
                    failed.insert(name.clone());
                    continue;
                }
            }

            if let Err(err) = self.execute_target(name) {
                if !self.keep_going {
                    return Err(err);
                }
                self.log(format!("Target '{}' failed: {}", name, err), Priority::Error);
                failed.insert(name.clone());
                failures.push(err);
            }
        }
        Ok(())
    }

    /// Execute one target's tasks, without its dependencies
    pub fn execute_target(&mut self, name: &str) -> BuildResult<()> {
        let target = self
            .targets
            .get(name)
            .cloned()
            .ok_or_else(|| BuildError::target_not_found(name, None))?;

        let previous_target = self.current_target.replace(target.name.clone());
        let previous_task = self.current_task.take();

        let mut event = self.event();
        event.target_description = target.description.clone();
        self.notify(&event, |l, e| l.target_started(e));

        let result = match target.gate(&self.properties) {
            Gate::Skipped(reason) => {
                self.log(reason, Priority::Verbose);
                Ok(())
            }
            Gate::Open => self.execute_tasks(&target.tasks),
        };

        let event = event.with_error(result.as_ref().err().map(ToString::to_string));
        self.notify(&event, |l, e| l.target_finished(e));

        self.current_task = previous_task;
        self.current_target = previous_target;
        result
    }

    /// Execute tasks in order, stopping at the first failure
    pub fn execute_tasks(&mut self, tasks: &[TaskDef]) -> BuildResult<()> {
        for task in tasks {
            self.execute_task(task)?;
        }
        Ok(())
    }

    /// Execute a single task with started/finished events
    pub fn execute_task(&mut self, task: &TaskDef) -> BuildResult<()> {
        let previous = self.current_task.replace(task.name().to_string());
        let event = self.event();
        self.notify(&event, |l, e| l.task_started(e));

        let result = task.execute(self);

        let event = event.with_error(result.as_ref().err().map(ToString::to_string));
        self.notify(&event, |l, e| l.task_finished(e));
        self.current_task = previous;
        result
    }

    /// Run `target` and its dependencies with a separate property scope.
    ///
    /// With `inherit_all` the callee starts from a copy of the current
    /// properties, otherwise from the user properties alone. `params` are
    /// set as user properties in the callee. Properties the callee sets do
    /// not leak back.
    pub fn call_target(
        &mut self,
        target: &str,
        params: &[(String, String)],
        inherit_all: bool,
    ) -> BuildResult<()> {
        let mut scope = if inherit_all {
            self.properties.clone()
        } else {
            let mut scope = PropertySet::new();
            for (name, value) in self.properties.user_properties() {
                scope.set_user(name.clone(), value.clone());
            }
            scope
        };
        for (name, value) in params {
            scope.set_user(name.clone(), value.clone());
        }

        let saved = std::mem::replace(&mut self.properties, scope);
        if !inherit_all {
            self.init_builtin_properties();
        }

        let result = self.execution_order(target).and_then(|order| {
            let mut failures = Vec::new();
            let keep_going = std::mem::replace(&mut self.keep_going, false);
            let result = self.execute_sorted(&order, &mut failures);
            self.keep_going = keep_going;
            result
        });

        self.properties = saved;
        result
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("default_target", &self.default_target)
            .field("basedir", &self.basedir)
            .field("targets", &self.target_order)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
