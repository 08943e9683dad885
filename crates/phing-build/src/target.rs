/// Build targets: named, dependency-ordered lists of tasks
use crate::de::comma_list;
use crate::properties::PropertySet;
use crate::tasks::TaskDef;
use serde::Deserialize;

/// A named list of tasks with dependencies
#[derive(Debug, Clone, Deserialize)]
pub struct Target {
    /// Target name
    pub name: String,
    /// Targets that must run first, in declaration order
    #[serde(default, deserialize_with = "comma_list")]
    pub depends: Vec<String>,
    /// Comma-separated property names that must all be set
    #[serde(default, rename = "if")]
    pub if_condition: Option<String>,
    /// Comma-separated property names of which none may be set
    #[serde(default)]
    pub unless: Option<String>,
    /// Description shown by `-l`
    #[serde(default)]
    pub description: Option<String>,
    /// Hidden targets are not listed
    #[serde(default)]
    pub hidden: bool,
    /// Tasks in execution order
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
}

/// Outcome of checking a target's `if`/`unless` gates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Run the target
    Open,
    /// Skip it, with the reason shown at verbose level
    Skipped(String),
}

impl Target {
    /// Create a new target
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends: Vec::new(),
            if_condition: None,
            unless: None,
            description: None,
            hidden: false,
            tasks: Vec::new(),
        }
    }

    /// Set dependencies
    pub fn with_depends(mut self, depends: Vec<String>) -> Self {
        self.depends = depends;
        self
    }

    /// Set the `if` gate
    pub fn with_if(mut self, condition: impl Into<String>) -> Self {
        self.if_condition = Some(condition.into());
        self
    }

    /// Set the `unless` gate
    pub fn with_unless(mut self, condition: impl Into<String>) -> Self {
        self.unless = Some(condition.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set tasks
    pub fn with_tasks(mut self, tasks: Vec<TaskDef>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Validate the target configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Target name cannot be empty".to_string());
        }

        if self.depends.iter().any(|d| d == &self.name) {
            return Err(format!("Target '{}' depends on itself", self.name));
        }

        Ok(())
    }

    /// Evaluate the `if`/`unless` gates against the given properties
    pub fn gate(&self, properties: &PropertySet) -> Gate {
        if let Some(condition) = self.if_condition.as_deref() {
            for name in gate_names(condition, properties) {
                if !properties.is_set(&name) {
                    return Gate::Skipped(format!("Skipped because property '{}' not set.", name));
                }
            }
        }

        if let Some(condition) = self.unless.as_deref() {
            for name in gate_names(condition, properties) {
                if properties.is_set(&name) {
                    return Gate::Skipped(format!("Skipped because property '{}' set.", name));
                }
            }
        }

        Gate::Open
    }

    /// Whether the target shows up as a main target (has a description)
    pub fn is_main(&self) -> bool {
        !self.hidden && self.description.as_deref().is_some_and(|d| !d.is_empty())
    }
}

fn gate_names(condition: &str, properties: &PropertySet) -> Vec<String> {
    condition
        .split(',')
        .map(|n| properties.expand(n.trim()))
        .filter(|n| !n.is_empty())
        .collect()
}
