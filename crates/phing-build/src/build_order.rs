//! Target execution order using a depth-first topological sort
use crate::error::{BuildError, BuildResult};
use std::collections::HashMap;

/// A target in the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetNode {
    /// Target name
    pub name: String,
    /// Target dependencies in declaration order
    pub dependencies: Vec<String>,
}

impl TargetNode {
    /// Create a new target node
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
        }
    }

    /// Add dependencies
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Visited,
}

/// Dependency graph over a project's targets
#[derive(Debug, Clone, Default)]
pub struct TargetGraph {
    /// Targets by name
    targets: HashMap<String, TargetNode>,
    /// Declaration order, used to make sorting deterministic
    order: Vec<String>,
}

impl TargetGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target, replacing any existing target with the same name
    pub fn add_target(&mut self, target: TargetNode) {
        if !self.targets.contains_key(&target.name) {
            self.order.push(target.name.clone());
        }
        self.targets.insert(target.name.clone(), target);
    }

    /// Get a target by name
    pub fn get_target(&self, name: &str) -> Option<&TargetNode> {
        self.targets.get(name)
    }

    /// Get target count
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Compute the targets to run for `root`, dependencies first, ending with
    /// `root` itself.
    ///
    /// The whole graph is checked, so a cycle or a missing dependency anywhere
    /// in the project fails the sort even if `root` does not reach it.
    pub fn execution_order(&self, root: &str) -> BuildResult<Vec<String>> {
        let mut state = HashMap::new();
        let mut stack = Vec::new();
        let mut result = Vec::new();

        if !self.targets.contains_key(root) {
            return Err(BuildError::target_not_found(root, None));
        }

        self.visit(root, None, &mut state, &mut stack, &mut result)?;

        // Remaining targets are sorted only to surface cycles and dangling
        // dependencies; they are not part of the result.
        let mut rest = Vec::new();
        for name in &self.order {
            if !state.contains_key(name.as_str()) {
                self.visit(name, None, &mut state, &mut stack, &mut rest)?;
            }
        }

        Ok(result)
    }

    /// Compute an order over every target in the graph
    pub fn full_order(&self) -> BuildResult<Vec<String>> {
        let mut state = HashMap::new();
        let mut stack = Vec::new();
        let mut result = Vec::new();

        for name in &self.order {
            if !state.contains_key(name.as_str()) {
                self.visit(name, None, &mut state, &mut stack, &mut result)?;
            }
        }

        Ok(result)
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        used_from: Option<&str>,
        state: &mut HashMap<&'a str, VisitState>,
        stack: &mut Vec<&'a str>,
        result: &mut Vec<String>,
    ) -> BuildResult<()> {
        let node = self
            .targets
            .get(name)
            .ok_or_else(|| BuildError::target_not_found(name, used_from))?;

        state.insert(node.name.as_str(), VisitState::Visiting);
        stack.push(node.name.as_str());

        for dep in &node.dependencies {
            match state.get(dep.as_str()).copied() {
                None => self.visit(dep, Some(node.name.as_str()), state, stack, result)?,
                Some(VisitState::Visiting) => {
                    return Err(BuildError::CircularDependency(Self::cycle_path(stack, dep)));
                }
                Some(VisitState::Visited) => {}
            }
        }

        stack.pop();
        state.insert(node.name.as_str(), VisitState::Visited);
        result.push(node.name.clone());
        Ok(())
    }

    /// Render the cycle closing at `dep`, e.g. `a -> b -> a`
    fn cycle_path(stack: &[&str], dep: &str) -> String {
        let start = stack.iter().position(|n| *n == dep).unwrap_or(0);
        let mut path: Vec<&str> = stack[start..].to_vec();
        path.push(dep);
        path.join(" -> ")
    }
}
