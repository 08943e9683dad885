use super::{expand_opt, Task};
use crate::de::opt_scalar_string;
use crate::error::{BuildError, BuildResult};
use crate::listener::Priority;
use crate::project::Project;
use crate::properties::load_properties_file;
use serde::Deserialize;

/// Defines properties from a value, a properties file or the environment
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyTask {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string")]
    pub value: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    /// Prefix for environment variables, e.g. `env` gives `env.PATH`
    #[serde(default)]
    pub environment: Option<String>,
    /// Prefix prepended to names loaded from `file`
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default, rename = "override")]
    pub overwrite: bool,
}

impl PropertyTask {
    /// Create a name/value property task
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    fn define(&self, project: &mut Project, name: String, value: String) {
        if self.overwrite {
            project.set_property(name, value);
        } else if !project.set_new_property(name.clone(), value) {
            project.log(
                format!("Property '{}' already set, keeping '{}'", name, project.property(&name).unwrap_or_default()),
                Priority::Verbose,
            );
        }
    }
}

impl Task for PropertyTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        if let (Some(name), Some(value)) = (&self.name, &self.value) {
            let name = project.expand(name);
            let value = project.expand(value);
            self.define(project, name, value);
            return Ok(());
        }

        if let Some(file) = expand_opt(project, &self.file) {
            let path = project.resolve_path(&file);
            let prefix = expand_opt(project, &self.prefix)
                .map(|p| if p.ends_with('.') { p } else { format!("{}.", p) })
                .unwrap_or_default();
            project.log(format!("Loading {}", path.display()), Priority::Verbose);
            for (key, raw) in load_properties_file(&path)? {
                // Later entries may reference earlier ones.
                let value = project.expand(&raw);
                self.define(project, format!("{}{}", prefix, key), value);
            }
            return Ok(());
        }

        if let Some(prefix) = expand_opt(project, &self.environment) {
            let prefix = prefix.trim_end_matches('.').to_string();
            for (key, value) in std::env::vars() {
                self.define(project, format!("{}.{}", prefix, key), value);
            }
            return Ok(());
        }

        match self.name {
            Some(_) => Err(BuildError::missing_attribute("property", "value")),
            None => Err(BuildError::missing_attribute("property", "name")),
        }
    }
}
