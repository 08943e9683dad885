//! Build file loading
//!
//! A build file is TOML:
//!
//! ```toml
//! [project]
//! name = "demo"
//! default = "dist"
//!
//! [[property]]
//! name = "build.dir"
//! value = "build"
//!
//! [[import]]
//! file = "common.toml"
//!
//! [[target]]
//! name = "dist"
//! depends = "prepare"
//! tasks = [{ type = "echo", message = "Building ${phing.project.name}" }]
//! ```

use crate::error::{BuildError, BuildResult};
use crate::project::Project;
use crate::target::Target;
use crate::tasks::{PropertyTask, Task};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default build file name
pub const DEFAULT_BUILD_FILE: &str = "build.toml";

/// The `[project]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    pub name: String,
    #[serde(default)]
    pub default: Option<String>,
    /// Base directory relative to the build file's directory
    #[serde(default)]
    pub basedir: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// An `[[import]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportDecl {
    pub file: String,
    /// Skip silently when the file does not exist
    #[serde(default)]
    pub optional: bool,
}

/// A parsed build file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildFile {
    #[serde(default)]
    pub project: Option<ProjectSection>,
    #[serde(default, rename = "property")]
    pub properties: Vec<PropertyTask>,
    #[serde(default, rename = "import")]
    pub imports: Vec<ImportDecl>,
    #[serde(default, rename = "target")]
    pub targets: Vec<Target>,
}

impl BuildFile {
    /// Parse a build file from a string
    pub fn parse(content: &str, path: &Path) -> BuildResult<Self> {
        toml::from_str(content).map_err(|e| BuildError::BuildFileParse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Read and parse a build file
    pub fn read(path: &Path) -> BuildResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| BuildError::build_file_read(path, e))?;
        Self::parse(&content, path)
    }
}

/// Loads a build file (and its imports) into a [`Project`]
#[derive(Debug, Clone, Default)]
pub struct BuildFileLoader {
    user_properties: Vec<(String, String)>,
    properties: Vec<(String, String)>,
}

impl BuildFileLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Add user properties (`-D`); they override the build file
    pub fn with_user_properties(mut self, properties: impl IntoIterator<Item = (String, String)>) -> Self {
        self.user_properties.extend(properties);
        self
    }

    /// Add properties applied before the build file's own (first writer wins)
    pub fn with_properties(mut self, properties: impl IntoIterator<Item = (String, String)>) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Load the build file at `path`
    pub fn load(&self, path: &Path) -> BuildResult<Project> {
        let path = absolute(path)?;
        let file = BuildFile::read(&path)?;
        let section = file.project.clone().ok_or_else(|| BuildError::BuildFileParse {
            path: path.clone(),
            error: "missing [project] section".to_string(),
        })?;

        let mut project = Project::new(section.name.clone());
        project.set_description(section.description.clone());
        project.set_default_target(section.default.clone());
        project.set_build_file(&path);

        for (name, value) in &self.user_properties {
            project.set_user_property(name.clone(), value.clone());
        }

        let file_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let basedir = match &section.basedir {
            Some(dir) => file_dir.join(project.expand(dir)),
            None => file_dir,
        };
        project.set_basedir(normalize(&basedir));
        project.init_builtin_properties();

        for (name, value) in &self.properties {
            project.set_new_property(name.clone(), value.clone());
        }

        let mut seen = HashSet::new();
        seen.insert(path.clone());
        Self::apply(&mut project, &path, file, &mut seen)?;

        tracing::debug!(
            project = %project.name(),
            targets = project.targets().count(),
            "loaded build file"
        );
        Ok(project)
    }

    /// Evaluate properties, then imports, then targets. Targets of the
    /// importing file are added last, so they replace imported ones.
    fn apply(project: &mut Project, path: &Path, file: BuildFile, seen: &mut HashSet<PathBuf>) -> BuildResult<()> {
        for property in &file.properties {
            property.execute(project)?;
        }

        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        for import in &file.imports {
            let import_path = dir.join(project.expand(&import.file));
            if !import_path.is_file() {
                if import.optional {
                    tracing::debug!(file = %import_path.display(), "skipping missing optional import");
                    continue;
                }
                return Err(BuildError::build_file_read(&import_path, "imported file not found"));
            }
            let import_path = absolute(&import_path)?;
            if !seen.insert(import_path.clone()) {
                tracing::debug!(file = %import_path.display(), "already imported");
                continue;
            }
            let imported = BuildFile::read(&import_path)?;
            Self::apply(project, &import_path, imported, seen)?;
        }

        for target in file.targets {
            project.add_target(target).map_err(|e| match e {
                BuildError::InvalidBuildFile(reason) => BuildError::BuildFileParse {
                    path: path.to_path_buf(),
                    error: reason,
                },
                other => other,
            })?;
        }
        Ok(())
    }
}

fn absolute(path: &Path) -> BuildResult<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    let cwd = std::env::current_dir().map_err(|e| BuildError::io(path, e))?;
    Ok(normalize(&cwd.join(path)))
}

/// Drop `.` components and fold `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
