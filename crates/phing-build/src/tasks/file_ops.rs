//! Filesystem tasks: mkdir, touch, delete, copy and move

use super::{expand_opt, filter_chain, Task};
use crate::de::{default_true, one_or_many};
use crate::error::{BuildError, BuildResult};
use crate::fileset::FileSet;
use crate::filters::FilterDef;
use crate::listener::Priority;
use crate::project::Project;
use serde::Deserialize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Creates a directory and any missing parents
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MkdirTask {
    pub dir: String,
}

impl Task for MkdirTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        let dir = project.resolve_path(project.expand(&self.dir));
        if dir.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&dir).map_err(|e| BuildError::io(&dir, e))?;
        project.log(format!("Created dir: {}", dir.display()), Priority::Info);
        Ok(())
    }
}

/// Creates a file or updates its modification time
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TouchTask {
    pub file: String,
}

impl Task for TouchTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        let path = project.resolve_path(project.expand(&self.file));
        if !path.exists() {
            project.log(format!("Creating {}", path.display()), Priority::Info);
        }
        File::options()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|f| f.set_modified(SystemTime::now()))
            .map_err(|e| BuildError::io(&path, e))
    }
}

/// Deletes a file, a directory tree, or the files of file sets
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteTask {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default, rename = "fileset", deserialize_with = "one_or_many")]
    pub filesets: Vec<FileSet>,
    /// Suppress errors and missing-file messages
    #[serde(default)]
    pub quiet: bool,
    #[serde(default = "default_true")]
    pub failonerror: bool,
    /// Also remove directories left empty by a file set
    #[serde(default)]
    pub includeemptydirs: bool,
}

impl DeleteTask {
    fn handle(&self, project: &mut Project, path: &Path, result: io::Result<()>) -> BuildResult<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if self.failonerror && !self.quiet => Err(BuildError::io(path, e)),
            Err(e) => {
                let priority = if self.quiet { Priority::Verbose } else { Priority::Warn };
                project.log(format!("Unable to delete {}: {}", path.display(), e), priority);
                Ok(())
            }
        }
    }
}

impl Task for DeleteTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        if self.file.is_none() && self.dir.is_none() && self.filesets.is_empty() {
            return Err(BuildError::missing_attribute("delete", "file"));
        }

        if let Some(file) = expand_opt(project, &self.file) {
            let path = project.resolve_path(file);
            if path.is_file() || path.is_symlink() {
                project.log(format!("Deleting: {}", path.display()), Priority::Info);
                let result = fs::remove_file(&path);
                self.handle(project, &path, result)?;
            } else if !self.quiet {
                project.log(
                    format!("Could not find file {} to delete.", path.display()),
                    Priority::Verbose,
                );
            }
        }

        if let Some(dir) = expand_opt(project, &self.dir) {
            let path = project.resolve_path(dir);
            if path.is_dir() {
                project.log(format!("Deleting directory {}", path.display()), Priority::Info);
                let result = fs::remove_dir_all(&path);
                self.handle(project, &path, result)?;
            } else if !self.quiet {
                project.log(
                    format!("Directory {} does not exist or is not a directory.", path.display()),
                    Priority::Verbose,
                );
            }
        }

        for set in &self.filesets {
            let scan = set.scan(project.basedir(), project.properties())?;
            if !scan.files.is_empty() {
                project.log(
                    format!("Deleting {} files from {}", scan.files.len(), scan.base.display()),
                    Priority::Info,
                );
            }
            for path in scan.file_paths() {
                let result = fs::remove_file(&path);
                self.handle(project, &path, result)?;
            }
            if self.includeemptydirs {
                // Deepest first so parents are empty by the time they are reached.
                for dir in scan.dirs.iter().rev() {
                    let path = scan.base.join(dir);
                    if fs::read_dir(&path).map(|mut d| d.next().is_none()).unwrap_or(false) {
                        let result = fs::remove_dir(&path);
                        self.handle(project, &path, result)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Copies files, optionally through a filter chain. Also backs `move`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyTask {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub tofile: Option<String>,
    #[serde(default)]
    pub todir: Option<String>,
    #[serde(default, rename = "fileset", deserialize_with = "one_or_many")]
    pub filesets: Vec<FileSet>,
    /// Copy even when the destination is newer
    #[serde(default)]
    pub overwrite: bool,
    /// Drop source directories, copying every file straight into `todir`
    #[serde(default)]
    pub flatten: bool,
    #[serde(default)]
    pub filterchain: Vec<FilterDef>,
    #[serde(default = "default_true")]
    pub haltonerror: bool,
}

impl CopyTask {
    /// Copy a single file
    pub fn file(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            file: Some(from.into()),
            tofile: Some(to.into()),
            haltonerror: true,
            ..Self::default()
        }
    }

    /// Resolve the `(source, destination)` pairs this task covers
    fn plan(&self, project: &Project, element: &str) -> BuildResult<Vec<(PathBuf, PathBuf)>> {
        let todir = expand_opt(project, &self.todir).map(|d| project.resolve_path(d));
        let mut pairs = Vec::new();

        if let Some(file) = expand_opt(project, &self.file) {
            let source = project.resolve_path(file);
            let dest = match (expand_opt(project, &self.tofile), &todir) {
                (Some(tofile), _) => project.resolve_path(tofile),
                (None, Some(dir)) => match source.file_name() {
                    Some(name) => dir.join(name),
                    None => return Err(BuildError::invalid_attribute(element, "file", "not a file")),
                },
                (None, None) => return Err(BuildError::missing_attribute(element, "tofile")),
            };
            pairs.push((source, dest));
        }

        if !self.filesets.is_empty() {
            let Some(todir) = &todir else {
                return Err(BuildError::missing_attribute(element, "todir"));
            };
            for set in &self.filesets {
                let scan = set.scan(project.basedir(), project.properties())?;
                for relative in &scan.files {
                    let dest = if self.flatten {
                        match relative.file_name() {
                            Some(name) => todir.join(name),
                            None => continue,
                        }
                    } else {
                        todir.join(relative)
                    };
                    pairs.push((scan.base.join(relative), dest));
                }
            }
        }

        if self.file.is_none() && self.filesets.is_empty() {
            return Err(BuildError::missing_attribute(element, "file"));
        }
        Ok(pairs)
    }

    fn is_up_to_date(source: &Path, dest: &Path) -> bool {
        let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
        match (modified(source), modified(dest)) {
            (Some(src), Some(dst)) => dst >= src,
            _ => false,
        }
    }

    fn copy_one(&self, project: &Project, source: &Path, dest: &Path) -> BuildResult<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }

        if self.filterchain.is_empty() {
            fs::copy(source, dest).map_err(|e| BuildError::io(source, e))?;
            return Ok(());
        }

        let input = File::open(source).map_err(|e| BuildError::io(source, e))?;
        let mut reader = filter_chain(project, &self.filterchain).assemble(Box::new(input))?;
        let mut output = File::create(dest).map_err(|e| BuildError::io(dest, e))?;
        io::copy(&mut reader, &mut output).map_err(|e| BuildError::io(dest, e))?;
        Ok(())
    }

    /// Copy, returning the pairs actually copied
    fn run(&self, project: &mut Project, element: &str) -> BuildResult<Vec<(PathBuf, PathBuf)>> {
        let pairs = self.plan(project, element)?;
        let mut copied = Vec::new();

        for (source, dest) in pairs {
            if !source.is_file() {
                let message = format!("Could not find file {} to copy.", source.display());
                if self.haltonerror {
                    return Err(BuildError::task(element, message));
                }
                project.log(message, Priority::Warn);
                continue;
            }
            if !self.overwrite && Self::is_up_to_date(&source, &dest) {
                project.log(
                    format!("{} omitted, is up to date", source.display()),
                    Priority::Verbose,
                );
                continue;
            }
            match self.copy_one(project, &source, &dest) {
                Ok(()) => {
                    project.log(
                        format!("From {} to {}", source.display(), dest.display()),
                        Priority::Verbose,
                    );
                    copied.push((source, dest));
                }
                Err(err) if self.haltonerror => return Err(err),
                Err(err) => project.log(err.to_string(), Priority::Warn),
            }
        }

        if !copied.is_empty() {
            let target = copied
                .first()
                .and_then(|(_, d)| d.parent())
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            let verb = if element == "move" { "Moving" } else { "Copying" };
            project.log(
                format!("{} {} file(s) to {}", verb, copied.len(), target),
                Priority::Info,
            );
        }
        Ok(copied)
    }

    /// Copy then remove each copied source
    pub fn execute_move(&self, project: &mut Project) -> BuildResult<()> {
        // A move always replaces the destination.
        let mut task = self.clone();
        task.overwrite = true;
        for (source, _) in task.run(project, "move")? {
            fs::remove_file(&source).map_err(|e| BuildError::io(&source, e))?;
        }
        Ok(())
    }
}

impl Task for CopyTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        self.run(project, "copy").map(|_| ())
    }
}
