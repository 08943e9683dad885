//! File sets: a base directory filtered by include/exclude patterns
//!
//! Patterns use Ant syntax: `*` and `?` stay within one path segment, `**`
//! spans any number of directories, and a trailing `/` means "everything
//! below".

use crate::de::{comma_list, default_true};
use crate::error::{BuildError, BuildResult};
use crate::properties::PropertySet;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Patterns excluded unless `defaultexcludes = false`
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/*~",
    "**/#*#",
    "**/.#*",
    "**/%*%",
    "**/._*",
    "**/CVS",
    "**/CVS/**",
    "**/.cvsignore",
    "**/.svn",
    "**/.svn/**",
    "**/.git",
    "**/.git/**",
    "**/.gitattributes",
    "**/.gitignore",
    "**/.gitmodules",
    "**/.hg",
    "**/.hg/**",
    "**/.bzr",
    "**/.bzr/**",
    "**/.DS_Store",
];

/// A set of files below a directory
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileSet {
    /// Base directory, relative to the project basedir
    pub dir: String,
    #[serde(default, deserialize_with = "comma_list")]
    pub includes: Vec<String>,
    #[serde(default, deserialize_with = "comma_list")]
    pub excludes: Vec<String>,
    #[serde(default = "default_true")]
    pub casesensitive: bool,
    #[serde(default = "default_true")]
    pub defaultexcludes: bool,
}

/// Result of scanning a file set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryScan {
    /// Absolute base directory
    pub base: PathBuf,
    /// Matching files, relative to `base`, sorted
    pub files: Vec<PathBuf>,
    /// Matching directories, relative to `base`, sorted
    pub dirs: Vec<PathBuf>,
}

impl DirectoryScan {
    /// Absolute paths of the matching files
    pub fn file_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.files.iter().map(|f| self.base.join(f))
    }
}

impl FileSet {
    /// Create a new file set over `dir` including everything
    pub fn new(dir: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            includes: Vec::new(),
            excludes: Vec::new(),
            casesensitive: true,
            defaultexcludes: true,
        }
    }

    /// Add an include pattern
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.includes.push(pattern.into());
        self
    }

    /// Add an exclude pattern
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    /// Walk the directory and collect matching entries.
    ///
    /// `dir` and every pattern are property-expanded; `dir` is resolved
    /// against `basedir`.
    pub fn scan(&self, basedir: &Path, properties: &PropertySet) -> BuildResult<DirectoryScan> {
        let dir = properties.expand(&self.dir);
        let base = basedir.join(&dir);
        if !base.is_dir() {
            return Err(BuildError::invalid_attribute(
                "fileset",
                "dir",
                format!("{} is not a directory", base.display()),
            ));
        }

        let includes: Vec<String> = if self.includes.is_empty() {
            vec!["**".to_string()]
        } else {
            self.includes.iter().map(|p| properties.expand(p)).collect()
        };
        let mut excludes: Vec<String> = self.excludes.iter().map(|p| properties.expand(p)).collect();
        if self.defaultexcludes {
            excludes.extend(DEFAULT_EXCLUDES.iter().map(|p| p.to_string()));
        }

        let include_set = self.compile(&includes)?;
        let exclude_set = self.compile(&excludes)?;

        let mut scan = DirectoryScan {
            base: base.clone(),
            ..DirectoryScan::default()
        };

        for entry in WalkDir::new(&base)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            let Ok(relative) = entry.path().strip_prefix(&base) else {
                continue;
            };
            let key = relative_key(relative);
            if !include_set.is_match(&key) || exclude_set.is_match(&key) {
                continue;
            }
            if entry.file_type().is_dir() {
                scan.dirs.push(relative.to_path_buf());
            } else {
                scan.files.push(relative.to_path_buf());
            }
        }

        tracing::debug!(
            dir = %base.display(),
            files = scan.files.len(),
            dirs = scan.dirs.len(),
            "scanned fileset"
        );
        Ok(scan)
    }

    fn compile(&self, patterns: &[String]) -> BuildResult<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let normalized = normalize_pattern(pattern);
            let glob = GlobBuilder::new(&normalized)
                .literal_separator(true)
                .case_insensitive(!self.casesensitive)
                .build()
                .map_err(|error| BuildError::InvalidPattern {
                    pattern: pattern.clone(),
                    error,
                })?;
            builder.add(glob);
        }
        builder.build().map_err(|error| BuildError::InvalidPattern {
            pattern: patterns.join(","),
            error,
        })
    }
}

/// `dir/` means `dir/**`; backslashes become `/`; a leading `./` or `/` is dropped
fn normalize_pattern(pattern: &str) -> String {
    let mut p = pattern.trim().replace('\\', "/");
    while let Some(rest) = p.strip_prefix("./") {
        p = rest.to_string();
    }
    if let Some(rest) = p.strip_prefix('/') {
        p = rest.to_string();
    }
    if p.ends_with('/') {
        p.push_str("**");
    }
    p
}

fn relative_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
