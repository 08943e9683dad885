//! Archive packaging: tar (optionally gzipped) and zip

use super::{expand_opt, Task};
use crate::de::one_or_many;
use crate::error::{BuildError, BuildResult};
use crate::fileset::FileSet;
use crate::listener::Priority;
use crate::project::Project;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tar::Builder;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// `(absolute source, name inside the archive)`
type Entry = (PathBuf, String);

/// Collect archive entries from file sets, with an optional path prefix
fn collect_entries(
    project: &Project,
    filesets: &[FileSet],
    prefix: Option<&str>,
    element: &str,
) -> BuildResult<(Vec<Entry>, Vec<String>)> {
    if filesets.is_empty() {
        return Err(BuildError::missing_attribute(element, "fileset"));
    }
    let prefix = prefix
        .map(|p| p.trim_matches('/').to_string())
        .filter(|p| !p.is_empty());
    let name_of = |relative: &Path| {
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        match &prefix {
            Some(prefix) => format!("{}/{}", prefix, name),
            None => name,
        }
    };

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for set in filesets {
        let scan = set.scan(project.basedir(), project.properties())?;
        dirs.extend(scan.dirs.iter().map(|d| name_of(d.as_path())));
        files.extend(scan.files.iter().map(|f| (scan.base.join(f), name_of(f.as_path()))));
    }
    Ok((files, dirs))
}

fn ensure_parent(path: &Path) -> BuildResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    Ok(())
}

/// Tar compression
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TarCompression {
    #[default]
    None,
    Gzip,
}

/// Creates a tar archive from file sets
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TarTask {
    pub destfile: String,
    #[serde(default)]
    pub compression: TarCompression,
    /// Directory prepended to every entry name
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default, rename = "fileset", deserialize_with = "one_or_many")]
    pub filesets: Vec<FileSet>,
}

fn append_entries<W: Write>(builder: &mut Builder<W>, entries: &[Entry]) -> io::Result<()> {
    for (source, name) in entries {
        builder.append_path_with_name(source, name)?;
    }
    Ok(())
}

impl Task for TarTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        let dest = project.resolve_path(project.expand(&self.destfile));
        let prefix = expand_opt(project, &self.prefix);
        let (entries, _) = collect_entries(project, &self.filesets, prefix.as_deref(), "tar")?;

        project.log(
            format!("Building tar: {} ({} files)", dest.display(), entries.len()),
            Priority::Info,
        );
        ensure_parent(&dest)?;
        let file = File::create(&dest).map_err(|e| BuildError::io(&dest, e))?;

        let result = match self.compression {
            TarCompression::None => {
                let mut builder = Builder::new(file);
                append_entries(&mut builder, &entries).and_then(|_| builder.finish())
            }
            TarCompression::Gzip => {
                let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
                append_entries(&mut builder, &entries)
                    .and_then(|_| builder.into_inner())
                    .and_then(|encoder| encoder.finish())
                    .map(|_| ())
            }
        };
        result.map_err(|e| BuildError::archive(&dest, e))
    }
}

/// Creates a zip archive from file sets
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZipTask {
    pub destfile: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default, rename = "fileset", deserialize_with = "one_or_many")]
    pub filesets: Vec<FileSet>,
}

fn write_zip(dest: &Path, entries: &[Entry], dirs: &[String]) -> zip::result::ZipResult<()> {
    let file = File::create(dest)?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for dir in dirs {
        zip.add_directory(dir.as_str(), options)?;
    }
    for (source, name) in entries {
        zip.start_file(name.as_str(), options)?;
        let mut input = File::open(source)?;
        io::copy(&mut input, &mut zip)?;
    }
    zip.finish()?;
    Ok(())
}

impl Task for ZipTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        let dest = project.resolve_path(project.expand(&self.destfile));
        let prefix = expand_opt(project, &self.prefix);
        let (entries, dirs) = collect_entries(project, &self.filesets, prefix.as_deref(), "zip")?;

        project.log(
            format!("Building zip: {} ({} files)", dest.display(), entries.len()),
            Priority::Info,
        );
        ensure_parent(&dest)?;
        write_zip(&dest, &entries, &dirs).map_err(|e| BuildError::archive(&dest, e))
    }
}
