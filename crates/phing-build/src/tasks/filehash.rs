use super::{expand_opt, Task};
use crate::error::{BuildError, BuildResult};
use crate::listener::Priority;
use crate::project::Project;
use serde::Deserialize;
use sha2::{Digest, Sha256, Sha512};
use std::fs::File;
use std::io;
use std::path::Path;

/// Computes a file's digest into a property
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileHashTask {
    pub file: String,
    /// `sha256` (default) or `sha512`
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub propertyname: Option<String>,
}

/// Hex digest of a file
pub fn hash_file(path: &Path, algorithm: &str) -> BuildResult<String> {
    let mut file = File::open(path).map_err(|e| BuildError::io(path, e))?;
    match algorithm.to_lowercase().as_str() {
        "sha256" => {
            let mut hasher = Sha256::new();
            io::copy(&mut file, &mut hasher).map_err(|e| BuildError::io(path, e))?;
            Ok(format!("{:x}", hasher.finalize()))
        }
        "sha512" => {
            let mut hasher = Sha512::new();
            io::copy(&mut file, &mut hasher).map_err(|e| BuildError::io(path, e))?;
            Ok(format!("{:x}", hasher.finalize()))
        }
        other => Err(BuildError::invalid_attribute(
            "filehash",
            "algorithm",
            format!("unsupported algorithm '{}'", other),
        )),
    }
}

impl Task for FileHashTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        let path = project.resolve_path(project.expand(&self.file));
        let algorithm = expand_opt(project, &self.algorithm).unwrap_or_else(|| "sha256".to_string());
        let property =
            expand_opt(project, &self.propertyname).unwrap_or_else(|| "filehashvalue".to_string());

        let digest = hash_file(&path, &algorithm)?;
        project.log(format!("{} {}: {}", algorithm, path.display(), digest), Priority::Verbose);
        project.set_property(property, digest);
        Ok(())
    }
}
