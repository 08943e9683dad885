use super::{filter_chain, Task};
use crate::de::default_true;
use crate::error::{BuildError, BuildResult};
use crate::filters::FilterDef;
use crate::listener::Priority;
use crate::project::Project;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;

/// Reads a file, optionally filtered, into a property
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadFileTask {
    pub file: String,
    pub property: String,
    #[serde(default)]
    pub filterchain: Vec<FilterDef>,
    #[serde(default = "default_true")]
    pub failonerror: bool,
}

impl Task for LoadFileTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        let path = project.resolve_path(project.expand(&self.file));
        let property = project.expand(&self.property);

        let input = match File::open(&path) {
            Ok(file) => file,
            Err(e) if self.failonerror => return Err(BuildError::io(&path, e)),
            Err(e) => {
                project.log(format!("Unable to load {}: {}", path.display(), e), Priority::Warn);
                return Ok(());
            }
        };

        let mut reader = filter_chain(project, &self.filterchain).assemble(Box::new(input))?;
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| BuildError::io(&path, e))?;

        project.log(format!("loading {} into property {}", path.display(), property), Priority::Verbose);
        project.set_property(property, String::from_utf8_lossy(&bytes).into_owned());
        Ok(())
    }
}
