//! Task definitions and dispatch
//!
//! A task is a tagged table in a target's `tasks` list:
//!
//! ```toml
//! tasks = [
//!     { type = "mkdir", dir = "${build.dir}" },
//!     { type = "echo", message = "done", level = "verbose" },
//! ]
//! ```
//!
//! Attributes are stored as written and `${...}`-expanded when the task runs.

mod archive;
mod control;
mod echo;
mod exec;
mod file_ops;
mod filehash;
mod http;
mod loadfile;
mod property;
mod tstamp;

pub use archive::{TarTask, ZipTask};
pub use control::{
    ConditionTask, FailTask, ForeachTask, IfTask, PhingCallTask, RelentlessTask, RetryTask,
    TryCatchTask,
};
pub use echo::EchoTask;
pub use exec::ExecTask;
pub use file_ops::{CopyTask, DeleteTask, MkdirTask, TouchTask};
pub use filehash::FileHashTask;
pub use http::HttpRequestTask;
pub use loadfile::LoadFileTask;
pub use property::PropertyTask;
pub use tstamp::TstampTask;

use crate::error::BuildResult;
use crate::filters::{ChainReaderHelper, FilterContext, FilterDef};
use crate::project::Project;
use serde::Deserialize;

/// A single build action
pub trait Task {
    fn execute(&self, project: &mut Project) -> BuildResult<()>;
}

/// Every task kind a build file can name
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskDef {
    Echo(EchoTask),
    Property(PropertyTask),
    Mkdir(MkdirTask),
    Touch(TouchTask),
    Delete(DeleteTask),
    Copy(CopyTask),
    Move(CopyTask),
    LoadFile(LoadFileTask),
    Exec(ExecTask),
    Tstamp(TstampTask),
    FileHash(FileHashTask),
    Tar(TarTask),
    Zip(ZipTask),
    #[serde(rename = "http", alias = "httprequest")]
    HttpRequest(HttpRequestTask),
    Condition(ConditionTask),
    If(IfTask),
    Fail(FailTask),
    TryCatch(TryCatchTask),
    PhingCall(PhingCallTask),
    Foreach(ForeachTask),
    Relentless(RelentlessTask),
    Retry(RetryTask),
}

impl TaskDef {
    /// Task name as shown in the `[name]` log column
    pub fn name(&self) -> &'static str {
        match self {
            Self::Echo(_) => "echo",
            Self::Property(_) => "property",
            Self::Mkdir(_) => "mkdir",
            Self::Touch(_) => "touch",
            Self::Delete(_) => "delete",
            Self::Copy(_) => "copy",
            Self::Move(_) => "move",
            Self::LoadFile(_) => "loadfile",
            Self::Exec(_) => "exec",
            Self::Tstamp(_) => "tstamp",
            Self::FileHash(_) => "filehash",
            Self::Tar(_) => "tar",
            Self::Zip(_) => "zip",
            Self::HttpRequest(_) => "http",
            Self::Condition(_) => "condition",
            Self::If(_) => "if",
            Self::Fail(_) => "fail",
            Self::TryCatch(_) => "trycatch",
            Self::PhingCall(_) => "phingcall",
            Self::Foreach(_) => "foreach",
            Self::Relentless(_) => "relentless",
            Self::Retry(_) => "retry",
        }
    }

    /// Run the task. Use [`Project::execute_task`] to get listener events.
    pub fn execute(&self, project: &mut Project) -> BuildResult<()> {
        match self {
            Self::Echo(t) => t.execute(project),
            Self::Property(t) => t.execute(project),
            Self::Mkdir(t) => t.execute(project),
            Self::Touch(t) => t.execute(project),
            Self::Delete(t) => t.execute(project),
            Self::Copy(t) => t.execute(project),
            Self::Move(t) => t.execute_move(project),
            Self::LoadFile(t) => t.execute(project),
            Self::Exec(t) => t.execute(project),
            Self::Tstamp(t) => t.execute(project),
            Self::FileHash(t) => t.execute(project),
            Self::Tar(t) => t.execute(project),
            Self::Zip(t) => t.execute(project),
            Self::HttpRequest(t) => t.execute(project),
            Self::Condition(t) => t.execute(project),
            Self::If(t) => t.execute(project),
            Self::Fail(t) => t.execute(project),
            Self::TryCatch(t) => t.execute(project),
            Self::PhingCall(t) => t.execute(project),
            Self::Foreach(t) => t.execute(project),
            Self::Relentless(t) => t.execute(project),
            Self::Retry(t) => t.execute(project),
        }
    }
}

/// Expand an optional attribute
fn expand_opt(project: &Project, value: &Option<String>) -> Option<String> {
    value.as_deref().map(|v| project.expand(v))
}

/// Build a filter chain helper against the project's current state
fn filter_chain(project: &Project, filters: &[FilterDef]) -> ChainReaderHelper {
    ChainReaderHelper::new(
        filters.to_vec(),
        FilterContext::new(project.properties().clone(), project.basedir()),
    )
}
