//! Phing build engine
//!
//! Provides the pieces a build file is executed with:
//! - Project model and TOML build-file loading with imports
//! - Target scheduling in dependency order, with cycle detection
//! - Task catalogue (file operations, exec, archives, HTTP, control flow)
//! - Conditions for control-flow tasks
//! - Chained stream filters applied while copying or loading files
//! - Build listeners and loggers

pub mod build_order;
pub mod buildfile;
pub mod conditions;
mod de;
pub mod error;
pub mod fileset;
pub mod filters;
pub mod listener;
pub mod project;
pub mod properties;
pub mod target;
pub mod tasks;

// Re-export main types
pub use build_order::{TargetGraph, TargetNode};
pub use buildfile::{BuildFile, BuildFileLoader, DEFAULT_BUILD_FILE};
pub use conditions::Condition;
pub use error::{BuildError, BuildResult};
pub use fileset::{DirectoryScan, FileSet};
pub use filters::{ChainReaderHelper, Filter, FilterContext, FilterDef, FilterReader, Parameter};
pub use listener::{
    AnsiColorLogger, BuildEvent, BuildListener, BuildLogger, DefaultLogger, JsonLogger,
    NoBannerLogger, Priority, TracingListener,
};
pub use project::{Project, PHING_VERSION};
pub use properties::PropertySet;
pub use target::{Gate, Target};
pub use tasks::{Task, TaskDef};
