//! Build-file loading and target scheduling tests

use phing_build::{
    BuildError, BuildEvent, BuildFileLoader, BuildListener, Priority, Project,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;

type Log = Rc<RefCell<Vec<String>>>;

/// Records target starts and info-or-higher messages
struct Recorder(Log);

impl BuildListener for Recorder {
    fn build_started(&mut self, _: &BuildEvent) {}
    fn build_finished(&mut self, e: &BuildEvent) {
        let status = if e.is_failure() { "failed" } else { "ok" };
        self.0.borrow_mut().push(format!("build:{}", status));
    }
    fn target_started(&mut self, e: &BuildEvent) {
        self.0
            .borrow_mut()
            .push(format!("target:{}", e.target.as_deref().unwrap_or_default()));
    }
    fn target_finished(&mut self, _: &BuildEvent) {}
    fn task_started(&mut self, _: &BuildEvent) {}
    fn task_finished(&mut self, _: &BuildEvent) {}
    fn message_logged(&mut self, e: &BuildEvent) {
        if e.priority <= Priority::Info {
            self.0
                .borrow_mut()
                .push(e.message.clone().unwrap_or_default());
        }
    }
}

fn load_with(dir: &Path, content: &str, loader: BuildFileLoader) -> (Project, Log) {
    let path = dir.join("build.toml");
    fs::write(&path, content).unwrap();
    let mut project = loader.load(&path).unwrap();
    let log = Log::default();
    project.add_listener(Box::new(Recorder(log.clone())));
    (project, log)
}

fn load(dir: &Path, content: &str) -> (Project, Log) {
    load_with(dir, content, BuildFileLoader::new())
}

fn targets(log: &Log) -> Vec<String> {
    log.borrow()
        .iter()
        .filter_map(|l| l.strip_prefix("target:").map(str::to_string))
        .collect()
}

fn messages(log: &Log) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|l| !l.starts_with("target:") && !l.starts_with("build:"))
        .cloned()
        .collect()
}

const CHAIN: &str = r#"
[project]
name = "chain"
default = "dist"

[[target]]
name = "init"
tasks = [{ type = "echo", message = "init" }]

[[target]]
name = "compile"
depends = "init"
tasks = [{ type = "echo", message = "compile" }]

[[target]]
name = "test"
depends = ["init", "compile"]
tasks = [{ type = "echo", message = "test" }]

[[target]]
name = "dist"
depends = "compile, test"
description = "Build the distribution"
tasks = [{ type = "echo", message = "dist" }]
"#;

#[test]
fn test_default_target_runs_dependencies_first() {
    let temp = TempDir::new().unwrap();
    let (mut project, log) = load(temp.path(), CHAIN);

    project.run(&[]).unwrap();
    assert_eq!(targets(&log), vec!["init", "compile", "test", "dist"]);
    assert_eq!(log.borrow().last().map(String::as_str), Some("build:ok"));
}

#[test]
fn test_requested_targets_are_sorted_independently() {
    let temp = TempDir::new().unwrap();
    let (mut project, log) = load(temp.path(), CHAIN);

    project
        .run(&["compile".to_string(), "test".to_string()])
        .unwrap();
    assert_eq!(
        targets(&log),
        vec!["init", "compile", "init", "compile", "test"]
    );
}

#[test]
fn test_cycle_fails_before_any_task_runs() {
    let temp = TempDir::new().unwrap();
    let (mut project, log) = load(
        temp.path(),
        r#"
[project]
name = "cyclic"
default = "a"

[[target]]
name = "a"
depends = "b"
tasks = [{ type = "echo", message = "a" }]

[[target]]
name = "b"
depends = "a"
tasks = [{ type = "echo", message = "b" }]
"#,
    );

    match project.run(&[]) {
        Err(BuildError::CircularDependency(path)) => assert_eq!(path, "a -> b -> a"),
        other => panic!("expected a cycle error, got {:?}", other),
    }
    assert!(targets(&log).is_empty());
    assert_eq!(log.borrow().last().map(String::as_str), Some("build:failed"));
}

#[test]
fn test_missing_dependency_message() {
    let temp = TempDir::new().unwrap();
    let (mut project, _) = load(
        temp.path(),
        r#"
[project]
name = "broken"

[[target]]
name = "dist"
depends = "compile"
"#,
    );

    let err = project.run(&["dist".to_string()]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Target \"compile\" does not exist in this project. It is used from target \"dist\"."
    );
}

#[test]
fn test_if_and_unless_gates() {
    let temp = TempDir::new().unwrap();
    let build = r#"
[project]
name = "gates"
default = "all"

[[target]]
name = "release"
if = "release.mode"
tasks = [{ type = "echo", message = "releasing" }]

[[target]]
name = "snapshot"
unless = "release.mode"
tasks = [{ type = "echo", message = "snapshot" }]

[[target]]
name = "all"
depends = "release, snapshot"
"#;

    let (mut project, log) = load(temp.path(), build);
    project.run(&[]).unwrap();
    assert_eq!(messages(&log), vec!["snapshot"]);

    let loader = BuildFileLoader::new()
        .with_user_properties(vec![("release.mode".to_string(), "1".to_string())]);
    let (mut project, log) = load_with(temp.path(), build, loader);
    project.run(&[]).unwrap();
    assert_eq!(messages(&log), vec!["releasing"]);
}

#[test]
fn test_skipped_target_still_runs_its_dependencies() {
    let temp = TempDir::new().unwrap();
    let (mut project, log) = load(
        temp.path(),
        r#"
[project]
name = "gates"

[[target]]
name = "prepare"
tasks = [{ type = "echo", message = "prepared" }]

[[target]]
name = "deploy"
depends = "prepare"
if = "never.set"
tasks = [{ type = "echo", message = "deployed" }]
"#,
    );

    project.run(&["deploy".to_string()]).unwrap();
    assert_eq!(messages(&log), vec!["prepared"]);
}

const KEEP_GOING: &str = r#"
[project]
name = "kg"
default = "all"

[[target]]
name = "broken"
tasks = [{ type = "fail", message = "boom" }]

[[target]]
name = "after-broken"
depends = "broken"
tasks = [{ type = "echo", message = "should not run" }]

[[target]]
name = "independent"
tasks = [{ type = "echo", message = "independent ran" }]

[[target]]
name = "all"
depends = "broken, after-broken, independent"
"#;

#[test]
fn test_failure_stops_the_build() {
    let temp = TempDir::new().unwrap();
    let (mut project, log) = load(temp.path(), KEEP_GOING);

    let err = project.run(&[]).unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert_eq!(targets(&log), vec!["broken"]);
}

#[test]
fn test_keep_going_runs_independent_targets() {
    let temp = TempDir::new().unwrap();
    let (mut project, log) = load(temp.path(), KEEP_GOING);
    project.set_keep_going(true);

    let err = project.run(&[]).unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert_eq!(targets(&log), vec!["broken", "independent"]);
    let msgs = messages(&log);
    assert!(msgs.contains(&"independent ran".to_string()));
    assert!(!msgs.contains(&"should not run".to_string()));
}

#[test]
fn test_property_precedence() {
    let temp = TempDir::new().unwrap();
    let loader = BuildFileLoader::new()
        .with_user_properties(vec![("who".to_string(), "cli".to_string())])
        .with_properties(vec![("greeting".to_string(), "hi".to_string())]);
    let (mut project, log) = load_with(
        temp.path(),
        r#"
[project]
name = "props"
default = "main"

[[property]]
name = "who"
value = "buildfile"

[[property]]
name = "greeting"
value = "hello"

[[property]]
name = "line"
value = "${greeting}, ${who} from ${phing.project.name}"

[[target]]
name = "main"
tasks = [
    { type = "property", name = "line", value = "ignored" },
    { type = "echo", message = "${line}" },
]
"#,
        loader,
    );

    project.run(&[]).unwrap();
    assert_eq!(messages(&log), vec!["hi, cli from props"]);
}

#[test]
fn test_imported_targets_are_overridden_by_importer() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("common.toml"),
        r#"
[project]
name = "common"

[[property]]
name = "from.import"
value = "yes"

[[target]]
name = "shared"
tasks = [{ type = "echo", message = "imported shared" }]

[[target]]
name = "greet"
tasks = [{ type = "echo", message = "imported greet ${from.import}" }]
"#,
    )
    .unwrap();

    let (mut project, log) = load(
        temp.path(),
        r#"
[project]
name = "main"

[[import]]
file = "common.toml"

[[import]]
file = "missing.toml"
optional = true

[[target]]
name = "shared"
tasks = [{ type = "echo", message = "local shared" }]
"#,
    );

    project
        .run(&["shared".to_string(), "greet".to_string()])
        .unwrap();
    assert_eq!(messages(&log), vec!["local shared", "imported greet yes"]);
}

#[test]
fn test_missing_required_import_fails_to_load() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("build.toml");
    fs::write(
        &path,
        "[project]\nname = \"x\"\n\n[[import]]\nfile = \"nope.toml\"\n",
    )
    .unwrap();
    assert!(matches!(
        BuildFileLoader::new().load(&path),
        Err(BuildError::BuildFileRead { .. })
    ));
}

#[test]
fn test_basedir_is_relative_to_build_file() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("sub")).unwrap();
    let (project, _) = load(
        temp.path(),
        "[project]\nname = \"b\"\nbasedir = \"sub\"\n",
    );
    assert_eq!(project.basedir(), temp.path().join("sub").as_path());
    assert_eq!(
        project.property("phing.file").map(str::to_string),
        Some(temp.path().join("build.toml").display().to_string())
    );
}

#[test]
fn test_phingcall_uses_a_separate_property_scope() {
    let temp = TempDir::new().unwrap();
    let (mut project, log) = load(
        temp.path(),
        r#"
[project]
name = "calls"
default = "main"

[[property]]
name = "color"
value = "red"

[[target]]
name = "paint"
tasks = [
    { type = "echo", message = "paint ${color} ${shade}" },
    { type = "property", name = "leaked", value = "yes" },
]

[[target]]
name = "main"
tasks = [
    { type = "phingcall", target = "paint", params = { shade = "dark" } },
    { type = "phingcall", target = "paint", params = { color = "blue", shade = "light" } },
    { type = "echo", message = "leaked=${leaked}" },
]
"#,
    );

    project.run(&[]).unwrap();
    assert_eq!(
        messages(&log),
        vec!["paint red dark", "paint blue light", "leaked=${leaked}"]
    );
}

#[test]
fn test_foreach_calls_target_per_item() {
    let temp = TempDir::new().unwrap();
    let (mut project, log) = load(
        temp.path(),
        r#"
[project]
name = "loop"
default = "main"

[[target]]
name = "each"
tasks = [{ type = "echo", message = "item=${item}" }]

[[target]]
name = "main"
tasks = [{ type = "foreach", list = "a, b,,c", param = "item", target = "each", trim = true }]
"#,
    );

    project.run(&[]).unwrap();
    assert_eq!(messages(&log), vec!["item=a", "item=b", "item=c"]);
    assert_eq!(targets(&log), vec!["main", "each", "each", "each"]);
}

#[test]
fn test_trycatch_finally_and_error_property() {
    let temp = TempDir::new().unwrap();
    let (mut project, log) = load(
        temp.path(),
        r#"
[project]
name = "errors"
default = "main"

[[target]]
name = "main"
tasks = [
    { type = "trycatch", property = "err", try = [
        { type = "echo", message = "trying" },
        { type = "fail", message = "bad thing" },
        { type = "echo", message = "unreachable" },
    ], catch = [
        { type = "echo", message = "caught: ${err}" },
    ], finally = [
        { type = "echo", message = "cleanup" },
    ] },
]
"#,
    );

    project.run(&[]).unwrap();
    assert_eq!(
        messages(&log),
        vec!["trying", "Caught exception: bad thing", "caught: bad thing", "cleanup"]
    );
}

#[test]
fn test_trycatch_without_catch_rethrows_after_finally() {
    let temp = TempDir::new().unwrap();
    let (mut project, log) = load(
        temp.path(),
        r#"
[project]
name = "errors"
default = "main"

[[target]]
name = "main"
tasks = [
    { type = "trycatch", try = [{ type = "fail", message = "nope" }], finally = [
        { type = "echo", message = "cleanup" },
    ] },
]
"#,
    );

    let err = project.run(&[]).unwrap_err();
    assert_eq!(err.to_string(), "nope");
    assert!(messages(&log).contains(&"cleanup".to_string()));
}

#[test]
fn test_if_task_branches() {
    let temp = TempDir::new().unwrap();
    let (mut project, log) = load(
        temp.path(),
        r#"
[project]
name = "branches"
default = "main"

[[property]]
name = "env"
value = "staging"

[[target]]
name = "main"

[[target.tasks]]
type = "if"
condition = { type = "equals", arg1 = "${env}", arg2 = "prod" }
then = [{ type = "echo", message = "prod" }]
elseif = [{ condition = { type = "equals", arg1 = "${env}", arg2 = "staging" }, then = [{ type = "echo", message = "staging" }] }]
else = [{ type = "echo", message = "other" }]

[[target.tasks]]
type = "condition"
property = "is.staging"
condition = { type = "contains", string = "${env}", substring = "stag" }

[[target.tasks]]
type = "echo"
message = "is.staging=${is.staging}"
"#,
    );

    project.run(&[]).unwrap();
    assert_eq!(messages(&log), vec!["staging", "is.staging=true"]);
}

#[test]
fn test_relentless_runs_everything_then_fails() {
    let temp = TempDir::new().unwrap();
    let (mut project, log) = load(
        temp.path(),
        r#"
[project]
name = "relentless"
default = "main"

[[target]]
name = "main"
tasks = [
    { type = "relentless", tasks = [
        { type = "fail", message = "first" },
        { type = "echo", message = "still here" },
        { type = "fail", message = "second" },
    ] },
]
"#,
    );

    let err = project.run(&[]).unwrap_err();
    assert!(err.to_string().contains("2 of 3 tasks failed"));
    assert!(messages(&log).contains(&"still here".to_string()));
}

#[test]
fn test_retry_gives_up_after_attempts() {
    let temp = TempDir::new().unwrap();
    let (mut project, log) = load(
        temp.path(),
        r#"
[project]
name = "retry"
default = "main"

[[target]]
name = "main"
tasks = [{ type = "retry", retrycount = 2, task = { type = "fail", message = "flaky" } }]
"#,
    );

    let err = project.run(&[]).unwrap_err();
    assert!(err.to_string().contains("failed after [3] attempts"));
    let retries = log
        .borrow()
        .iter()
        .filter(|m| m.contains("retrying"))
        .count();
    assert_eq!(retries, 2);
}

#[test]
fn test_fail_if_unless() {
    let temp = TempDir::new().unwrap();
    let (mut project, _) = load(
        temp.path(),
        r#"
[project]
name = "fail"
default = "main"

[[property]]
name = "ok"
value = "1"

[[target]]
name = "main"
tasks = [
    { type = "fail", message = "not set", if = "missing" },
    { type = "fail", message = "set", unless = "ok" },
    { type = "fail", message = "conditional", condition = { type = "isset", property = "ok" } },
]
"#,
    );

    let err = project.run(&[]).unwrap_err();
    assert_eq!(err.to_string(), "conditional");
}

#[test]
fn test_retry_with_maximum_count_succeeds_first_time() {
    let temp = TempDir::new().unwrap();
    let (mut project, log) = load(
        temp.path(),
        r#"
[project]
name = "retry"
default = "main"

[[target]]
name = "main"
tasks = [{ type = "retry", retrycount = 4294967295, task = { type = "echo", message = "stable" } }]
"#,
    );

    project.run(&[]).unwrap();
    assert_eq!(messages(&log), vec!["stable"]);
}
