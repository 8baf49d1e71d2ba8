use super::render::{render_plan, render_task_list};
use super::task::run_task_with;
use super::util::parse_task_args;
use super::{RunnerError, PLAN_SCHEMA, TASKS_SCHEMA};
use crate::karma::{KarmaServer, RunnerSettings, StartError};
use crate::opener::{FileOpener, OpenError};
use crate::options::{Defaults, ExtraWatch, OptionOverrides};
use crate::process::{Completion, RunOutcome};
use crate::resolver::DiskProbe;
use crate::tasks::{find_task, Collaborators, Dispatcher, TaskKind};
use crate::ui::PlainRenderer;
use crate::watcher::{FileWatcher, WatchError, WatchHandle};
use crate::TaskInvocation;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

struct FakeKarma {
    outcome: RunOutcome,
    started: RefCell<Vec<RunnerSettings>>,
}

impl FakeKarma {
    fn new(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            started: RefCell::new(Vec::new()),
        }
    }
}

impl KarmaServer for FakeKarma {
    fn start(
        &self,
        _entry: &str,
        settings: &RunnerSettings,
        _cwd: &Path,
    ) -> Result<Completion, StartError> {
        self.started.borrow_mut().push(settings.clone());
        Ok(Completion::ready(self.outcome.clone()))
    }
}

#[derive(Default)]
struct FakeWatcher {
    watched: RefCell<Vec<ExtraWatch>>,
}

impl FileWatcher for FakeWatcher {
    fn watch(&self, spec: &ExtraWatch, _root: &Path) -> Result<WatchHandle, WatchError> {
        self.watched.borrow_mut().push(spec.clone());
        Ok(WatchHandle::inert())
    }
}

#[derive(Default)]
struct FakeOpener {
    opened: RefCell<Vec<PathBuf>>,
    fail: bool,
}

impl FileOpener for FakeOpener {
    fn open(&self, path: &Path) -> Result<(), OpenError> {
        if self.fail {
            return Err(OpenError::Launch {
                program: "xdg-open".to_owned(),
                error: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            });
        }
        self.opened.borrow_mut().push(path.to_path_buf());
        Ok(())
    }
}

fn invocation(name: &str, args: &[&str]) -> TaskInvocation {
    TaskInvocation {
        name: name.to_owned(),
        args: args.iter().map(|arg| (*arg).to_owned()).collect(),
    }
}

fn run(
    root: &Path,
    task: TaskInvocation,
    karma: &FakeKarma,
    watcher: &FakeWatcher,
    opener: &FakeOpener,
) -> (Result<String, RunnerError>, String) {
    let probe = DiskProbe;
    let collaborators = Collaborators {
        server: karma,
        watcher,
        opener,
        probe: &probe,
    };
    let mut renderer = PlainRenderer::new(Vec::<u8>::new(), false);
    let result = run_task_with(&task, root.to_path_buf(), collaborators, &mut renderer);
    let output = String::from_utf8(renderer.into_inner()).expect("utf8");
    (result, output)
}

#[test]
fn parse_task_args_collects_overrides_and_flags() {
    let args = [
        "--browsers",
        "Chrome, Firefox",
        "--browsers",
        "Safari",
        "--base-path",
        "packages/ui",
        "--karma",
        "npx karma",
        "--auto-open-coverage",
        "--plan",
        "--json",
    ]
    .iter()
    .map(|arg| (*arg).to_owned())
    .collect::<Vec<String>>();
    let (flags, overrides) = parse_task_args("test:browsers", &args).expect("parse");
    assert!(flags.plan);
    assert!(flags.output_json);
    assert!(!flags.verbose);
    assert_eq!(
        overrides.all_browsers,
        Some(vec![
            "Chrome".to_owned(),
            "Firefox".to_owned(),
            "Safari".to_owned()
        ])
    );
    assert_eq!(overrides.base_path, Some(PathBuf::from("packages/ui")));
    assert_eq!(overrides.karma.as_deref(), Some("npx karma"));
    assert_eq!(overrides.auto_open_coverage, Some(true));
    assert_eq!(overrides.config_file, None);
}

#[test]
fn parse_task_args_rejects_json_without_plan_and_missing_values() {
    let err = parse_task_args("test", &["--json".to_owned()]).expect_err("json alone");
    assert!(err.to_string().contains("--json requires --plan"));

    let err = parse_task_args("test", &["--config-file".to_owned()]).expect_err("missing value");
    assert!(err.to_string().contains("--config-file requires a value"));

    let err = parse_task_args("test", &["--browsers".to_owned(), " , ".to_owned()])
        .expect_err("empty browsers");
    assert!(err.to_string().contains("at least one browser"));

    let err = parse_task_args("test", &["--single-run".to_owned()]).expect_err("unknown");
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn exit_code_forwards_karma_failure_code() {
    let failed = RunnerError::TestsFailed {
        task: "test".to_owned(),
        code: Some(3),
        diagnostic: "exit code 3".to_owned(),
    };
    assert_eq!(failed.exit_code(), 3);
    let signalled = RunnerError::TestsFailed {
        task: "test".to_owned(),
        code: None,
        diagnostic: "terminated by signal 9".to_owned(),
    };
    assert_eq!(signalled.exit_code(), 1);
    assert!(signalled.to_string().contains("signal 9"));
}

#[test]
fn unknown_task_lists_available_tasks() {
    let root = temp_workspace("unknown");
    let karma = FakeKarma::new(RunOutcome::Passed);
    let (result, _) = run(
        &root,
        invocation("test:everything", &[]),
        &karma,
        &FakeWatcher::default(),
        &FakeOpener::default(),
    );
    let err = result.expect_err("unknown task");
    assert!(matches!(err, RunnerError::UnknownTask { .. }));
    assert!(err.to_string().contains("test:coverage:open"));
    assert!(karma.started.borrow().is_empty());
}

#[test]
fn test_task_prefers_local_config_and_reports_success() {
    let root = temp_workspace("local");
    fs::write(root.join("karma.conf.js"), "module.exports = () => {};\n").expect("write config");
    let karma = FakeKarma::new(RunOutcome::Passed);

    let (result, output) = run(
        &root,
        invocation("test", &["--verbose"]),
        &karma,
        &FakeWatcher::default(),
        &FakeOpener::default(),
    );
    assert_eq!(result.expect("passed"), "");
    let started = karma.started.borrow();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].config_file, root.join("karma.conf.js"));
    assert_eq!(started[0].base_path, root);
    assert_eq!(started[0].single_run, Some(true));
    assert!(output.contains("metal-karma test"));
    assert!(output.contains("local-generic"));
    assert!(output.contains("resolution:"));
    assert!(output.contains("test passed"));
}

#[test]
fn failed_run_surfaces_as_tests_failed() {
    let root = temp_workspace("failed");
    let karma = FakeKarma::new(RunOutcome::Failed {
        code: Some(1),
        diagnostic: "exit code 1".to_owned(),
        stderr: String::new(),
    });
    let (result, _) = run(
        &root,
        invocation("test", &[]),
        &karma,
        &FakeWatcher::default(),
        &FakeOpener::default(),
    );
    match result.expect_err("failure") {
        RunnerError::TestsFailed { task, code, .. } => {
            assert_eq!(task, "test");
            assert_eq!(code, Some(1));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn project_file_supplies_browsers_and_bundle_dir() {
    let root = temp_workspace("project");
    fs::write(
        root.join("metal-karma.toml"),
        "[options]\nall_browsers = [\"Chrome\"]\nbundle_dir = \".metal-karma\"\n",
    )
    .expect("write project config");
    let karma = FakeKarma::new(RunOutcome::Passed);

    let (result, _) = run(
        &root,
        invocation("test:browsers", &[]),
        &karma,
        &FakeWatcher::default(),
        &FakeOpener::default(),
    );
    result.expect("passed");
    let started = karma.started.borrow();
    assert_eq!(started[0].browsers, Some(vec!["Chrome".to_owned()]));
    assert_eq!(
        started[0].config_file,
        root.join(".metal-karma/karma.conf.js")
    );
    assert!(root.join(".metal-karma/karma.conf.js").is_file());
}

#[test]
fn cli_flags_win_over_project_file() {
    let root = temp_workspace("layering");
    fs::write(
        root.join("metal-karma.toml"),
        "[options]\nall_browsers = [\"Chrome\"]\nbundle_dir = \"bundled\"\n",
    )
    .expect("write project config");
    let karma = FakeKarma::new(RunOutcome::Passed);

    let (result, _) = run(
        &root,
        invocation("test:browsers", &["--browsers", "Firefox"]),
        &karma,
        &FakeWatcher::default(),
        &FakeOpener::default(),
    );
    result.expect("passed");
    assert_eq!(
        karma.started.borrow()[0].browsers,
        Some(vec!["Firefox".to_owned()])
    );
}

#[test]
fn coverage_open_failure_is_a_warning_not_an_error() {
    let root = temp_workspace("open-fail");
    fs::write(root.join("metal-karma.toml"), "[options]\nbundle_dir = \"b\"\n")
        .expect("write project config");
    let karma = FakeKarma::new(RunOutcome::Passed);
    let opener = FakeOpener {
        fail: true,
        ..FakeOpener::default()
    };

    let (result, output) = run(
        &root,
        invocation("test:coverage:open", &[]),
        &karma,
        &FakeWatcher::default(),
        &opener,
    );
    result.expect("passed despite open failure");
    assert!(output.contains("[warning] Coverage report not opened"));
    assert!(output.contains("coverage/lcov/lcov-report/index.html"));
}

#[test]
fn watch_task_registers_project_extra_watch() {
    let root = temp_workspace("watch");
    fs::write(
        root.join("metal-karma.toml"),
        "[options]\nbundle_dir = \"b\"\n[extra_watch]\nsrc = \"src/**/*.soy\"\nrun = \"npm run soy\"\n",
    )
    .expect("write project config");
    let karma = FakeKarma::new(RunOutcome::Passed);
    let watcher = FakeWatcher::default();

    let (result, output) = run(
        &root,
        invocation("test:watch", &[]),
        &karma,
        &watcher,
        &FakeOpener::default(),
    );
    result.expect("passed");
    assert_eq!(watcher.watched.borrow().len(), 1);
    assert_eq!(karma.started.borrow()[0].single_run, None);
    assert!(output.contains("watching src/**/*.soy for `npm run soy`"));
}

#[test]
fn plan_flag_does_not_start_karma() {
    let root = temp_workspace("plan");
    fs::write(root.join("karma-coverage.conf.js"), "").expect("write config");
    let karma = FakeKarma::new(RunOutcome::Passed);
    let opener = FakeOpener::default();

    let (result, _) = run(
        &root,
        invocation("test:coverage", &["--plan", "--json", "--auto-open-coverage"]),
        &karma,
        &FakeWatcher::default(),
        &opener,
    );
    let payload: serde_json::Value =
        serde_json::from_str(&result.expect("plan")).expect("plan json");
    assert_eq!(payload["schema"], PLAN_SCHEMA);
    assert_eq!(payload["task"], "test:coverage");
    assert_eq!(payload["config"]["source"], "local-suffixed");
    assert_eq!(payload["settings"]["singleRun"], true);
    assert!(payload["settings"].get("browsers").is_none());
    assert!(payload["open_report"]
        .as_str()
        .is_some_and(|path| path.ends_with("coverage/lcov/lcov-report/index.html")));
    assert!(karma.started.borrow().is_empty());
    assert!(opener.opened.borrow().is_empty());
}

#[test]
fn text_plan_includes_command_line() {
    let root = temp_workspace("plan-text");
    let defaults = Defaults::builtin().with_bundle_dir(PathBuf::from("bundled"));
    let karma = FakeKarma::new(RunOutcome::Passed);
    let watcher = FakeWatcher::default();
    let opener = FakeOpener::default();
    let probe = DiskProbe;
    let dispatcher = Dispatcher::new(
        &defaults,
        root.clone(),
        Collaborators {
            server: &karma,
            watcher: &watcher,
            opener: &opener,
            probe: &probe,
        },
    );
    let plan = dispatcher
        .plan(TaskKind::Watch, &OptionOverrides::default())
        .expect("plan");
    let task = find_task("test:watch").expect("task");
    let output = render_plan(task, &plan, false, true).expect("render");
    assert!(output.contains("Task Plan"));
    assert!(output.contains("bundled-generic"));
    assert!(output.contains("karma start"));
    assert!(output.contains("<karma default>"));
    assert!(output.contains("resolution:"));
}

#[test]
fn task_list_json_names_every_task() {
    let payload: serde_json::Value =
        serde_json::from_str(&render_task_list(true).expect("tasks")).expect("json");
    assert_eq!(payload["schema"], TASKS_SCHEMA);
    let names = payload["tasks"]
        .as_array()
        .expect("tasks array")
        .iter()
        .filter_map(|task| task["name"].as_str())
        .collect::<Vec<&str>>();
    assert_eq!(
        names,
        vec![
            "test",
            "test:browsers",
            "test:coverage",
            "test:coverage:open",
            "test:watch"
        ]
    );
    assert_eq!(payload["tasks"][4]["single_run"], serde_json::Value::Null);
    assert_eq!(payload["tasks"][1]["config_suffix"], "browsers");
}

#[test]
fn task_list_text_shows_config_names() {
    let output = render_task_list(false).expect("tasks");
    assert!(output.contains("karma-coverage.conf.js"));
    assert!(output.contains("Keep karma resident"));
}

fn temp_workspace(name: &str) -> PathBuf {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    let root = std::env::temp_dir().join(format!("metal-karma-runner-{name}-{ts}"));
    fs::create_dir_all(&root).expect("mkdir workspace");
    root.canonicalize().expect("canonical workspace")
}
