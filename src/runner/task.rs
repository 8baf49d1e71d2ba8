use std::path::{Path, PathBuf};

use crate::karma::KarmaProcess;
use crate::manifest::load_project_config;
use crate::opener::SystemOpener;
use crate::options::{Defaults, OptionOverrides};
use crate::process::RunOutcome;
use crate::resolver::DiskProbe;
use crate::tasks::{find_task, task_names, Collaborators, Dispatcher, ReportOpen};
use crate::ui::{MessageBlock, NoticeLevel, OutputMode, PlainRenderer, Renderer};
use crate::watcher::PollingWatcher;
use crate::TaskInvocation;

use super::render::{plan_rows, render_plan};
use super::util::parse_task_args;
use super::RunnerError;

pub(super) fn run_task(invocation: &TaskInvocation, cwd: PathBuf) -> Result<String, RunnerError> {
    let server = KarmaProcess;
    let watcher = PollingWatcher::default();
    let opener = SystemOpener;
    let probe = DiskProbe;
    let collaborators = Collaborators {
        server: &server,
        watcher: &watcher,
        opener: &opener,
        probe: &probe,
    };
    let mut renderer = PlainRenderer::stdout(OutputMode::from_env());
    run_task_with(invocation, cwd, collaborators, &mut renderer)
}

/// Plans and, unless `--plan` was given, runs one task to completion.
pub(super) fn run_task_with(
    invocation: &TaskInvocation,
    cwd: PathBuf,
    collaborators: Collaborators<'_>,
    renderer: &mut dyn Renderer,
) -> Result<String, RunnerError> {
    let Some(task) = find_task(&invocation.name) else {
        return Err(RunnerError::UnknownTask {
            name: invocation.name.clone(),
            available: task_names().into_iter().map(str::to_owned).collect(),
        });
    };
    let (flags, cli_overrides) = parse_task_args(task.name, &invocation.args)?;
    let (defaults, file_overrides) = load_defaults(&cwd)?;
    let overrides = file_overrides.overlay(cli_overrides);

    let dispatcher = Dispatcher::new(&defaults, cwd, collaborators);
    let plan = dispatcher.plan(task.kind, &overrides)?;
    if flags.plan {
        return render_plan(task, &plan, flags.output_json, flags.verbose);
    }

    renderer.section(&format!("metal-karma {}", task.name))?;
    renderer.key_values(&plan_rows(task, &plan))?;
    if flags.verbose {
        renderer.bullet_list("resolution", &plan.config.evidence)?;
    }
    renderer.text("")?;

    let dispatch = dispatcher.execute(plan)?;
    match &dispatch.report {
        Some(ReportOpen::Requested(path)) => renderer.notice(
            NoticeLevel::Info,
            &format!("opening coverage report {}", path.display()),
        )?,
        Some(ReportOpen::Failed { path, error }) => renderer.warning_block(
            &MessageBlock::new(
                "Coverage report not opened",
                format!("{}: {error}", path.display()),
            )
            .with_hint("Open the report manually once the run finishes"),
        )?,
        None => {}
    }
    if let Some(watch) = &dispatch.plan.extra_watch {
        renderer.notice(
            NoticeLevel::Info,
            &format!("watching {} for `{}`", watch.src.join(", "), watch.run),
        )?;
    }

    match dispatch.wait()? {
        RunOutcome::Passed => {
            renderer.notice(NoticeLevel::Success, &format!("{} passed", task.name))?;
            Ok(String::new())
        }
        RunOutcome::Failed {
            code, diagnostic, ..
        } => Err(RunnerError::TestsFailed {
            task: task.name.to_owned(),
            code,
            diagnostic,
        }),
    }
}

/// Builtin defaults with `metal-karma.toml` applied, plus the file's option layer.
fn load_defaults(cwd: &Path) -> Result<(Defaults, OptionOverrides), RunnerError> {
    let defaults = Defaults::builtin();
    let Some(project) = load_project_config(cwd)? else {
        return Ok((defaults, OptionOverrides::default()));
    };
    let defaults = match project.bundle_dir {
        Some(dir) => defaults.with_bundle_dir(dir),
        None => defaults,
    };
    Ok((defaults, project.overrides))
}
