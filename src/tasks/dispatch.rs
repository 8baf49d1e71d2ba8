use std::path::PathBuf;

use crate::bundled::BundledConfig;
use crate::karma::{KarmaServer, RunnerSettings, StartError};
use crate::opener::{FileOpener, OpenError};
use crate::options::{Defaults, ExtraWatch, OptionOverrides, TestOptions};
use crate::process::{Completion, CompletionError, RunOutcome};
use crate::resolver::{ConfigResolver, ConfigSource, FileProbe, ResolveError, ResolvedConfig};
use crate::watcher::{FileWatcher, WatchError, WatchHandle};

use super::TaskKind;

pub const COVERAGE_REPORT_PATH: &str = "coverage/lcov/lcov-report/index.html";

#[derive(Debug)]
pub enum DispatchError {
    MissingRunnerEntry,
    Resolve(ResolveError),
    BundledConfig {
        path: PathBuf,
        error: std::io::Error,
    },
    Watch(WatchError),
    Start(StartError),
    Completion(CompletionError),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::MissingRunnerEntry => {
                write!(f, "no karma entry point configured (`karma` option is empty)")
            }
            DispatchError::Resolve(err) => write!(f, "{err}"),
            DispatchError::BundledConfig { path, error } => write!(
                f,
                "failed to write bundled karma config {}: {error}",
                path.display()
            ),
            DispatchError::Watch(err) => write!(f, "{err}"),
            DispatchError::Start(err) => write!(f, "{err}"),
            DispatchError::Completion(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<ResolveError> for DispatchError {
    fn from(value: ResolveError) -> Self {
        Self::Resolve(value)
    }
}

impl From<WatchError> for DispatchError {
    fn from(value: WatchError) -> Self {
        Self::Watch(value)
    }
}

impl From<StartError> for DispatchError {
    fn from(value: StartError) -> Self {
        Self::Start(value)
    }
}

impl From<CompletionError> for DispatchError {
    fn from(value: CompletionError) -> Self {
        Self::Completion(value)
    }
}

/// External services a dispatch talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub server: &'a dyn KarmaServer,
    pub watcher: &'a dyn FileWatcher,
    pub opener: &'a dyn FileOpener,
    pub probe: &'a dyn FileProbe,
}

/// Everything decided for a task before anything is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPlan {
    pub kind: TaskKind,
    pub options: TestOptions,
    pub settings: RunnerSettings,
    pub config: ResolvedConfig,
    pub open_report: Option<PathBuf>,
    pub extra_watch: Option<ExtraWatch>,
}

#[derive(Debug)]
pub enum ReportOpen {
    Requested(PathBuf),
    Failed { path: PathBuf, error: OpenError },
}

/// A started task. The report open, if any, was issued independently of completion.
#[derive(Debug)]
pub struct Dispatch {
    pub plan: TaskPlan,
    pub completion: Completion,
    pub report: Option<ReportOpen>,
    pub extra_watch: Option<WatchHandle>,
}

impl Dispatch {
    /// Waits for the runner; the extra watch stays registered until then.
    pub fn wait(self) -> Result<RunOutcome, DispatchError> {
        let Dispatch {
            completion,
            extra_watch,
            ..
        } = self;
        let outcome = completion.wait();
        drop(extra_watch);
        Ok(outcome?)
    }
}

pub struct Dispatcher<'a> {
    defaults: &'a Defaults,
    cwd: PathBuf,
    collaborators: Collaborators<'a>,
}

impl<'a> Dispatcher<'a> {
    /// `cwd` must be absolute; every resolved path is anchored on it.
    pub fn new(defaults: &'a Defaults, cwd: PathBuf, collaborators: Collaborators<'a>) -> Self {
        Self {
            defaults,
            cwd,
            collaborators,
        }
    }

    pub fn run(&self, overrides: &OptionOverrides) -> Result<Dispatch, DispatchError> {
        self.dispatch(TaskKind::Run, overrides)
    }

    pub fn run_browsers(&self, overrides: &OptionOverrides) -> Result<Dispatch, DispatchError> {
        self.dispatch(TaskKind::RunBrowsers, overrides)
    }

    pub fn run_with_coverage(
        &self,
        overrides: &OptionOverrides,
    ) -> Result<Dispatch, DispatchError> {
        self.dispatch(TaskKind::RunWithCoverage, overrides)
    }

    pub fn run_with_coverage_and_open(
        &self,
        overrides: &OptionOverrides,
    ) -> Result<Dispatch, DispatchError> {
        self.dispatch(TaskKind::RunWithCoverageAndOpen, overrides)
    }

    pub fn watch(&self, overrides: &OptionOverrides) -> Result<Dispatch, DispatchError> {
        self.dispatch(TaskKind::Watch, overrides)
    }

    pub fn dispatch(
        &self,
        kind: TaskKind,
        overrides: &OptionOverrides,
    ) -> Result<Dispatch, DispatchError> {
        let plan = self.plan(kind, overrides)?;
        self.execute(plan)
    }

    /// Merges options and resolves the config file without starting anything.
    pub fn plan(
        &self,
        kind: TaskKind,
        overrides: &OptionOverrides,
    ) -> Result<TaskPlan, DispatchError> {
        let forced;
        let overrides = if kind == TaskKind::RunWithCoverageAndOpen {
            forced = OptionOverrides {
                auto_open_coverage: Some(true),
                ..overrides.clone()
            };
            &forced
        } else {
            overrides
        };
        let options = self.defaults.options.merge(overrides);
        if options.karma.trim().is_empty() {
            return Err(DispatchError::MissingRunnerEntry);
        }

        let bundle_dir = self.bundle_dir();
        let fallback = if kind.is_coverage() {
            Some(BundledConfig::Coverage.path_in(&bundle_dir))
        } else {
            options.config_file.clone()
        };
        let resolver = ConfigResolver::new(&self.cwd, &bundle_dir, self.collaborators.probe);
        let config = resolver.resolve(kind.suffix(), fallback.as_deref())?;

        let base_path = options
            .base_path
            .as_ref()
            .map(|path| self.cwd.join(path))
            .unwrap_or_else(|| self.cwd.clone());
        let settings = RunnerSettings {
            config_file: config.path.clone(),
            base_path,
            single_run: kind.single_run(),
            browsers: (kind == TaskKind::RunBrowsers).then(|| options.all_browsers.clone()),
        };
        // karma-coverage writes its report under the base path.
        let open_report = (kind.is_coverage() && options.auto_open_coverage)
            .then(|| settings.base_path.join(COVERAGE_REPORT_PATH));
        let extra_watch = if kind == TaskKind::Watch {
            options.extra_watch.clone()
        } else {
            None
        };

        Ok(TaskPlan {
            kind,
            options,
            settings,
            config,
            open_report,
            extra_watch,
        })
    }

    /// Starts a planned task: extra watch first, then karma, then the report open.
    pub fn execute(&self, plan: TaskPlan) -> Result<Dispatch, DispatchError> {
        if let ConfigSource::Bundled(bundled) = plan.config.source {
            bundled
                .materialize(&self.bundle_dir())
                .map_err(|error| DispatchError::BundledConfig {
                    path: plan.config.path.clone(),
                    error,
                })?;
        }

        let extra_watch = match plan.extra_watch.as_ref() {
            Some(spec) => Some(self.collaborators.watcher.watch(spec, &self.cwd)?),
            None => None,
        };

        let completion = self
            .collaborators
            .server
            .start(&plan.options.karma, &plan.settings, &self.cwd)?;

        // The report may not exist yet; opening is not sequenced behind completion.
        let report = plan
            .open_report
            .as_ref()
            .map(|path| match self.collaborators.opener.open(path) {
                Ok(()) => ReportOpen::Requested(path.clone()),
                Err(error) => ReportOpen::Failed {
                    path: path.clone(),
                    error,
                },
            });

        Ok(Dispatch {
            plan,
            completion,
            report,
            extra_watch,
        })
    }

    fn bundle_dir(&self) -> PathBuf {
        self.cwd.join(&self.defaults.bundle_dir)
    }
}

#[cfg(test)]
#[path = "../tests/tasks/dispatch_tests.rs"]
mod tests;
