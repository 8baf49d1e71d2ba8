use std::path::PathBuf;

use crate::bundle::BundleError;
use crate::manifest::ManifestError;
use crate::tasks::DispatchError;
use crate::{usage_text, Command};

mod build;
mod render;
mod task;
mod util;

use build::run_build;
use render::render_task_list;
use task::run_task;

pub const PLAN_SCHEMA: &str = "metal-karma.plan.v1";
pub const TASKS_SCHEMA: &str = "metal-karma.tasks.v1";
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug)]
pub enum RunnerError {
    Cwd(std::io::Error),
    Manifest(ManifestError),
    Dispatch(DispatchError),
    Bundle(BundleError),
    Ui(String),
    Json(serde_json::Error),
    TaskInvocation(String),
    UnknownTask {
        name: String,
        available: Vec<String>,
    },
    TestsFailed {
        task: String,
        code: Option<i32>,
        diagnostic: String,
    },
}

impl RunnerError {
    /// Process exit code for this failure; a failed karma run forwards its own code.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunnerError::TestsFailed {
                code: Some(code), ..
            } if *code != 0 => *code,
            RunnerError::TaskInvocation(_) | RunnerError::UnknownTask { .. } => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for RunnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerError::Cwd(err) => write!(f, "failed to resolve current directory: {err}"),
            RunnerError::Manifest(err) => write!(f, "{err}"),
            RunnerError::Dispatch(err) => write!(f, "{err}"),
            RunnerError::Bundle(err) => write!(f, "{err}"),
            RunnerError::Ui(msg) => write!(f, "ui render failed: {msg}"),
            RunnerError::Json(err) => write!(f, "failed to encode json: {err}"),
            RunnerError::TaskInvocation(msg) => write!(f, "{msg}"),
            RunnerError::UnknownTask { name, available } => write!(
                f,
                "task `{name}` is not defined (available: {})",
                available.join(", ")
            ),
            RunnerError::TestsFailed {
                task,
                code,
                diagnostic,
            } => {
                if diagnostic.is_empty() {
                    write!(f, "`{task}` failed (code={:?})", code)
                } else {
                    write!(f, "`{task}` failed (code={:?}): {diagnostic}", code)
                }
            }
        }
    }
}

impl std::error::Error for RunnerError {}

impl From<crate::ui::UiError> for RunnerError {
    fn from(value: crate::ui::UiError) -> Self {
        Self::Ui(value.to_string())
    }
}

impl From<ManifestError> for RunnerError {
    fn from(value: ManifestError) -> Self {
        Self::Manifest(value)
    }
}

impl From<DispatchError> for RunnerError {
    fn from(value: DispatchError) -> Self {
        Self::Dispatch(value)
    }
}

impl From<BundleError> for RunnerError {
    fn from(value: BundleError) -> Self {
        Self::Bundle(value)
    }
}

impl From<serde_json::Error> for RunnerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

pub fn run_command(cmd: Command) -> Result<String, RunnerError> {
    match cmd {
        Command::Help => Ok(usage_text().to_owned()),
        Command::Tasks(args) => render_task_list(args.output_json),
        Command::Build(args) => run_build(&args, &current_dir()?),
        Command::Task(task) => run_task(&task, current_dir()?),
    }
}

fn current_dir() -> Result<PathBuf, RunnerError> {
    let cwd = std::env::current_dir().map_err(RunnerError::Cwd)?;
    Ok(cwd.canonicalize().unwrap_or(cwd))
}

#[cfg(test)]
#[path = "../tests/runner/runner_tests.rs"]
mod tests;
