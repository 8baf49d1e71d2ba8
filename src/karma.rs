use std::path::{Path, PathBuf};

use crate::process::{shell_command, shell_quote, watch_child, Completion, OutputMode};

/// The settings object handed to Karma for one run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerSettings {
    pub config_file: PathBuf,
    pub base_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single_run: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browsers: Option<Vec<String>>,
}

impl RunnerSettings {
    /// Arguments for `karma start`. Karma camel-cases unknown flags into config keys.
    pub fn karma_args(&self) -> Vec<String> {
        let mut args = vec![
            "start".to_owned(),
            self.config_file.display().to_string(),
            "--base-path".to_owned(),
            self.base_path.display().to_string(),
        ];
        if self.single_run == Some(true) {
            args.push("--single-run".to_owned());
        }
        if let Some(browsers) = &self.browsers {
            args.push("--browsers".to_owned());
            args.push(browsers.join(","));
        }
        args
    }

    pub fn command_line(&self, entry: &str) -> String {
        let args = self
            .karma_args()
            .iter()
            .map(|arg| shell_quote(arg))
            .collect::<Vec<String>>()
            .join(" ");
        format!("{entry} {args}")
    }
}

#[derive(Debug)]
pub enum StartError {
    Launch {
        command: String,
        error: std::io::Error,
    },
}

impl std::fmt::Display for StartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartError::Launch { command, error } => {
                write!(f, "failed to start karma with `{command}`: {error}")
            }
        }
    }
}

impl std::error::Error for StartError {}

/// The external test runner.
pub trait KarmaServer {
    /// Starts a run from `cwd` and returns without waiting for it to finish.
    fn start(
        &self,
        entry: &str,
        settings: &RunnerSettings,
        cwd: &Path,
    ) -> Result<Completion, StartError>;
}

/// Runs the `karma` CLI as a child process sharing this terminal.
///
/// The process runs from the project directory so `node_modules/.bin` is found
/// there even when `basePath` points elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct KarmaProcess;

impl KarmaServer for KarmaProcess {
    fn start(
        &self,
        entry: &str,
        settings: &RunnerSettings,
        cwd: &Path,
    ) -> Result<Completion, StartError> {
        let command = settings.command_line(entry);
        let child = shell_command(&command, cwd, OutputMode::Inherit)
            .spawn()
            .map_err(|error| StartError::Launch {
                command: command.clone(),
                error,
            })?;
        Ok(watch_child(child))
    }
}
