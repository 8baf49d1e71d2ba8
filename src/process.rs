use std::path::Path;
#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command as ProcessCommand, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

/// Final state of an external process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Passed,
    Failed {
        code: Option<i32>,
        diagnostic: String,
        stderr: String,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Passed)
    }

    pub fn from_status(status: ExitStatus, stderr: String) -> Self {
        if status.success() {
            return RunOutcome::Passed;
        }
        RunOutcome::Failed {
            code: status.code(),
            diagnostic: format_exit_diagnostic(status),
            stderr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    Disconnected,
    Wait(String),
}

impl std::fmt::Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionError::Disconnected => {
                write!(f, "process finished without reporting an outcome")
            }
            CompletionError::Wait(msg) => write!(f, "failed waiting for process: {msg}"),
        }
    }
}

impl std::error::Error for CompletionError {}

/// Pending result of a started process.
#[derive(Debug)]
pub struct Completion {
    rx: Receiver<Result<RunOutcome, CompletionError>>,
}

/// Producer side of a [`Completion`].
#[derive(Debug)]
pub struct CompletionSender {
    tx: Sender<Result<RunOutcome, CompletionError>>,
}

impl Completion {
    pub fn channel() -> (CompletionSender, Completion) {
        let (tx, rx) = mpsc::channel();
        (CompletionSender { tx }, Completion { rx })
    }

    pub fn ready(outcome: RunOutcome) -> Completion {
        let (sender, completion) = Completion::channel();
        sender.complete(outcome);
        completion
    }

    pub fn wait(self) -> Result<RunOutcome, CompletionError> {
        self.rx.recv().map_err(|_| CompletionError::Disconnected)?
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<RunOutcome, CompletionError>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(CompletionError::Disconnected)),
        }
    }

    pub fn try_outcome(&self) -> Option<Result<RunOutcome, CompletionError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(CompletionError::Disconnected)),
        }
    }
}

impl CompletionSender {
    pub fn complete(self, outcome: RunOutcome) {
        let _ = self.tx.send(Ok(outcome));
    }

    pub fn fail(self, error: CompletionError) {
        let _ = self.tx.send(Err(error));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Inherit,
    Capture,
    Discard,
}

/// Builds `sh -c <run>` rooted at `cwd` with the project's local node binaries first on PATH.
pub fn shell_command(run: &str, cwd: &Path, output: OutputMode) -> ProcessCommand {
    let mut process = ProcessCommand::new("sh");
    process.arg("-c").arg(run).current_dir(cwd);
    match output {
        OutputMode::Inherit => {
            process
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        }
        OutputMode::Capture => {
            process
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }
        OutputMode::Discard => {
            process
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
        }
    }
    with_local_node_bin_path(&mut process, cwd);
    process
}

/// Reaps `child` on a background thread and reports its outcome.
pub fn watch_child(child: Child) -> Completion {
    let (sender, completion) = Completion::channel();
    thread::spawn(move || match child.wait_with_output() {
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            sender.complete(RunOutcome::from_status(output.status, stderr));
        }
        Err(error) => sender.fail(CompletionError::Wait(error.to_string())),
    });
    completion
}

pub fn with_local_node_bin_path(process: &mut ProcessCommand, cwd: &Path) {
    let local_bin = cwd.join("node_modules/.bin");
    if !local_bin.is_dir() {
        return;
    }
    let local_rendered = local_bin.display().to_string();
    let merged = match std::env::var("PATH") {
        Ok(path) if !path.is_empty() => format!("{local_rendered}:{path}"),
        _ => local_rendered,
    };
    process.env("PATH", merged);
}

pub fn shell_quote(raw: &str) -> String {
    if raw.is_empty() {
        return "''".to_owned();
    }
    if raw
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '-' | '_' | ',' | ':' | '='))
    {
        return raw.to_owned();
    }
    let escaped = raw.replace('\'', "'\"'\"'");
    format!("'{escaped}'")
}

pub fn format_exit_diagnostic(status: ExitStatus) -> String {
    #[cfg(unix)]
    {
        if let Some(code) = status.code() {
            return format!("exit={code}");
        }
        if let Some(signal) = status.signal() {
            return format!("signal={signal}");
        }
        "exit=unknown".to_owned()
    }
    #[cfg(not(unix))]
    {
        format!("exit={}", status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
#[path = "tests/process_tests.rs"]
mod tests;
