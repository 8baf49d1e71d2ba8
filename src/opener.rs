use std::path::Path;
use std::process::{Command as ProcessCommand, Stdio};
use std::thread;

#[derive(Debug)]
pub enum OpenError {
    Launch {
        program: String,
        error: std::io::Error,
    },
}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenError::Launch { program, error } => {
                write!(f, "failed to launch `{program}`: {error}")
            }
        }
    }
}

impl std::error::Error for OpenError {}

/// Opens a file with the desktop's default handler.
pub trait FileOpener {
    /// Fire and forget: returns once the request is issued.
    fn open(&self, path: &Path) -> Result<(), OpenError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl FileOpener for SystemOpener {
    fn open(&self, path: &Path) -> Result<(), OpenError> {
        let (program, mut process) = platform_open_command(path);
        process
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let mut child = process.spawn().map_err(|error| OpenError::Launch {
            program: program.to_owned(),
            error,
        })?;
        thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

fn platform_open_command(path: &Path) -> (&'static str, ProcessCommand) {
    #[cfg(target_os = "macos")]
    {
        let mut process = ProcessCommand::new("open");
        process.arg(path);
        ("open", process)
    }
    #[cfg(windows)]
    {
        let mut process = ProcessCommand::new("cmd");
        process.args(["/C", "start", ""]).arg(path);
        ("cmd", process)
    }
    #[cfg(not(any(target_os = "macos", windows)))]
    {
        let mut process = ProcessCommand::new("xdg-open");
        process.arg(path);
        ("xdg-open", process)
    }
}
