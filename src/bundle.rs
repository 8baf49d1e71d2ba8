use std::path::{Path, PathBuf};

use crate::process::{
    shell_command, shell_quote, watch_child, Completion, CompletionError, OutputMode, RunOutcome,
};

pub const DEFAULT_BUNDLE_FILE_NAME: &str = "metal.js";
pub const DEFAULT_GLOBAL_NAME: &str = "metal";
pub const DEFAULT_BUNDLER_ENTRY: &str = "rollup";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOptions {
    pub src: PathBuf,
    pub dest: PathBuf,
    pub global_name: Option<String>,
    pub bundle_file_name: Option<String>,
}

impl BundleOptions {
    pub fn new(src: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
            global_name: None,
            bundle_file_name: None,
        }
    }

    pub fn with_global_name(mut self, name: impl Into<String>) -> Self {
        self.global_name = Some(name.into());
        self
    }

    pub fn with_bundle_file_name(mut self, name: impl Into<String>) -> Self {
        self.bundle_file_name = Some(name.into());
        self
    }

    pub fn bundle_path(&self) -> PathBuf {
        self.dest.join(
            self.bundle_file_name
                .as_deref()
                .unwrap_or(DEFAULT_BUNDLE_FILE_NAME),
        )
    }

    pub fn source_map_path(&self) -> PathBuf {
        let mut name = self.bundle_path().into_os_string();
        name.push(".map");
        PathBuf::from(name)
    }

    /// Rollup CLI arguments producing a UMD bundle plus an external source map.
    pub fn rollup_args(&self) -> Vec<String> {
        vec![
            self.src.display().to_string(),
            "--file".to_owned(),
            self.bundle_path().display().to_string(),
            "--format".to_owned(),
            "umd".to_owned(),
            "--name".to_owned(),
            self.global_name
                .clone()
                .unwrap_or_else(|| DEFAULT_GLOBAL_NAME.to_owned()),
            "--sourcemap".to_owned(),
        ]
    }
}

#[derive(Debug)]
pub enum BundleError {
    Launch {
        command: String,
        error: std::io::Error,
    },
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    MissingOutput {
        path: PathBuf,
    },
    Completion(CompletionError),
}

impl std::fmt::Display for BundleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BundleError::Launch { command, error } => {
                write!(f, "failed to launch bundler `{command}`: {error}")
            }
            BundleError::Failed {
                command,
                code,
                stderr,
            } => {
                if stderr.is_empty() {
                    write!(f, "bundler failed `{command}` (code={:?})", code)
                } else {
                    write!(
                        f,
                        "bundler failed `{command}` (code={:?})\nstderr:\n{}",
                        code, stderr
                    )
                }
            }
            BundleError::MissingOutput { path } => {
                write!(f, "bundler finished without writing {}", path.display())
            }
            BundleError::Completion(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for BundleError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleArtifacts {
    pub bundle: PathBuf,
    pub source_map: PathBuf,
}

/// A running bundler; ends once the bundle and its source map are written.
#[derive(Debug)]
pub struct BundleCompletion {
    command: String,
    completion: Completion,
    artifacts: BundleArtifacts,
}

impl BundleCompletion {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn wait(self) -> Result<BundleArtifacts, BundleError> {
        let outcome = self.completion.wait().map_err(BundleError::Completion)?;
        if let RunOutcome::Failed { code, stderr, .. } = outcome {
            return Err(BundleError::Failed {
                command: self.command,
                code,
                stderr,
            });
        }
        for path in [&self.artifacts.bundle, &self.artifacts.source_map] {
            if !path.is_file() {
                return Err(BundleError::MissingOutput { path: path.clone() });
            }
        }
        Ok(self.artifacts)
    }
}

/// Starts rollup from `cwd`; relative `src`/`dest` are taken from there.
pub fn start_bundle(
    entry: &str,
    options: &BundleOptions,
    cwd: &Path,
) -> Result<BundleCompletion, BundleError> {
    let options = BundleOptions {
        src: cwd.join(&options.src),
        dest: cwd.join(&options.dest),
        ..options.clone()
    };
    let args = options
        .rollup_args()
        .iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<String>>()
        .join(" ");
    let command = format!("{entry} {args}");
    let child = shell_command(&command, cwd, OutputMode::Capture)
        .spawn()
        .map_err(|error| BundleError::Launch {
            command: command.clone(),
            error,
        })?;
    Ok(BundleCompletion {
        command,
        completion: watch_child(child),
        artifacts: BundleArtifacts {
            bundle: options.bundle_path(),
            source_map: options.source_map_path(),
        },
    })
}

#[cfg(test)]
#[path = "tests/bundle_tests.rs"]
mod tests;
