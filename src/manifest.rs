use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::options::{ExtraWatch, OptionOverrides};

pub const PROJECT_CONFIG_FILE: &str = "metal-karma.toml";

#[derive(Debug)]
pub enum ManifestError {
    Read {
        path: PathBuf,
        error: std::io::Error,
    },
    Parse {
        path: PathBuf,
        error: toml::de::Error,
    },
    Invalid {
        path: PathBuf,
        detail: String,
    },
}

impl std::fmt::Display for ManifestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestError::Read { path, error } => {
                write!(f, "failed to read {}: {error}", path.display())
            }
            ManifestError::Parse { path, error } => {
                write!(f, "failed to parse {}: {error}", path.display())
            }
            ManifestError::Invalid { path, detail } => {
                write!(f, "invalid {}: {detail}", path.display())
            }
        }
    }
}

impl std::error::Error for ManifestError {}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectManifest {
    #[serde(default)]
    options: Option<ManifestOptions>,
    #[serde(default)]
    extra_watch: Option<ManifestExtraWatch>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestOptions {
    #[serde(default)]
    karma: Option<String>,
    #[serde(default, alias = "browsers")]
    all_browsers: Option<Vec<String>>,
    #[serde(default)]
    auto_open_coverage: Option<bool>,
    #[serde(default)]
    base_path: Option<PathBuf>,
    #[serde(default)]
    config_file: Option<PathBuf>,
    #[serde(default)]
    bundle_dir: Option<PathBuf>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestExtraWatch {
    src: ManifestWatchSrc,
    run: String,
}

#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum ManifestWatchSrc {
    One(String),
    Many(Vec<String>),
}

impl ManifestWatchSrc {
    fn into_patterns(self) -> Vec<String> {
        match self {
            ManifestWatchSrc::One(pattern) => vec![pattern],
            ManifestWatchSrc::Many(patterns) => patterns,
        }
    }
}

/// Options read from the project's `metal-karma.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub path: PathBuf,
    pub overrides: OptionOverrides,
    pub bundle_dir: Option<PathBuf>,
}

/// Loads `metal-karma.toml` from `cwd`; a missing file is not an error.
pub fn load_project_config(cwd: &Path) -> Result<Option<ProjectConfig>, ManifestError> {
    let path = cwd.join(PROJECT_CONFIG_FILE);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(ManifestError::Read { path, error }),
    };
    parse_project_config(&raw, path).map(Some)
}

pub fn parse_project_config(raw: &str, path: PathBuf) -> Result<ProjectConfig, ManifestError> {
    let manifest = toml::from_str::<ProjectManifest>(raw).map_err(|error| {
        ManifestError::Parse {
            path: path.clone(),
            error,
        }
    })?;
    let options = manifest.options.unwrap_or_default();
    if options
        .all_browsers
        .as_ref()
        .is_some_and(|browsers| browsers.iter().all(|name| name.trim().is_empty()))
    {
        return Err(ManifestError::Invalid {
            path,
            detail: "options.all_browsers must name at least one browser".to_owned(),
        });
    }
    let extra_watch = manifest.extra_watch.map(|watch| ExtraWatch {
        src: watch.src.into_patterns(),
        run: watch.run,
    });
    Ok(ProjectConfig {
        path,
        overrides: OptionOverrides {
            karma: options.karma,
            all_browsers: options.all_browsers,
            auto_open_coverage: options.auto_open_coverage,
            base_path: options.base_path,
            config_file: options.config_file,
            extra_watch,
        },
        bundle_dir: options.bundle_dir,
    })
}

#[cfg(test)]
#[path = "tests/manifest_tests.rs"]
mod tests;
