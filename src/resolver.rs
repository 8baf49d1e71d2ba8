use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::bundled::BundledConfig;

pub const LOCAL_CONFIG_STEM: &str = "karma";
pub const LOCAL_CONFIG_EXTENSION: &str = ".conf.js";

/// Task variant tag used to pick `karma-<suffix>.conf.js`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSuffix {
    Browsers,
    Coverage,
}

impl ConfigSuffix {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSuffix::Browsers => "browsers",
            ConfigSuffix::Coverage => "coverage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    LocalSuffixed,
    LocalGeneric,
    Explicit,
    Bundled(BundledConfig),
}

impl ConfigSource {
    pub fn label(self) -> &'static str {
        match self {
            ConfigSource::LocalSuffixed => "local-suffixed",
            ConfigSource::LocalGeneric => "local-generic",
            ConfigSource::Explicit => "explicit",
            ConfigSource::Bundled(BundledConfig::Generic) => "bundled-generic",
            ConfigSource::Bundled(BundledConfig::Coverage) => "bundled-coverage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub path: PathBuf,
    pub source: ConfigSource,
    pub evidence: Vec<String>,
}

#[derive(Debug)]
pub enum ResolveError {
    Probe { path: PathBuf, error: std::io::Error },
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::Probe { path, error } => {
                write!(f, "failed to check config file {}: {error}", path.display())
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Existence check used by the resolver.
pub trait FileProbe {
    fn exists(&self, path: &Path) -> std::io::Result<bool>;
}

/// Checks the real filesystem. Only `NotFound` counts as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskProbe;

impl FileProbe for DiskProbe {
    fn exists(&self, path: &Path) -> std::io::Result<bool> {
        match fs::metadata(path) {
            Ok(_) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error),
        }
    }
}

/// A probed location; the first one that exists wins.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    path: PathBuf,
    source: ConfigSource,
}

pub struct ConfigResolver<'a> {
    cwd: &'a Path,
    bundle_dir: &'a Path,
    probe: &'a dyn FileProbe,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(cwd: &'a Path, bundle_dir: &'a Path, probe: &'a dyn FileProbe) -> Self {
        Self {
            cwd,
            bundle_dir,
            probe,
        }
    }

    /// Picks the config file for a task.
    ///
    /// Local candidates are probed in order; when none exists the fallback is
    /// used unconditionally. `fallback` stands in for the bundled generic
    /// default and is taken relative to the working directory.
    pub fn resolve(
        &self,
        suffix: Option<ConfigSuffix>,
        fallback: Option<&Path>,
    ) -> Result<ResolvedConfig, ResolveError> {
        let mut evidence = Vec::<String>::new();
        for Candidate { path, source } in self.local_candidates(suffix) {
            let found = self
                .probe
                .exists(&path)
                .map_err(|error| ResolveError::Probe {
                    path: path.clone(),
                    error,
                })?;
            if found {
                evidence.push(format!("found {}", path.display()));
                return Ok(ResolvedConfig {
                    path,
                    source,
                    evidence,
                });
            }
            evidence.push(format!("{} not found", path.display()));
        }

        let Candidate { path, source } = self.fallback_candidate(fallback);
        evidence.push(format!("using {} config {}", source.label(), path.display()));
        Ok(ResolvedConfig {
            path,
            source,
            evidence,
        })
    }

    fn local_candidates(&self, suffix: Option<ConfigSuffix>) -> Vec<Candidate> {
        let mut candidates = Vec::with_capacity(2);
        if let Some(suffix) = suffix {
            candidates.push(Candidate {
                path: self.cwd.join(local_config_name(Some(suffix))),
                source: ConfigSource::LocalSuffixed,
            });
        }
        candidates.push(Candidate {
            path: self.cwd.join(local_config_name(None)),
            source: ConfigSource::LocalGeneric,
        });
        candidates
    }

    fn fallback_candidate(&self, fallback: Option<&Path>) -> Candidate {
        let Some(fallback) = fallback else {
            return Candidate {
                path: BundledConfig::Generic.path_in(self.bundle_dir),
                source: ConfigSource::Bundled(BundledConfig::Generic),
            };
        };
        let path = self.cwd.join(fallback);
        let source = BundledConfig::from_path(self.bundle_dir, &path)
            .map(ConfigSource::Bundled)
            .unwrap_or(ConfigSource::Explicit);
        Candidate { path, source }
    }
}

pub fn local_config_name(suffix: Option<ConfigSuffix>) -> String {
    match suffix {
        Some(suffix) => format!(
            "{LOCAL_CONFIG_STEM}-{}{LOCAL_CONFIG_EXTENSION}",
            suffix.as_str()
        ),
        None => format!("{LOCAL_CONFIG_STEM}{LOCAL_CONFIG_EXTENSION}"),
    }
}

#[cfg(test)]
#[path = "tests/resolver_tests.rs"]
mod tests;
