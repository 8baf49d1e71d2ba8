use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const GENERIC_CONFIG: &str = include_str!("../assets/karma-configs/karma.conf.js");
const COVERAGE_CONFIG: &str = include_str!("../assets/karma-configs/karma-coverage.conf.js");

/// Karma configuration files shipped with this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundledConfig {
    Generic,
    Coverage,
}

impl BundledConfig {
    pub fn file_name(self) -> &'static str {
        match self {
            BundledConfig::Generic => "karma.conf.js",
            BundledConfig::Coverage => "karma-coverage.conf.js",
        }
    }

    pub fn contents(self) -> &'static str {
        match self {
            BundledConfig::Generic => GENERIC_CONFIG,
            BundledConfig::Coverage => COVERAGE_CONFIG,
        }
    }

    pub fn path_in(self, bundle_dir: &Path) -> PathBuf {
        bundle_dir.join(self.file_name())
    }

    /// Returns the bundled config matching `path`, if it points into `bundle_dir`.
    pub fn from_path(bundle_dir: &Path, path: &Path) -> Option<BundledConfig> {
        [BundledConfig::Generic, BundledConfig::Coverage]
            .into_iter()
            .find(|config| config.path_in(bundle_dir) == path)
    }

    /// Writes the config into `bundle_dir` unless an identical copy is already there.
    pub fn materialize(self, bundle_dir: &Path) -> std::io::Result<PathBuf> {
        let path = self.path_in(bundle_dir);
        match fs::read_to_string(&path) {
            Ok(existing) if existing == self.contents() => return Ok(path),
            Ok(_) => {}
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => return Err(error),
        }
        fs::create_dir_all(bundle_dir)?;
        // Other projects may share the bundle dir; readers never see a partial file.
        let staging = bundle_dir.join(format!(
            ".{}.{}.tmp",
            self.file_name(),
            std::process::id()
        ));
        fs::write(&staging, self.contents())?;
        if let Err(error) = fs::rename(&staging, &path) {
            let _ = fs::remove_file(&staging);
            return Err(error);
        }
        Ok(path)
    }
}
