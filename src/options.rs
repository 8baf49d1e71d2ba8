use std::path::PathBuf;

pub const DEFAULT_KARMA_ENTRY: &str = "karma";
pub const DEFAULT_BROWSERS: [&str; 3] = ["Chrome", "Firefox", "Safari"];
pub const BUNDLE_DIR_NAME: &str = "metal-karma";

/// An auxiliary path watch registered alongside `test:watch`.
///
/// `run` is a shell command executed from the working directory whenever a file
/// matching one of the `src` globs changes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExtraWatch {
    pub src: Vec<String>,
    pub run: String,
}

/// Effective options for one task invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOptions {
    pub karma: String,
    pub all_browsers: Vec<String>,
    pub auto_open_coverage: bool,
    pub base_path: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub extra_watch: Option<ExtraWatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionOverrides {
    pub karma: Option<String>,
    pub all_browsers: Option<Vec<String>>,
    pub auto_open_coverage: Option<bool>,
    pub base_path: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub extra_watch: Option<ExtraWatch>,
}

/// Baseline state shared by every invocation. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub options: TestOptions,
    pub bundle_dir: PathBuf,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            karma: DEFAULT_KARMA_ENTRY.to_owned(),
            all_browsers: DEFAULT_BROWSERS.iter().map(|name| (*name).to_owned()).collect(),
            auto_open_coverage: false,
            base_path: None,
            config_file: None,
            extra_watch: None,
        }
    }
}

impl TestOptions {
    /// Overlays `overrides` on top of `self`, returning a new value.
    ///
    /// Only top-level fields are merged; a supplied `extra_watch` replaces
    /// the default one wholesale.
    pub fn merge(&self, overrides: &OptionOverrides) -> TestOptions {
        TestOptions {
            karma: overrides.karma.clone().unwrap_or_else(|| self.karma.clone()),
            all_browsers: overrides
                .all_browsers
                .clone()
                .unwrap_or_else(|| self.all_browsers.clone()),
            auto_open_coverage: overrides
                .auto_open_coverage
                .unwrap_or(self.auto_open_coverage),
            base_path: overrides.base_path.clone().or_else(|| self.base_path.clone()),
            config_file: overrides
                .config_file
                .clone()
                .or_else(|| self.config_file.clone()),
            extra_watch: overrides
                .extra_watch
                .clone()
                .or_else(|| self.extra_watch.clone()),
        }
    }
}

impl OptionOverrides {
    /// Stacks `higher` on top of `self`; fields set in `higher` win.
    pub fn overlay(self, higher: OptionOverrides) -> OptionOverrides {
        OptionOverrides {
            karma: higher.karma.or(self.karma),
            all_browsers: higher.all_browsers.or(self.all_browsers),
            auto_open_coverage: higher.auto_open_coverage.or(self.auto_open_coverage),
            base_path: higher.base_path.or(self.base_path),
            config_file: higher.config_file.or(self.config_file),
            extra_watch: higher.extra_watch.or(self.extra_watch),
        }
    }
}

impl Defaults {
    pub fn new(options: TestOptions, bundle_dir: PathBuf) -> Self {
        Self {
            options,
            bundle_dir,
        }
    }

    pub fn builtin() -> Self {
        Self::new(
            TestOptions::default(),
            std::env::temp_dir().join(BUNDLE_DIR_NAME),
        )
    }

    pub fn with_bundle_dir(mut self, bundle_dir: PathBuf) -> Self {
        self.bundle_dir = bundle_dir;
        self
    }
}

#[cfg(test)]
#[path = "tests/options_tests.rs"]
mod tests;
