use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::options::ExtraWatch;
use crate::process::{shell_command, watch_child, OutputMode, RunOutcome};

const DEFAULT_POLL_MS: u64 = 200;
const DEFAULT_DEBOUNCE_MS: u64 = 400;
const ALWAYS_EXCLUDED: [&str; 3] = [".git/**", "node_modules/**", "coverage/**"];

#[derive(Debug)]
pub enum WatchError {
    EmptyPatterns,
    InvalidGlob { pattern: String, error: String },
    Scan { root: PathBuf, error: String },
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::EmptyPatterns => write!(f, "extra watch requires at least one `src` glob"),
            WatchError::InvalidGlob { pattern, error } => {
                write!(f, "invalid extra watch glob `{pattern}`: {error}")
            }
            WatchError::Scan { root, error } => {
                write!(f, "watch scan failed under {}: {error}", root.display())
            }
        }
    }
}

impl std::error::Error for WatchError {}

/// Keeps a registered watch alive; dropping it stops polling.
#[derive(Debug)]
pub struct WatchHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// A handle with no background work attached.
    pub fn inert() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(true)),
            thread: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.stop.load(Ordering::SeqCst)
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// File-watch primitive used for auxiliary watched paths.
pub trait FileWatcher {
    fn watch(&self, spec: &ExtraWatch, root: &Path) -> Result<WatchHandle, WatchError>;
}

/// Snapshot-diffing watcher; runs the watch's shell command after each settled change.
#[derive(Debug, Clone, Copy)]
pub struct PollingWatcher {
    pub poll: Duration,
    pub debounce: Duration,
}

impl Default for PollingWatcher {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(DEFAULT_POLL_MS),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

impl FileWatcher for PollingWatcher {
    fn watch(&self, spec: &ExtraWatch, root: &Path) -> Result<WatchHandle, WatchError> {
        let run = spec.run.clone();
        let cwd = root.to_path_buf();
        self.watch_with(&spec.src, root, move |_changed| {
            if let Err(message) = run_watch_command(&run, &cwd) {
                eprintln!("{message}");
            }
        })
    }
}

/// Runs one extra-watch command to completion; `Err` carries a printable failure.
fn run_watch_command(run: &str, cwd: &Path) -> Result<(), String> {
    let child = shell_command(run, cwd, OutputMode::Inherit)
        .spawn()
        .map_err(|error| format!("extra watch command `{run}` failed to start: {error}"))?;
    match watch_child(child).wait() {
        Ok(RunOutcome::Passed) => Ok(()),
        Ok(RunOutcome::Failed { diagnostic, .. }) => Err(format!(
            "extra watch command `{run}` failed ({diagnostic})"
        )),
        Err(error) => Err(format!("extra watch command `{run}`: {error}")),
    }
}

impl PollingWatcher {
    /// Polls `root` and calls `on_change` with the relative paths that changed.
    pub fn watch_with<F>(
        &self,
        patterns: &[String],
        root: &Path,
        mut on_change: F,
    ) -> Result<WatchHandle, WatchError>
    where
        F: FnMut(&[String]) + Send + 'static,
    {
        let matcher = WatchMatcher::new(patterns)?;
        let root = root.to_path_buf();
        let mut snapshot = collect_snapshot(&root, &matcher)?;
        let stop = Arc::new(AtomicBool::new(false));
        let poll = self.poll;
        let debounce = self.debounce;

        let thread = {
            let stop = stop.clone();
            thread::spawn(move || {
                while let Some(changed) =
                    wait_for_changes(&root, &matcher, &mut snapshot, poll, debounce, &stop)
                {
                    on_change(&changed);
                }
            })
        };

        Ok(WatchHandle {
            stop,
            thread: Some(thread),
        })
    }
}

#[derive(Debug)]
struct WatchMatcher {
    include: GlobSet,
    exclude: GlobSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    size: u64,
}

impl WatchMatcher {
    fn new(patterns: &[String]) -> Result<Self, WatchError> {
        if patterns.is_empty() {
            return Err(WatchError::EmptyPatterns);
        }
        let excludes = ALWAYS_EXCLUDED
            .iter()
            .map(|pattern| (*pattern).to_owned())
            .collect::<Vec<String>>();
        Ok(Self {
            include: build_glob_set(patterns)?,
            exclude: build_glob_set(&excludes)?,
        })
    }

    fn matches(&self, rel_path: &str) -> bool {
        let rel = rel_path.trim_start_matches("./");
        !self.exclude.is_match(rel) && self.include.is_match(rel)
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, WatchError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern.trim_start_matches("./")).map_err(|error| {
            WatchError::InvalidGlob {
                pattern: pattern.clone(),
                error: error.to_string(),
            }
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|error| WatchError::InvalidGlob {
        pattern: patterns.join(", "),
        error: error.to_string(),
    })
}

/// Blocks until a batch of changes settles, or returns `None` once stopped.
fn wait_for_changes(
    root: &Path,
    matcher: &WatchMatcher,
    snapshot: &mut HashMap<PathBuf, FileStamp>,
    poll: Duration,
    debounce: Duration,
    stop: &AtomicBool,
) -> Option<Vec<String>> {
    let mut changed = BTreeSet::<String>::new();
    let mut quiet_deadline: Option<Instant> = None;
    loop {
        thread::sleep(poll);
        if stop.load(Ordering::SeqCst) {
            return None;
        }
        let Ok(next) = collect_snapshot(root, matcher) else {
            continue;
        };
        let delta = snapshot_diff(snapshot, &next);
        *snapshot = next;
        if !delta.is_empty() {
            changed.extend(delta);
            quiet_deadline = Some(Instant::now() + debounce);
            continue;
        }
        if let Some(deadline) = quiet_deadline {
            if Instant::now() >= deadline {
                return Some(changed.into_iter().collect());
            }
        }
    }
}

fn collect_snapshot(
    root: &Path,
    matcher: &WatchMatcher,
) -> Result<HashMap<PathBuf, FileStamp>, WatchError> {
    let mut snapshot = HashMap::<PathBuf, FileStamp>::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|error| WatchError::Scan {
            root: root.to_path_buf(),
            error: error.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel = path.strip_prefix(root).unwrap_or(path);
        if !matcher.matches(&normalize_for_match(rel)) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        snapshot.insert(
            rel.to_path_buf(),
            FileStamp {
                modified: metadata.modified().ok(),
                size: metadata.len(),
            },
        );
    }
    Ok(snapshot)
}

fn snapshot_diff(
    old: &HashMap<PathBuf, FileStamp>,
    new: &HashMap<PathBuf, FileStamp>,
) -> Vec<String> {
    let mut changed = BTreeSet::<String>::new();
    for (path, stamp) in new {
        if old.get(path) != Some(stamp) {
            changed.insert(normalize_for_match(path));
        }
    }
    for path in old.keys() {
        if !new.contains_key(path) {
            changed.insert(normalize_for_match(path));
        }
    }
    changed.into_iter().collect()
}

fn normalize_for_match(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
#[path = "tests/watcher_tests.rs"]
mod tests;
