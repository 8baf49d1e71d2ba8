pub mod dispatch;

use crate::resolver::ConfigSuffix;

pub use dispatch::{
    Collaborators, Dispatch, DispatchError, Dispatcher, ReportOpen, TaskPlan, COVERAGE_REPORT_PATH,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Run,
    RunBrowsers,
    RunWithCoverage,
    RunWithCoverageAndOpen,
    Watch,
}

impl TaskKind {
    pub fn suffix(self) -> Option<ConfigSuffix> {
        match self {
            TaskKind::Run | TaskKind::Watch => None,
            TaskKind::RunBrowsers => Some(ConfigSuffix::Browsers),
            TaskKind::RunWithCoverage | TaskKind::RunWithCoverageAndOpen => {
                Some(ConfigSuffix::Coverage)
            }
        }
    }

    pub fn single_run(self) -> Option<bool> {
        match self {
            TaskKind::Watch => None,
            _ => Some(true),
        }
    }

    pub fn is_coverage(self) -> bool {
        matches!(
            self,
            TaskKind::RunWithCoverage | TaskKind::RunWithCoverageAndOpen
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub name: &'static str,
    pub kind: TaskKind,
    pub summary: &'static str,
}

pub const TASKS: [TaskDescriptor; 5] = [
    TaskDescriptor {
        name: "test",
        kind: TaskKind::Run,
        summary: "Run the suite once",
    },
    TaskDescriptor {
        name: "test:browsers",
        kind: TaskKind::RunBrowsers,
        summary: "Run the suite once across every configured browser",
    },
    TaskDescriptor {
        name: "test:coverage",
        kind: TaskKind::RunWithCoverage,
        summary: "Run the suite once with coverage instrumentation",
    },
    TaskDescriptor {
        name: "test:coverage:open",
        kind: TaskKind::RunWithCoverageAndOpen,
        summary: "Run with coverage and open the lcov report",
    },
    TaskDescriptor {
        name: "test:watch",
        kind: TaskKind::Watch,
        summary: "Keep karma resident and re-run on changes",
    },
];

pub fn find_task(name: &str) -> Option<&'static TaskDescriptor> {
    TASKS.iter().find(|task| task.name == name)
}

pub fn task_names() -> Vec<&'static str> {
    TASKS.iter().map(|task| task.name).collect()
}
