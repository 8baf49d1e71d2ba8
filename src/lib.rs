pub mod bundle;
pub mod bundled;
pub mod karma;
pub mod manifest;
pub mod opener;
pub mod options;
pub mod process;
pub mod resolver;
pub mod runner;
pub mod tasks;
pub mod ui;
pub mod watcher;

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Tasks(TasksArgs),
    Build(BuildArgs),
    Task(TaskInvocation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TasksArgs {
    pub output_json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArgs {
    pub src: PathBuf,
    pub dest: PathBuf,
    pub global_name: Option<String>,
    pub bundle_file_name: Option<String>,
    pub rollup: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInvocation {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliParseError {
    MissingValue(&'static str),
    MissingRequired(&'static str),
    UnknownArgument(String),
}

impl std::fmt::Display for CliParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliParseError::MissingValue(flag) => write!(f, "{flag} requires a value"),
            CliParseError::MissingRequired(flag) => write!(f, "{flag} is required"),
            CliParseError::UnknownArgument(arg) => write!(f, "unknown argument: {arg}"),
        }
    }
}

impl std::error::Error for CliParseError {}

pub fn parse_command<I>(args: I) -> Result<Command, CliParseError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(cmd) = args.next() else {
        return Ok(Command::Help);
    };

    match cmd.as_str() {
        "--help" | "-h" | "help" => Ok(Command::Help),
        "tasks" => parse_tasks(args),
        "build" => parse_build(args),
        _ => {
            let args = args.collect::<Vec<String>>();
            if args.iter().any(|arg| arg == "--help" || arg == "-h") {
                return Ok(Command::Help);
            }
            Ok(Command::Task(TaskInvocation { name: cmd, args }))
        }
    }
}

fn parse_tasks<I>(args: I) -> Result<Command, CliParseError>
where
    I: IntoIterator<Item = String>,
{
    let mut output_json = false;
    for arg in args {
        match arg.as_str() {
            "--json" => output_json = true,
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(CliParseError::UnknownArgument(other.to_owned())),
        }
    }
    Ok(Command::Tasks(TasksArgs { output_json }))
}

fn parse_build<I>(args: I) -> Result<Command, CliParseError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut src: Option<PathBuf> = None;
    let mut dest: Option<PathBuf> = None;
    let mut global_name: Option<String> = None;
    let mut bundle_file_name: Option<String> = None;
    let mut rollup: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--src" => {
                let value = args.next().ok_or(CliParseError::MissingValue("--src"))?;
                src = Some(PathBuf::from(value));
            }
            "--dest" => {
                let value = args.next().ok_or(CliParseError::MissingValue("--dest"))?;
                dest = Some(PathBuf::from(value));
            }
            "--global-name" => {
                global_name = Some(
                    args.next()
                        .ok_or(CliParseError::MissingValue("--global-name"))?,
                );
            }
            "--bundle-file-name" => {
                bundle_file_name = Some(
                    args.next()
                        .ok_or(CliParseError::MissingValue("--bundle-file-name"))?,
                );
            }
            "--rollup" => {
                rollup = Some(args.next().ok_or(CliParseError::MissingValue("--rollup"))?);
            }
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(CliParseError::UnknownArgument(other.to_owned())),
        }
    }

    Ok(Command::Build(BuildArgs {
        src: src.ok_or(CliParseError::MissingRequired("--src"))?,
        dest: dest.ok_or(CliParseError::MissingRequired("--dest"))?,
        global_name,
        bundle_file_name,
        rollup,
    }))
}

pub fn usage_text() -> &'static str {
    "metal-karma\n\nUSAGE:\n  metal-karma <task> [options]\n  metal-karma tasks [--json]\n  metal-karma build --src <PATH> --dest <DIR> [--global-name <NAME>] [--bundle-file-name <FILE>]\n\nTASKS:\n  test                Run the suite once\n  test:browsers       Run the suite once across every configured browser\n  test:coverage       Run the suite once with coverage instrumentation\n  test:coverage:open  Run with coverage and open the lcov report\n  test:watch          Keep karma resident and re-run on changes\n\nOPTIONS (tasks):\n  --browsers <A,B>      Browsers for test:browsers (repeatable)\n  --base-path <PATH>    Karma base path (default: current directory)\n  --config-file <PATH>  Config used when no local karma.conf.js exists\n  --karma <CMD>         Karma entry point (default: karma)\n  --auto-open-coverage  Open the coverage report after test:coverage\n  --plan                Print the resolved settings without starting karma\n  --json                Emit the plan as JSON (requires --plan)\n  --verbose             Print the config resolution trace\n\nOPTIONS (build):\n  --rollup <CMD>        Bundler entry point (default: rollup)\n\nCONFIG:\n  metal-karma.toml      Project defaults ([options], [extra_watch])\n  karma.conf.js         Local config override for every task\n  karma-<suffix>.conf.js  Per-task override (browsers, coverage)\n\nGENERAL:\n  -h, --help            Print help\n"
}

pub fn print_usage() {
    eprintln!("{}", usage_text());
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
