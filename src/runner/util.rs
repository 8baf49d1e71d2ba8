use std::path::PathBuf;

use crate::options::OptionOverrides;

use super::RunnerError;

/// Runner-level switches that never reach the option merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct TaskFlags {
    pub(super) plan: bool,
    pub(super) output_json: bool,
    pub(super) verbose: bool,
}

pub(super) fn parse_task_args(
    task: &str,
    args: &[String],
) -> Result<(TaskFlags, OptionOverrides), RunnerError> {
    let mut flags = TaskFlags::default();
    let mut overrides = OptionOverrides::default();
    let mut i = 0usize;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "--plan" => flags.plan = true,
            "--json" => flags.output_json = true,
            "--verbose" => flags.verbose = true,
            "--auto-open-coverage" => overrides.auto_open_coverage = Some(true),
            "--browsers" | "--base-path" | "--config-file" | "--karma" => {
                let Some(value) = args.get(i + 1) else {
                    return Err(RunnerError::TaskInvocation(format!(
                        "{task} argument {arg} requires a value"
                    )));
                };
                match arg {
                    "--browsers" => overrides
                        .all_browsers
                        .get_or_insert_with(Vec::new)
                        .extend(split_browsers(value)),
                    "--base-path" => overrides.base_path = Some(PathBuf::from(value)),
                    "--config-file" => overrides.config_file = Some(PathBuf::from(value)),
                    _ => overrides.karma = Some(value.clone()),
                }
                i += 1;
            }
            other => {
                return Err(RunnerError::TaskInvocation(format!(
                    "unknown argument for `{task}`: {other}"
                )));
            }
        }
        i += 1;
    }

    if flags.output_json && !flags.plan {
        return Err(RunnerError::TaskInvocation(format!(
            "{task} argument --json requires --plan"
        )));
    }
    if overrides
        .all_browsers
        .as_ref()
        .is_some_and(|browsers| browsers.is_empty())
    {
        return Err(RunnerError::TaskInvocation(format!(
            "{task} argument --browsers requires at least one browser name"
        )));
    }
    Ok((flags, overrides))
}

fn split_browsers(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
}
