use std::io::IsTerminal;

use crate::tasks::{TaskDescriptor, TaskPlan, TASKS};
use crate::ui::theme::resolve_color_enabled;
use crate::ui::{KeyValue, OutputMode, PlainRenderer, Renderer, TableSpec};

use super::{RunnerError, PLAN_SCHEMA, SCHEMA_VERSION, TASKS_SCHEMA};

pub(super) fn buffered_renderer() -> PlainRenderer<Vec<u8>> {
    let color_enabled =
        resolve_color_enabled(OutputMode::from_env(), std::io::stdout().is_terminal());
    PlainRenderer::new(Vec::<u8>::new(), color_enabled)
}

pub(super) fn into_output(renderer: PlainRenderer<Vec<u8>>) -> String {
    String::from_utf8_lossy(&renderer.into_inner()).into_owned()
}

pub(super) fn render_task_list(output_json: bool) -> Result<String, RunnerError> {
    if output_json {
        let tasks = TASKS
            .iter()
            .map(|task| {
                serde_json::json!({
                    "name": task.name,
                    "summary": task.summary,
                    "config_suffix": task.kind.suffix().map(|suffix| suffix.as_str()),
                    "single_run": task.kind.single_run(),
                    "coverage": task.kind.is_coverage(),
                })
            })
            .collect::<Vec<serde_json::Value>>();
        let payload = serde_json::json!({
            "schema": TASKS_SCHEMA,
            "schema_version": SCHEMA_VERSION,
            "tasks": tasks,
        });
        return Ok(serde_json::to_string_pretty(&payload)?);
    }

    let mut renderer = buffered_renderer();
    renderer.section("Tasks")?;
    let rows = TASKS
        .iter()
        .map(|task| {
            vec![
                task.name.to_owned(),
                task.kind
                    .suffix()
                    .map(|suffix| format!("karma-{}.conf.js", suffix.as_str()))
                    .unwrap_or_else(|| "karma.conf.js".to_owned()),
                task.summary.to_owned(),
            ]
        })
        .collect::<Vec<Vec<String>>>();
    renderer.table(&TableSpec::new(
        vec!["task".to_owned(), "config".to_owned(), "summary".to_owned()],
        rows,
    ))?;
    Ok(into_output(renderer))
}

pub(super) fn plan_rows(task: &TaskDescriptor, plan: &TaskPlan) -> Vec<KeyValue> {
    let mut rows = vec![
        KeyValue::new("task", task.name),
        KeyValue::new("configFile", plan.config.path.display().to_string()),
        KeyValue::new("source", plan.config.source.label()),
        KeyValue::new("basePath", plan.settings.base_path.display().to_string()),
        KeyValue::new(
            "singleRun",
            match plan.settings.single_run {
                Some(single_run) => single_run.to_string(),
                None => "<karma default>".to_owned(),
            },
        ),
    ];
    if let Some(browsers) = &plan.settings.browsers {
        rows.push(KeyValue::new("browsers", browsers.join(", ")));
    }
    if let Some(path) = &plan.open_report {
        rows.push(KeyValue::new("openReport", path.display().to_string()));
    }
    if let Some(watch) = &plan.extra_watch {
        rows.push(KeyValue::new(
            "extraWatch",
            format!("{} -> {}", watch.src.join(", "), watch.run),
        ));
    }
    rows
}

pub(super) fn render_plan(
    task: &TaskDescriptor,
    plan: &TaskPlan,
    output_json: bool,
    verbose: bool,
) -> Result<String, RunnerError> {
    let command = plan.settings.command_line(&plan.options.karma);
    if output_json {
        let payload = serde_json::json!({
            "schema": PLAN_SCHEMA,
            "schema_version": SCHEMA_VERSION,
            "ok": true,
            "task": task.name,
            "command": command,
            "settings": &plan.settings,
            "config": {
                "path": &plan.config.path,
                "source": plan.config.source.label(),
                "evidence": &plan.config.evidence,
            },
            "open_report": &plan.open_report,
            "extra_watch": &plan.extra_watch,
        });
        return Ok(serde_json::to_string_pretty(&payload)?);
    }

    let mut renderer = buffered_renderer();
    renderer.section("Task Plan")?;
    let mut rows = plan_rows(task, plan);
    rows.push(KeyValue::new("command", command));
    renderer.key_values(&rows)?;
    if verbose {
        renderer.text("")?;
        renderer.bullet_list("resolution", &plan.config.evidence)?;
    }
    Ok(into_output(renderer))
}
