use std::path::Path;

use crate::bundle::{start_bundle, BundleOptions, DEFAULT_BUNDLER_ENTRY};
use crate::ui::{KeyValue, OutputMode, PlainRenderer, Renderer};
use crate::BuildArgs;

use super::render::{buffered_renderer, into_output};
use super::RunnerError;

pub(super) fn bundle_options(args: &BuildArgs) -> BundleOptions {
    let mut options = BundleOptions::new(&args.src, &args.dest);
    if let Some(name) = &args.global_name {
        options = options.with_global_name(name);
    }
    if let Some(name) = &args.bundle_file_name {
        options = options.with_bundle_file_name(name);
    }
    options
}

pub(super) fn run_build(args: &BuildArgs, cwd: &Path) -> Result<String, RunnerError> {
    let options = bundle_options(args);
    let entry = args.rollup.as_deref().unwrap_or(DEFAULT_BUNDLER_ENTRY);

    let mut progress = PlainRenderer::stderr(OutputMode::from_env());
    let spinner = progress.spinner(&format!("Bundling {}", args.src.display()))?;
    let completion = match start_bundle(entry, &options, cwd) {
        Ok(completion) => completion,
        Err(error) => {
            spinner.finish_error("Bundler did not start");
            return Err(error.into());
        }
    };
    spinner.set_message(completion.command());
    let artifacts = match completion.wait() {
        Ok(artifacts) => artifacts,
        Err(error) => {
            spinner.finish_error("Bundle failed");
            return Err(error.into());
        }
    };
    spinner.finish_success("Bundle written");

    let mut renderer = buffered_renderer();
    renderer.section("Bundle")?;
    renderer.key_values(&[
        KeyValue::new("bundle", artifacts.bundle.display().to_string()),
        KeyValue::new("sourceMap", artifacts.source_map.display().to_string()),
    ])?;
    Ok(into_output(renderer))
}
