//! The standard single-scenario driver: manual factors as given, or auto
//! factors from the greedy factorization.

use super::{ScenarioResult, TargetSpec, run_scenario};
use crate::report::unique_output_dir;
use mixplan_core::{RunConfig, Target};
use mixplan_error::MixResult;
use std::path::Path;
use tracing::info;

pub fn run(
    config: &RunConfig,
    specs: Vec<TargetSpec>,
    out_root: &Path,
) -> MixResult<ScenarioResult> {
    let targets: Vec<Target> = specs
        .into_iter()
        .map(|spec| spec.resolve(config.mode, config.max_mixer_size))
        .collect::<MixResult<_>>()?;

    info!(mode = ?config.mode, targets = targets.len(), "standard run");
    let out_dir = unique_output_dir(out_root, &config.run_name);
    run_scenario(targets, config, &out_dir, &config.run_name)
}
