//! The file-load driver: a JSON batch of named scenarios, each solved in
//! sequence with per-scenario recovery, then a comparison summary.
//!
//! Two file shapes are accepted: a list of batches
//! (`[{"run_name": "...", "targets": [...]}, ...]`) or a bare target list,
//! which becomes a single batch named after the run.

use super::{ScenarioResult, TargetSpec, record_or_raise, run_scenario};
use crate::report::{unique_output_dir, write_batch_artifacts};
use mixplan_core::{RunConfig, Target};
use mixplan_error::{MixResult, ensure};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct ScenarioBatch {
    #[serde(default)]
    run_name: Option<String>,
    targets: Vec<TargetSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScenarioFile {
    Batches(Vec<ScenarioBatch>),
    Flat(Vec<TargetSpec>),
}

pub fn run(
    config: &RunConfig,
    path: &Path,
    out_root: &Path,
) -> MixResult<Vec<ScenarioResult>> {
    info!(path = %path.display(), "loading scenario batches");
    let text = std::fs::read_to_string(path)?;
    let parsed: ScenarioFile = serde_json::from_str(&text)
        .map_err(|e| mixplan_error::mix_err!(Serde: "{}: {}", path.display(), e))?;

    let batches = match parsed {
        ScenarioFile::Batches(batches) => batches,
        ScenarioFile::Flat(targets) => vec![ScenarioBatch {
            run_name: Some(config.run_name.clone()),
            targets,
        }],
    };
    ensure!(
        !batches.is_empty(),
        InvalidConfig: "scenario file {} is empty",
        path.display()
    );

    let base_dir = unique_output_dir(out_root, &format!("{}_comparison", config.run_name));
    let mut results = Vec::with_capacity(batches.len());

    for (index, batch) in batches.into_iter().enumerate() {
        let run_name = batch
            .run_name
            .unwrap_or_else(|| format!("Run_{}", index + 1));
        info!("{} ({} targets)", run_name, batch.targets.len());

        let targets: Vec<Target> = batch
            .targets
            .into_iter()
            .map(|spec| spec.resolve(config.mode, config.max_mixer_size))
            .collect::<MixResult<_>>()?;

        let out_dir = base_dir.join(&run_name);
        match run_scenario(targets.clone(), config, &out_dir, &run_name) {
            Ok(result) => results.push(result),
            Err(error) => record_or_raise(&mut results, &run_name, targets, error)?,
        }
    }

    write_batch_artifacts(&base_dir, &results, config.objective)?;
    Ok(results)
}
