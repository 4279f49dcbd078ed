//! Scenario orchestration: the shared single-run pipeline (build → encode →
//! solve → analyze → report) and the batch drivers for each run mode.
//! Validation failures abort a run; solver failures are recorded and the
//! batch moves on.

pub mod file_load;
pub mod permutation;
pub mod random;
pub mod standard;

use crate::engine::{SolveEngine, SolveOutcome};
use crate::events::EventLogger;
use crate::report::write_run_artifacts;
use mixplan_core::{RunConfig, RunMode, Target};
use mixplan_error::{MixError, MixResult, mix_bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// A target record as it appears in scenario files. Factors are optional:
/// manual mode requires them, auto modes derive them from the ratio sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    pub name: String,
    pub ratios: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factors: Option<Vec<u64>>,
}

impl TargetSpec {
    /// Resolves the spec into a validated [Target] for the given mode.
    pub fn resolve(self, mode: RunMode, max_mixer_size: u64) -> MixResult<Target> {
        match mode {
            RunMode::Manual => match self.factors {
                Some(factors) => Target::new(self.name, self.ratios, factors),
                None => mix_bail!(
                    InvalidConfig:
                    "manual mode requires factors for target '{}'",
                    self.name
                ),
            },
            RunMode::FileLoad => match self.factors {
                Some(factors) => Target::new(self.name, self.ratios, factors),
                None => Target::with_auto_factors(self.name, self.ratios, max_mixer_size),
            },
            _ => Target::with_auto_factors(self.name, self.ratios, max_mixer_size),
        }
    }
}

/// Loads a flat list of target specs from a JSON file.
pub fn load_target_specs(path: &Path) -> MixResult<Vec<TargetSpec>> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| mixplan_error::mix_err!(Serde: "{}: {}", path.display(), e))
}

/// The recorded outcome of one scenario, solved or not.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub run_name: String,
    pub targets: Vec<Target>,
    pub status: Option<String>,
    pub objective_value: Option<i64>,
    pub total_operations: u64,
    pub total_waste: i64,
    pub total_reagent_units: i64,
    pub elapsed_s: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScenarioResult {
    pub fn solved(run_name: &str, targets: Vec<Target>, outcome: &SolveOutcome) -> Self {
        ScenarioResult {
            run_name: run_name.to_string(),
            targets,
            status: Some(outcome.status.to_string()),
            objective_value: Some(outcome.objective_value),
            total_operations: outcome.report.total_operations,
            total_waste: outcome.report.total_waste,
            total_reagent_units: outcome.report.total_reagent_units,
            elapsed_s: outcome.elapsed.as_secs_f64(),
            error: None,
        }
    }

    pub fn failed(run_name: &str, targets: Vec<Target>, error: &MixError) -> Self {
        ScenarioResult {
            run_name: run_name.to_string(),
            targets,
            status: None,
            objective_value: None,
            total_operations: 0,
            total_waste: 0,
            total_reagent_units: 0,
            elapsed_s: 0.0,
            error: Some(error.to_string()),
        }
    }
}

/// Runs a single scenario end to end and writes its artifacts under
/// `out_dir`. Solver failures (infeasible, out of budget) surface as
/// recoverable errors for the batch drivers to record.
pub fn run_scenario(
    targets: Vec<Target>,
    config: &RunConfig,
    out_dir: &Path,
    run_name: &str,
) -> MixResult<ScenarioResult> {
    info!(run_name, objective = %config.objective, "starting scenario");
    for target in &targets {
        info!(
            "  - {}: ratios = {:?}, factors = {:?}",
            target.name, target.ratios, target.factors
        );
    }

    let mut engine = SolveEngine::builder()
        .config(config.clone())
        .targets(targets)
        .subscribe(EventLogger)
        .build()?;

    let outcome = engine.solve()?;
    write_run_artifacts(
        out_dir,
        engine.problem(),
        config,
        &outcome.report,
        run_name,
        outcome.elapsed,
    )?;

    Ok(ScenarioResult::solved(
        run_name,
        engine.problem().targets().to_vec(),
        &outcome,
    ))
}

/// Mode dispatch. `targets_path` feeds the manual/auto/permutation modes (a
/// flat spec list) and the file-load mode (a batch file); random mode
/// generates its own scenarios.
pub fn dispatch(
    config: &RunConfig,
    targets_path: Option<&Path>,
    out_root: &Path,
) -> MixResult<Vec<ScenarioResult>> {
    config.validate()?;

    let require_path = || {
        targets_path.ok_or_else(|| {
            mixplan_error::mix_err!(
                InvalidConfig:
                "mode '{:?}' requires a targets file",
                config.mode
            )
        })
    };

    match config.mode {
        RunMode::Manual | RunMode::Auto => {
            let specs = load_target_specs(require_path()?)?;
            Ok(vec![standard::run(config, specs, out_root)?])
        }
        RunMode::AutoPermutations => {
            let specs = load_target_specs(require_path()?)?;
            permutation::run(config, specs, out_root)
        }
        RunMode::Random => random::run(config, out_root),
        RunMode::FileLoad => file_load::run(config, require_path()?, out_root),
    }
}

/// Records a scenario failure if it is recoverable at batch scope,
/// propagates it otherwise.
pub(crate) fn record_or_raise(
    results: &mut Vec<ScenarioResult>,
    run_name: &str,
    targets: Vec<Target>,
    error: MixError,
) -> MixResult<()> {
    if error.is_recoverable() {
        info!(run_name, %error, "scenario recorded as unsolved");
        results.push(ScenarioResult::failed(run_name, targets, &error));
        Ok(())
    } else {
        Err(error)
    }
}
