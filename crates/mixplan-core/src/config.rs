//! Run configuration: how factors are determined, what is minimized, which
//! sharing edges are admissible, and how the backend is tuned. A plain
//! record passed in at construction; the core keeps no global state.

use mixplan_error::{MixResult, ensure};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What the optimizer minimizes.
///
/// The two modes differ only in which linear sum becomes the objective;
/// everything else in the encoding is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Objective {
    /// Total volume of intermediate fluid discarded.
    #[default]
    Waste,
    /// Total count of mixing operations.
    Operations,
}

impl std::fmt::Display for Objective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Objective::Waste => write!(f, "waste"),
            Objective::Operations => write!(f, "operations"),
        }
    }
}

/// Which cross-target transfer directions are admissible when role-based
/// pruning is active.
///
/// None of the three is proved to preserve the global optimum; they trade
/// candidate-graph size against solution quality. `Ring` closes the cycle
/// (last target can feed the first), `Linear` does not, `All` admits every
/// direction but only from exporter-role sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum InterSharingMode {
    Ring,
    Linear,
    #[default]
    All,
}

/// How the scenario set for a run is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunMode {
    /// Factors are taken from the target definitions as-is.
    #[default]
    Manual,
    /// Factors are computed from each ratio sum by greedy factorization.
    Auto,
    /// One sub-run per combination of unique factor orderings.
    AutoPermutations,
    /// Randomly generated scenarios.
    Random,
    /// Scenario batches loaded from a JSON file.
    FileLoad,
}

/// Backend tuning knobs. None of these affects which plans are feasible,
/// only how the search for the optimum proceeds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverConfig {
    /// Parallel search workers. 1 keeps the search deterministic.
    pub workers: usize,
    /// Wall-clock budget in seconds; unset means run to proof.
    pub time_limit_s: Option<f64>,
    /// Stop early once the incumbent is within this absolute gap of the
    /// proven bound.
    pub abs_gap: Option<i64>,
    /// Seed for portfolio value-ordering. Pin it (with `workers = 1`) for
    /// reproducible runs.
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            workers: 1,
            time_limit_s: None,
            abs_gap: None,
            seed: 0,
        }
    }
}

/// Settings for [RunMode::Random] scenario generation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RandomConfig {
    /// Number of scenarios to generate and solve.
    pub runs: usize,
    /// Targets per scenario.
    pub targets: usize,
    /// Reagents per target.
    pub reagents: usize,
    /// Candidate ratio sums; each target draws one at random. Every entry
    /// must be factorizable under the mixer bound or its scenario is skipped.
    pub ratio_sums: Vec<u64>,
}

impl Default for RandomConfig {
    fn default() -> Self {
        RandomConfig {
            runs: 10,
            targets: 3,
            reagents: 3,
            ratio_sums: vec![18],
        }
    }
}

/// The full configuration record for one invocation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RunConfig {
    pub run_name: String,
    pub mode: RunMode,
    pub objective: Objective,
    /// Cap on any single transfer variable; unset means bounded only by the
    /// sink's mixer capacity. Zero disables sharing entirely.
    pub max_sharing_volume: Option<u64>,
    /// Cap on `level(source) - level(sink)` for sharing edges.
    pub max_level_diff: Option<usize>,
    /// Mixer capacity bound: the largest factor the factorization may use
    /// and every node's input-count bound.
    pub max_mixer_size: u64,
    /// Heuristic candidate-edge pruning by source role. Off by default: the
    /// role filter can exclude the optimum on some instances.
    pub role_based_pruning: bool,
    pub inter_sharing_mode: InterSharingMode,
    pub solver: SolverConfig,
    pub random: RandomConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            run_name: "mixplan_run".to_string(),
            mode: RunMode::Manual,
            objective: Objective::Waste,
            max_sharing_volume: None,
            max_level_diff: None,
            max_mixer_size: 5,
            role_based_pruning: false,
            inter_sharing_mode: InterSharingMode::All,
            solver: SolverConfig::default(),
            random: RandomConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> MixResult<()> {
        ensure!(
            self.max_mixer_size >= 2,
            InvalidConfig: "max_mixer_size must be at least 2, got {}",
            self.max_mixer_size
        );
        ensure!(
            !self.run_name.is_empty(),
            InvalidConfig: "run_name must not be empty"
        );
        if let Some(limit) = self.solver.time_limit_s {
            ensure!(
                limit > 0.0,
                InvalidConfig: "solver.time_limit_s must be positive, got {}",
                limit
            );
        }
        if self.mode == RunMode::Random {
            ensure!(
                self.random.runs > 0 && self.random.targets > 0 && self.random.reagents > 0,
                InvalidConfig: "random mode requires positive runs, targets and reagents"
            );
            ensure!(
                !self.random.ratio_sums.is_empty(),
                InvalidConfig: "random mode requires at least one candidate ratio sum"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn mixer_bound_below_two_is_rejected() {
        let config = RunConfig {
            max_mixer_size: 1,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn random_mode_needs_ratio_sums() {
        let config = RunConfig {
            mode: RunMode::Random,
            random: RandomConfig {
                ratio_sums: Vec::new(),
                ..RandomConfig::default()
            },
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
