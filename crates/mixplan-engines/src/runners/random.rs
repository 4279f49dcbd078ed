//! The random-scenario driver: each run draws a ratio sum per target,
//! splits it into non-zero random ratios, derives factors greedily, and
//! solves. Seed the provider (`random_provider::set_seed`) for a
//! reproducible batch.

use super::{ScenarioResult, record_or_raise, run_scenario};
use crate::report::{unique_output_dir, write_batch_artifacts};
use mixplan_core::random_provider;
use mixplan_core::{RunConfig, Target};
use mixplan_error::{MixResult, ensure};
use std::path::Path;
use tracing::info;

/// Splits `sum` into `count` random positive integers. Sampling distinct
/// dividers of the interval keeps every part non-zero.
pub fn random_ratios(count: usize, sum: u64) -> MixResult<Vec<u64>> {
    ensure!(
        sum >= count as u64,
        InvalidConfig:
        "ratio sum {} cannot be split into {} non-zero parts",
        sum,
        count
    );

    let dividers = random_provider::sample_sorted(1..sum, count - 1);
    let mut ratios = Vec::with_capacity(count);
    let mut previous = 0;
    for divider in dividers {
        ratios.push(divider - previous);
        previous = divider;
    }
    ratios.push(sum - previous);
    Ok(ratios)
}

pub fn run(config: &RunConfig, out_root: &Path) -> MixResult<Vec<ScenarioResult>> {
    let settings = &config.random;
    info!(
        runs = settings.runs,
        targets = settings.targets,
        reagents = settings.reagents,
        "random simulation batch"
    );

    let base_dir = unique_output_dir(
        out_root,
        &format!(
            "{}_random_{}targets_{}runs",
            config.run_name, settings.targets, settings.runs
        ),
    );
    let mut results = Vec::with_capacity(settings.runs);

    for run_index in 0..settings.runs {
        let run_name = format!("run_{}", run_index + 1);

        let scenario: MixResult<Vec<Target>> = (0..settings.targets)
            .map(|target_index| {
                let sum = *random_provider::choose(&settings.ratio_sums);
                let ratios = random_ratios(settings.reagents, sum)?;
                Target::with_auto_factors(
                    format!("random_{}_{}", run_index + 1, target_index + 1),
                    ratios,
                    config.max_mixer_size,
                )
            })
            .collect();

        let targets = match scenario {
            Ok(targets) => targets,
            Err(error) => {
                // An unluckily-drawn sum may not factor under the mixer
                // bound; the batch records it and keeps drawing.
                info!(run_name, %error, "skipping unbuildable scenario");
                results.push(ScenarioResult::failed(&run_name, Vec::new(), &error));
                continue;
            }
        };

        let out_dir = base_dir.join(&run_name);
        match run_scenario(targets.clone(), config, &out_dir, &run_name) {
            Ok(result) => results.push(result),
            Err(error) => record_or_raise(&mut results, &run_name, targets, error)?,
        }
    }

    write_batch_artifacts(&base_dir, &results, config.objective)?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ratios_are_positive_and_sum_up() {
        random_provider::scoped_seed(23, || {
            for _ in 0..32 {
                let ratios = random_ratios(3, 18).unwrap();
                assert_eq!(ratios.len(), 3);
                assert_eq!(ratios.iter().sum::<u64>(), 18);
                assert!(ratios.iter().all(|&r| r > 0));
            }
        });
    }

    #[test]
    fn ratio_split_needs_enough_room() {
        assert!(random_ratios(5, 4).is_err());
        assert_eq!(random_ratios(1, 4).unwrap(), vec![4]);
    }
}
