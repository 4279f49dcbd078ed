//! The auto-permutations driver: for every target the greedy factor
//! multiset is computed once, then every combination of unique factor
//! orderings across targets gets its own sub-run. Orderings change tree
//! shapes, and with them the reachable minimum.

use super::{ScenarioResult, TargetSpec, record_or_raise, run_scenario};
use crate::report::{unique_output_dir, write_batch_artifacts};
use mixplan_core::arith::{factorize, unique_permutations};
use mixplan_core::{RunConfig, Target};
use mixplan_error::MixResult;
use std::path::Path;
use tracing::info;

pub fn run(
    config: &RunConfig,
    specs: Vec<TargetSpec>,
    out_root: &Path,
) -> MixResult<Vec<ScenarioResult>> {
    // One ordering set per target, from the greedy base multiset.
    let mut orderings: Vec<Vec<Vec<u64>>> = Vec::with_capacity(specs.len());
    for spec in &specs {
        let sum = spec.ratios.iter().sum();
        let base = factorize(sum, config.max_mixer_size)
            .map_err(|e| e.with_context(format!("factoring target '{}'", spec.name)))?;
        orderings.push(unique_permutations(&base));
    }

    let total: usize = orderings.iter().map(Vec::len).product();
    info!(combinations = total, "testing factor permutations");

    let base_dir = unique_output_dir(out_root, &format!("{}_permutations", config.run_name));
    let mut results = Vec::with_capacity(total);

    // Odometer over the per-target ordering lists.
    let mut pick = vec![0usize; orderings.len()];
    for index in 0..total {
        let mut targets = Vec::with_capacity(specs.len());
        let mut name_parts = Vec::with_capacity(specs.len());
        for (j, spec) in specs.iter().enumerate() {
            let factors = orderings[j][pick[j]].clone();
            name_parts.push(
                factors
                    .iter()
                    .map(|f| f.to_string())
                    .collect::<Vec<_>>()
                    .join("_"),
            );
            targets.push(Target::new(
                spec.name.clone(),
                spec.ratios.clone(),
                factors,
            )?);
        }

        let run_name = format!("run_{}_{}", index + 1, name_parts.join("-"));
        info!("{} ({}/{})", run_name, index + 1, total);

        let out_dir = base_dir.join(&run_name);
        match run_scenario(targets.clone(), config, &out_dir, &run_name) {
            Ok(result) => results.push(result),
            Err(error) => record_or_raise(&mut results, &run_name, targets, error)?,
        }

        // Advance the odometer.
        for j in (0..pick.len()).rev() {
            pick[j] += 1;
            if pick[j] < orderings[j].len() {
                break;
            }
            pick[j] = 0;
        }
    }

    write_batch_artifacts(&base_dir, &results, config.objective)?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use mixplan_core::arith::unique_permutations;

    #[test]
    fn odometer_covers_every_combination() {
        let orderings = [
            unique_permutations(&[3, 3, 2]),
            unique_permutations(&[5, 5]),
        ];
        let total: usize = orderings.iter().map(Vec::len).product();
        // [3,3,2] has 3 distinct orderings, [5,5] has 1.
        assert_eq!(total, 3);
    }
}
