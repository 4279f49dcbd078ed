//! Target mixtures: a named integer ratio vector plus the ordered factor
//! list that fixes the depth and per-level capacity of its mixing tree.

use crate::arith::factorize;
use mixplan_error::{MixResult, ensure};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A desired mixture, given by integer reagent ratios summing to the product
/// of its factor list. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Target {
    pub name: String,
    pub ratios: Vec<u64>,
    pub factors: Vec<u64>,
}

impl Target {
    /// Creates a validated target from explicit factors (`manual` mode).
    pub fn new(
        name: impl Into<String>,
        ratios: Vec<u64>,
        factors: Vec<u64>,
    ) -> MixResult<Self> {
        let target = Target {
            name: name.into(),
            ratios,
            factors,
        };
        target.validate()?;
        Ok(target)
    }

    /// Creates a target whose factors are derived from the ratio sum by the
    /// greedy factorization bounded by the mixer capacity (`auto` mode).
    pub fn with_auto_factors(
        name: impl Into<String>,
        ratios: Vec<u64>,
        max_mixer_size: u64,
    ) -> MixResult<Self> {
        let sum = ratios.iter().sum();
        let factors = factorize(sum, max_mixer_size)?;
        Target::new(name, ratios, factors)
    }

    /// Same ratios, different factor ordering. Used by the permutation
    /// runner; the reordered target must still validate.
    pub fn with_factor_order(&self, factors: Vec<u64>) -> MixResult<Self> {
        Target::new(self.name.clone(), self.ratios.clone(), factors)
    }

    pub fn ratio_sum(&self) -> u64 {
        self.ratios.iter().sum()
    }

    pub fn reagent_count(&self) -> usize {
        self.ratios.len()
    }

    /// Mixing depth: one tree level per factor.
    pub fn depth(&self) -> usize {
        self.factors.len()
    }

    pub fn validate(&self) -> MixResult<()> {
        ensure!(
            !self.ratios.is_empty(),
            InvalidConfig: "target '{}' has no ratios",
            self.name
        );
        ensure!(
            !self.factors.is_empty(),
            InvalidConfig: "target '{}' has no factors",
            self.name
        );
        ensure!(
            self.factors.iter().all(|&f| f >= 2),
            InvalidConfig: "target '{}' has a factor below 2: {:?}",
            self.name,
            self.factors
        );

        let sum = self.ratio_sum();
        let product: u64 = self.factors.iter().product();
        ensure!(
            sum == product,
            InvalidConfig:
            "target '{}': ratio sum {} does not equal factor product {} ({:?})",
            self.name,
            sum,
            product,
            self.factors
        );
        Ok(())
    }
}

/// Validates a whole scenario: every target individually, plus the shared
/// reagent count across targets that one run requires.
pub fn validate_targets(targets: &[Target]) -> MixResult<()> {
    ensure!(!targets.is_empty(), InvalidConfig: "no targets configured");

    let reagents = targets[0].reagent_count();
    for target in targets {
        target.validate()?;
        ensure!(
            target.reagent_count() == reagents,
            InvalidConfig:
            "target '{}' has {} reagents, expected {}",
            target.name,
            target.reagent_count(),
            reagents
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_target_validates_sum_against_product() {
        assert!(Target::new("t", vec![2, 11, 5], vec![3, 3, 2]).is_ok());
        assert!(Target::new("t", vec![2, 11, 5], vec![3, 3, 3]).is_err());
        assert!(Target::new("t", vec![2, 11, 5], vec![]).is_err());
        assert!(Target::new("t", vec![], vec![3, 3, 2]).is_err());
        assert!(Target::new("t", vec![18], vec![18, 1]).is_err());
    }

    #[test]
    fn auto_factors_use_greedy_decomposition() {
        let target = Target::with_auto_factors("t", vec![10, 55, 25], 5).unwrap();
        assert_eq!(target.factors, vec![5, 3, 3, 2]);
        assert_eq!(target.depth(), 4);
        assert_eq!(target.ratio_sum(), 90);
    }

    #[test]
    fn scenario_requires_uniform_reagent_count() {
        let a = Target::new("a", vec![2, 11, 5], vec![3, 3, 2]).unwrap();
        let b = Target::new("b", vec![5, 6, 14], vec![5, 5]).unwrap();
        assert!(validate_targets(&[a.clone(), b]).is_ok());

        let c = Target::new("c", vec![9, 9], vec![3, 3, 2]).unwrap();
        assert!(validate_targets(&[a, c]).is_err());
    }
}
