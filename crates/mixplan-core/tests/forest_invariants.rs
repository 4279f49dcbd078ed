//! Structural invariants of the DFMM construction, checked over a spread of
//! seeded random targets: forests stay well-formed, potencies stay
//! monotone, and the default edges always survive the admissibility filter.

use mixplan_core::random_provider;
use mixplan_core::{MixProblem, SharingPolicy, Target};

/// Splits `sum` into `count` non-zero parts at random divider points.
fn random_ratios(count: usize, sum: u64) -> Vec<u64> {
    let dividers = random_provider::sample_sorted(1..sum, count - 1);
    let mut ratios = Vec::with_capacity(count);
    let mut previous = 0;
    for divider in dividers {
        ratios.push(divider - previous);
        previous = divider;
    }
    ratios.push(sum - previous);
    ratios
}

fn random_targets(seed: u64) -> Vec<Target> {
    random_provider::scoped_seed(seed, || {
        // All of these sums factor under a mixer bound of 5.
        let sums = [12u64, 18, 24, 36, 45, 60, 90];
        (0..2)
            .map(|i| {
                let sum = *random_provider::choose(&sums);
                Target::with_auto_factors(
                    format!("target_{}", i),
                    random_ratios(3, sum),
                    5,
                )
                .unwrap()
            })
            .collect()
    })
}

#[test]
fn forests_are_well_formed_for_random_targets() {
    for seed in 0..24 {
        let targets = random_targets(seed);
        let problem = MixProblem::new(targets, SharingPolicy::default()).unwrap();

        for tree in problem.forest() {
            // The root exists, is unique at level 0, and has no parent.
            let root = tree.root();
            assert!(tree.contains(root), "seed {}", seed);
            assert_eq!(tree.level_width(0), 1);

            for node in tree.nodes() {
                let parents = tree
                    .nodes()
                    .filter(|p| tree.children(*p).contains(&node))
                    .count();
                if node.is_root() {
                    assert_eq!(parents, 0, "seed {}: root has a parent", seed);
                } else {
                    assert_eq!(
                        parents, 1,
                        "seed {}: {} has {} parents",
                        seed, node, parents
                    );
                }

                for child in tree.children(node) {
                    assert_eq!(child.level, node.level + 1);
                }
            }
        }
    }
}

#[test]
fn potencies_are_positive_monotone_and_anchored_at_the_sum() {
    for seed in 24..48 {
        let targets = random_targets(seed);
        let problem = MixProblem::new(targets.clone(), SharingPolicy::default()).unwrap();

        for (m, tree) in problem.forest().iter().enumerate() {
            let target = &targets[m];
            assert_eq!(
                problem.potency(tree.root()),
                target.ratio_sum(),
                "seed {}: root potency is the ratio sum",
                seed
            );

            for node in tree.nodes() {
                let p = problem.potency(node);
                assert!(p > 0);

                let f = target.factors[node.level];
                match tree.children(node).iter().map(|&c| problem.potency(c)).max() {
                    Some(max_child) => assert_eq!(p, f * max_child),
                    None => assert_eq!(p, f),
                }
            }

            // Within a level, round-robin attachment sends the deeper chains
            // to the lower positions first.
            for level in 0..tree.depth() {
                let ps: Vec<u64> = tree
                    .nodes_at_level(level)
                    .map(|n| problem.potency(n))
                    .collect();
                assert!(
                    ps.windows(2).all(|w| w[0] >= w[1]),
                    "seed {}: potencies not monotone at level {}: {:?}",
                    seed,
                    level,
                    ps
                );
            }
        }
    }
}

#[test]
fn default_edges_always_pass_admissibility() {
    for seed in 48..72 {
        let targets = random_targets(seed);
        for pruning in [false, true] {
            let problem = MixProblem::new(
                targets.clone(),
                SharingPolicy {
                    role_based_pruning: pruning,
                    ..SharingPolicy::default()
                },
            )
            .unwrap();

            for tree in problem.forest() {
                for parent in tree.nodes() {
                    for &child in tree.children(parent) {
                        assert!(
                            problem.sources(parent).contains(&child),
                            "seed {} (pruning {}): default edge {} -> {} missing",
                            seed,
                            pruning,
                            child,
                            parent
                        );
                    }
                }
            }
        }
    }
}
