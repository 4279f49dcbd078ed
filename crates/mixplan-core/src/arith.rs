//! Integer arithmetic for the mixing lattice: bounded factorization,
//! deduplicated permutations, and lcm/gcd over potency values.

use mixplan_error::{MixResult, mix_bail};

pub fn gcd(a: u64, b: u64) -> u64 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

pub fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        return 0;
    }
    a / gcd(a, b) * b
}

/// Least common multiple of a list of values. Empty input yields 1, the
/// neutral scaling for a concentration row with no sharing sources.
pub fn lcm_all<I: IntoIterator<Item = u64>>(values: I) -> u64 {
    values.into_iter().fold(1, lcm)
}

/// Decomposes `n` into an ordered list of factors in `(1, max_factor]`,
/// descending, whose product is `n`.
///
/// The policy is greedy largest-first: at each step the largest divisor of
/// the remaining value not exceeding `max_factor` is extracted. The policy is
/// part of the contract: it decides the shape of every auto-factored tree,
/// so two runs over the same target always agree on depth and level factors.
///
/// `n <= 1` yields the empty decomposition.
pub fn factorize(n: u64, max_factor: u64) -> MixResult<Vec<u64>> {
    if n <= 1 {
        return Ok(Vec::new());
    }

    let mut remaining = n;
    let mut factors = Vec::new();
    while remaining > 1 {
        let divisor = (2..=max_factor).rev().find(|d| remaining % d == 0);
        match divisor {
            Some(d) => {
                factors.push(d);
                remaining /= d;
            }
            None => {
                mix_bail!(
                    NotFactorizable:
                    "no divisor in (1, {}] for residue {} of {}",
                    max_factor,
                    remaining,
                    n
                )
            }
        }
    }

    factors.sort_unstable_by(|a, b| b.cmp(a));
    Ok(factors)
}

/// All distinct orderings of `factors`, in lexicographic order.
///
/// Repeated factors would make the naive permutation count explode with
/// duplicates; recursing over the multiset of remaining values yields each
/// distinct ordering exactly once.
pub fn unique_permutations(factors: &[u64]) -> Vec<Vec<u64>> {
    if factors.is_empty() {
        return vec![Vec::new()];
    }

    let mut pool = factors.to_vec();
    pool.sort_unstable();

    let mut out = Vec::new();
    let mut current = Vec::with_capacity(pool.len());
    permute_into(&mut pool, &mut current, &mut out);
    out
}

fn permute_into(pool: &mut Vec<u64>, current: &mut Vec<u64>, out: &mut Vec<Vec<u64>>) {
    if pool.is_empty() {
        out.push(current.clone());
        return;
    }

    let mut previous = None;
    for i in 0..pool.len() {
        if previous == Some(pool[i]) {
            continue;
        }
        previous = Some(pool[i]);

        let value = pool.remove(i);
        current.push(value);
        permute_into(pool, current, out);
        current.pop();
        pool.insert(i, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gcd_lcm_basics() {
        assert_eq!(gcd(18, 12), 6);
        assert_eq!(lcm(18, 12), 36);
        assert_eq!(lcm_all([3, 5, 9]), 45);
        assert_eq!(lcm_all(std::iter::empty()), 1);
    }

    #[test]
    fn factorize_is_greedy_largest_first() {
        // 18 = 3 * 3 * 2 under a mixer bound of 5; the greedy pass never
        // picks 2 first even though [2, 3, 3] is also a valid multiset.
        assert_eq!(factorize(18, 5).unwrap(), vec![3, 3, 2]);
        assert_eq!(factorize(90, 5).unwrap(), vec![5, 3, 3, 2]);
        assert_eq!(factorize(25, 5).unwrap(), vec![5, 5]);
        assert_eq!(factorize(1, 5).unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn factorize_rejects_large_primes() {
        let err = factorize(19, 5).unwrap_err();
        assert!(err.to_string().contains("19"));
        // 14 = 7 * 2 and 7 exceeds the bound; greedy extracts 2 then sticks at 7.
        assert!(factorize(14, 5).is_err());
    }

    #[test]
    fn factorize_result_is_descending() {
        for n in [8u64, 12, 16, 24, 36, 60, 135] {
            let factors = factorize(n, 5).unwrap();
            assert!(factors.windows(2).all(|w| w[0] >= w[1]), "{:?}", factors);
            assert_eq!(factors.iter().product::<u64>(), n);
        }
    }

    #[test]
    fn unique_permutations_deduplicate() {
        let perms = unique_permutations(&[5, 3, 3]);
        assert_eq!(
            perms,
            vec![vec![3, 3, 5], vec![3, 5, 3], vec![5, 3, 3]]
        );

        // 4 values with one pair repeated: 4!/2! = 12 distinct orderings.
        assert_eq!(unique_permutations(&[5, 3, 3, 2]).len(), 12);
        assert_eq!(unique_permutations(&[]), vec![Vec::<u64>::new()]);
    }
}
