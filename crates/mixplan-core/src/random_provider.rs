//! Thread-local seeded randomness for scenario generation and solver
//! portfolio seeds. Pinning the seed (and the worker count) is what makes
//! two runs of the same configuration reproducible.

use rand::rngs::{SmallRng, SysRng};
use rand::{Rng, RngExt, SeedableRng};
use std::cell::RefCell;
use std::ops::Range;
use std::sync::{Arc, LazyLock, Mutex};

static GLOBAL_RNG: LazyLock<Arc<Mutex<SmallRng>>> = LazyLock::new(|| {
    Arc::new(Mutex::new(
        SmallRng::try_from_rng(&mut SysRng).expect("unexpected failure from SysRng"),
    ))
});

thread_local! {
    static TLS_RNG: RefCell<SmallRng> = RefCell::new({
        let mut global = GLOBAL_RNG.lock().unwrap();
        SmallRng::seed_from_u64(global.next_u64())
    });
}

pub fn with_rng<R>(f: impl FnOnce(&mut SmallRng) -> R) -> R {
    TLS_RNG.with(|cell| f(&mut cell.borrow_mut()))
}

/// Seeds the thread-local random number generator with the given seed.
pub fn set_seed(seed: u64) {
    TLS_RNG.with(|cell| {
        *cell.borrow_mut() = SmallRng::seed_from_u64(seed);
    });
}

/// Temporarily sets the seed of the thread-local random number generator
/// for the duration of the closure `f`, then restores the original state.
pub fn scoped_seed<R>(seed: u64, f: impl FnOnce() -> R) -> R {
    TLS_RNG.with(|cell| {
        let original = {
            let mut rng = cell.borrow_mut();
            let original = rng.clone();
            *rng = SmallRng::seed_from_u64(seed);
            original
        };

        let result = f();

        *cell.borrow_mut() = original;
        result
    })
}

/// Generates a random number in the given half-open range.
pub fn range(range: Range<u64>) -> u64 {
    with_rng(|rng| rng.random_range(range))
}

/// Chooses a random item from the given slice.
pub fn choose<T>(items: &[T]) -> &T {
    let idx = with_rng(|rng| rng.random_range(0..items.len()));
    &items[idx]
}

/// Samples `amount` distinct values from `range`, ascending.
pub fn sample_sorted(range: Range<u64>, amount: usize) -> Vec<u64> {
    let span = (range.end - range.start) as usize;
    let mut picked = with_rng(|rng| {
        rand::seq::index::sample(rng, span, amount)
            .into_iter()
            .map(|i| range.start + i as u64)
            .collect::<Vec<_>>()
    });
    picked.sort_unstable();
    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_seed_is_reproducible() {
        let one = scoped_seed(7, || (0..8).map(|_| range(0..100)).collect::<Vec<_>>());
        let two = scoped_seed(7, || (0..8).map(|_| range(0..100)).collect::<Vec<_>>());
        assert_eq!(one, two);
    }

    #[test]
    fn sample_sorted_is_distinct_and_in_range() {
        scoped_seed(11, || {
            let sample = sample_sorted(1..18, 2);
            assert_eq!(sample.len(), 2);
            assert!(sample[0] < sample[1]);
            assert!(sample.iter().all(|v| (1..18).contains(v)));
        });
    }
}
