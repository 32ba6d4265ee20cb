//! Worker pool and reproducible per-task RNG streams.
//!
//! Loops over trials and permutations run on rayon.  With a configured worker
//! count a dedicated pool of that size is built for the call; otherwise the
//! global pool is used.  Results are always collected in index order, and
//! every permutation draws from its own RNG seeded from `(seed, index)`, so
//! the output does not depend on scheduling or on the worker count.
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::ThreadPoolBuilder;

use crate::error::{BrainTimeError, Result};

/// Run `op` on a pool of `workers` threads (`None`: the global pool).
pub fn install<OP, R>(workers: Option<usize>, op: OP) -> Result<R>
where
    OP: FnOnce() -> R + Send,
    R: Send,
{
    match workers {
        None => Ok(op()),
        Some(n) => {
            let pool = ThreadPoolBuilder::new()
                .num_threads(n)
                .thread_name(|i| format!("braintime-{i}"))
                .build()
                .map_err(|e| BrainTimeError::config("workers", e.to_string()))?;
            Ok(pool.install(op))
        }
    }
}

/// SplitMix64 hash of `(base_seed, counter)`.
///
/// Neighbouring counters give unrelated seeds, unlike `base_seed + counter`.
#[inline]
pub fn counter_rng_seed(base_seed: u64, counter: u64) -> u64 {
    let mut z = base_seed.wrapping_add(counter.wrapping_mul(0x9e3779b97f4a7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// RNG stream of task `index` under `base_seed`.
pub fn task_rng(base_seed: u64, index: usize) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(counter_rng_seed(base_seed, index as u64))
}
