//! Deterministic input generation and the CPU reference.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Two input arrays of `n` values each in `[0, 1)`, drawn from one
/// `ChaCha8Rng` stream seeded with `seed` (`a` first, then `b`).
pub fn generate_inputs(n: usize, seed: u64) -> (Vec<f32>, Vec<f32>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut a = Vec::with_capacity(n);
    let mut b = Vec::with_capacity(n);
    for _ in 0..n {
        a.push(rng.random::<f32>());
        b.push(rng.random::<f32>());
    }
    debug!(n, seed, "generated input data");
    (a, b)
}

/// `a[i] + b[i]` computed on the host.
pub fn reference_sum(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}
