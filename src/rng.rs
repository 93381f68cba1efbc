//! Deterministic PRNG plumbing for the selection scorer's variety-jitter
//! term (§4.4, §5). The same seed must always produce the same jitter
//! sequence for a given iteration order over the pool.

use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub fn rng_from_seed(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// `+0..10` uniform jitter term.
pub fn variety_jitter(rng: &mut ChaCha8Rng) -> f64 {
    rng.gen_range(0.0..10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = rng_from_seed(42);
        let mut b = rng_from_seed(42);
        for _ in 0..10 {
            assert_eq!(variety_jitter(&mut a), variety_jitter(&mut b));
        }
    }

    #[test]
    fn jitter_in_range() {
        let mut rng = rng_from_seed(7);
        for _ in 0..100 {
            let j = variety_jitter(&mut rng);
            assert!((0.0..10.0).contains(&j));
        }
    }
}
