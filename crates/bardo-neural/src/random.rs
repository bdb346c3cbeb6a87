// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Thin wrappers over `rand`'s thread-local generator.
//!
//! Randomness feeds three very different consumers: id allocation wants raw
//! 64-bit entropy, the mutation engine wants uniform palette and element
//! draws, and weight tuning wants gaussian perturbation steps. Each helper
//! here serves exactly one of those shapes. Every mesh task and every
//! mutation call site draws from its own thread-local generator, so there
//! is no shared RNG state anywhere in the hot path.

use rand::Rng;

/// Uniform draw from `[0.0, 1.0)`: the building block for operator
/// probabilities, sub-sampling keeps and re-entry decisions.
pub fn random_f64() -> f64 {
    rand::thread_rng().gen()
}

/// Single-precision variant of [`random_f64`].
pub fn random_f32() -> f32 {
    random_f64() as f32
}

/// Uniform integer in `[min, max)`, used for counts such as the
/// topological-mutation target of one mutation pass.
pub fn random_range(min: i64, max: i64) -> i64 {
    assert!(min < max, "empty draw range {}..{}", min, max);
    rand::thread_rng().gen_range(min..max)
}

/// Uniform index into a collection of `len` elements. Panics on an empty
/// collection; callers gate on emptiness first (or use [`try_pick`]).
pub fn random_index(len: usize) -> usize {
    assert!(len > 0, "cannot index an empty collection");
    rand::thread_rng().gen_range(0..len)
}

/// 64 bits of entropy: the unique part of every entity id.
pub fn random_u64() -> u64 {
    rand::thread_rng().gen()
}

/// Standard normal draw (Box-Muller): the step distribution for weight and
/// plasticity-parameter perturbation.
pub fn gaussian() -> f64 {
    let mut rng = rand::thread_rng();
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Uniform draw from a palette slice. Panics on an empty slice.
pub fn pick<T>(items: &[T]) -> &T {
    &items[random_index(items.len())]
}

/// Uniform draw from a slice, `None` on an empty slice.
pub fn try_pick<T>(items: &[T]) -> Option<&T> {
    if items.is_empty() {
        None
    } else {
        Some(pick(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_interval_draws_stay_in_bounds() {
        for _ in 0..256 {
            let x = random_f64();
            assert!((0.0..1.0).contains(&x), "f64 draw escaped the unit interval: {}", x);
            let y = random_f32();
            assert!((0.0..1.0).contains(&y), "f32 draw escaped the unit interval: {}", y);
        }
    }

    #[test]
    fn test_random_range_covers_its_span() {
        // A small span should be fully exercised by a few hundred draws.
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            let v = random_range(-3, 3);
            assert!((-3..3).contains(&v), "draw {} outside -3..3", v);
            seen.insert(v);
        }
        assert_eq!(seen.len(), 6, "span -3..3 not fully covered: {:?}", seen);
    }

    #[test]
    #[should_panic]
    fn test_random_range_rejects_empty_span() {
        random_range(5, 5);
    }

    #[test]
    fn test_random_index_respects_length() {
        for _ in 0..100 {
            assert!(random_index(7) < 7);
        }
    }

    #[test]
    fn test_id_entropy_has_no_collisions() {
        // Id allocation leans on this never colliding in practice; a batch
        // of fresh draws must be pairwise distinct.
        let ids: std::collections::HashSet<u64> = (0..64).map(|_| random_u64()).collect();
        assert_eq!(ids.len(), 64, "u64 id draws collided");
    }

    #[test]
    fn test_gaussian_shape() {
        let n = 10_000;
        let draws: Vec<f64> = (0..n).map(|_| gaussian()).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.1, "gaussian mean drifted: {}", mean);
        // Roughly two thirds of the mass sits within one standard
        // deviation; a perturbation step distribution that flat-lines or
        // explodes would fail this.
        let within_one_sigma = draws.iter().filter(|x| x.abs() < 1.0).count() as f64 / n as f64;
        assert!(
            (0.6..0.8).contains(&within_one_sigma),
            "gaussian spread off: {} within one sigma",
            within_one_sigma
        );
    }

    #[test]
    fn test_palette_picks() {
        let palette = ["tanh", "sin", "gaussian"];
        for _ in 0..30 {
            assert!(palette.contains(pick(&palette)));
        }
        assert_eq!(try_pick::<&str>(&[]), None);
        assert!(try_pick(&palette).is_some());
    }
}
