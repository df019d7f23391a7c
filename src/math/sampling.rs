//! Coefficient samplers for key generation and encryption.

use rand::Rng;
use rand::distr::Uniform;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Normal};

/// Standard deviation of the encryption noise distribution.
pub const NOISE_STANDARD_DEVIATION: f64 = 3.2;

/// Samples a ternary polynomial with coefficients in `{-1, 0, 1}`.
pub fn ternary_coeffs<R: Rng + ?Sized>(rng: &mut R, degree: usize) -> Vec<i64> {
    let dist = Uniform::new_inclusive(-1i64, 1).unwrap();
    (0..degree).map(|_| dist.sample(rng)).collect()
}

/// Samples a ternary polynomial with exactly `hamming_weight` non-zero
/// coefficients.
///
/// # Panics
/// Panics when `hamming_weight > degree`.
pub fn ternary_coeffs_with_weight<R: Rng + ?Sized>(
    rng: &mut R,
    degree: usize,
    hamming_weight: usize,
) -> Vec<i64> {
    assert!(hamming_weight <= degree);
    let mut out = vec![0i64; degree];
    let mut indices: Vec<usize> = (0..degree).collect();
    indices.shuffle(rng);
    for &idx in indices.iter().take(hamming_weight) {
        out[idx] = if rng.random_bool(0.5) { 1 } else { -1 };
    }
    out
}

/// Samples a discrete Gaussian polynomial by rounding a continuous normal.
///
/// # Panics
/// Panics when `sigma` is not finite and positive.
pub fn gaussian_coeffs<R: Rng + ?Sized>(rng: &mut R, degree: usize, sigma: f64) -> Vec<i64> {
    let normal = Normal::new(0.0, sigma).unwrap();
    (0..degree).map(|_| normal.sample(rng).round() as i64).collect()
}

/// Samples residues uniformly below `modulus`.
pub fn uniform_residues<R: Rng + ?Sized>(rng: &mut R, degree: usize, modulus: u64) -> Vec<u64> {
    let dist = Uniform::new(0u64, modulus).unwrap();
    (0..degree).map(|_| dist.sample(rng)).collect()
}
