//! Negacyclic number-theoretic transform over `Z_q[x]/(x^n + 1)`.
//!
//! One `NttTable` is precomputed per (modulus, degree) pair: forward and
//! inverse powers of a primitive `2n`-th root of unity in bit-reversed order,
//! plus `n^{-1} mod q` for the inverse transform.

use crate::error::{Error, Result};
use crate::math::primes::is_ntt_friendly_prime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NttTable {
    degree: usize,
    modulus: u64,
    forward_roots: Vec<u64>,
    inverse_roots: Vec<u64>,
    degree_inv: u64,
}

impl NttTable {
    /// Builds the root tables for `modulus` at `degree`.
    ///
    /// Fails unless `degree` is a power of two and `modulus` is an
    /// NTT-friendly prime for it.
    pub fn new(degree: usize, modulus: u64) -> Result<Self> {
        if !degree.is_power_of_two() {
            return Err(Error::invalid(format!(
                "degree {degree} is not a power of two"
            )));
        }
        if !is_ntt_friendly_prime(modulus, degree as u64) {
            return Err(Error::invalid(format!(
                "modulus {modulus} is not an NTT-friendly prime for degree {degree}"
            )));
        }

        let order = 2 * degree as u64;
        let psi = find_primitive_root(modulus, order);
        let psi_inv = mod_inverse(psi, modulus);
        let bits = degree.trailing_zeros() as usize;

        let mut forward_roots = vec![1u64; degree];
        let mut inverse_roots = vec![1u64; degree];
        for index in 1..degree {
            let rev = reverse_bits(index, bits) as u64;
            forward_roots[index] = pow_mod(psi, rev, modulus);
            inverse_roots[index] = pow_mod(psi_inv, rev, modulus);
        }

        Ok(Self {
            degree,
            modulus,
            forward_roots,
            inverse_roots,
            degree_inv: mod_inverse(degree as u64, modulus),
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    /// In-place forward transform: coefficient domain to evaluation domain.
    ///
    /// Cooley-Tukey butterflies with the powers of `psi` merged into the
    /// twiddles, so no separate pre-twist pass is needed. The output is in
    /// bit-reversed evaluation order, which the inverse undoes.
    pub fn forward(&self, values: &mut [u64]) {
        debug_assert_eq!(values.len(), self.degree);
        let n = self.degree;
        let q = self.modulus;
        let mut half = n / 2;
        let mut m = 1;
        while m < n {
            for block in 0..m {
                let twiddle = self.forward_roots[m + block];
                let start = 2 * block * half;
                for left in start..start + half {
                    let right = left + half;
                    let u = values[left];
                    let t = mul_mod(values[right], twiddle, q);
                    values[left] = add_mod(u, t, q);
                    values[right] = sub_mod(u, t, q);
                }
            }
            half /= 2;
            m *= 2;
        }
    }

    /// In-place inverse transform: evaluation domain to coefficient domain.
    ///
    /// Gentleman-Sande butterflies over the inverse root table, followed by
    /// the `n^{-1}` scaling.
    pub fn inverse(&self, values: &mut [u64]) {
        debug_assert_eq!(values.len(), self.degree);
        let n = self.degree;
        let q = self.modulus;
        let mut half = 1;
        let mut m = n / 2;
        while m >= 1 {
            for block in 0..m {
                let twiddle = self.inverse_roots[m + block];
                let start = 2 * block * half;
                for left in start..start + half {
                    let right = left + half;
                    let u = values[left];
                    let t = values[right];
                    values[left] = add_mod(u, t, q);
                    values[right] = mul_mod(sub_mod(u, t, q), twiddle, q);
                }
            }
            half *= 2;
            m /= 2;
        }
        for v in values.iter_mut() {
            *v = mul_mod(*v, self.degree_inv, self.modulus);
        }
    }
}

// ─── Modular arithmetic helpers ──────────────────────────────────────────────

#[inline]
pub fn add_mod(a: u64, b: u64, q: u64) -> u64 {
    debug_assert!(a < q && b < q);
    let s = a + b;
    if s >= q { s - q } else { s }
}

#[inline]
pub fn sub_mod(a: u64, b: u64, q: u64) -> u64 {
    debug_assert!(a < q && b < q);
    if a >= b { a - b } else { a + q - b }
}

#[inline]
pub fn mul_mod(a: u64, b: u64, q: u64) -> u64 {
    ((a as u128 * b as u128) % q as u128) as u64
}

pub fn pow_mod(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    let mut acc = 1u64 % modulus;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, modulus);
        }
        base = mul_mod(base, base, modulus);
        exp >>= 1;
    }
    acc
}

/// Modular inverse via extended Euclid.
///
/// # Panics
/// Panics when `value` and `modulus` are not coprime; every caller passes a
/// prime modulus and a nonzero residue.
pub fn mod_inverse(value: u64, modulus: u64) -> u64 {
    let (mut old_r, mut r) = (value as i128, modulus as i128);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let quotient = old_r / r;
        (old_r, r) = (r, old_r - quotient * r);
        (old_s, s) = (s, old_s - quotient * s);
    }
    assert_eq!(old_r, 1, "mod_inverse: arguments must be coprime");
    old_s.rem_euclid(modulus as i128) as u64
}

/// Finds a primitive `order`-th root of unity in `Z_modulus`.
///
/// Cannot fail for an NTT-friendly prime, since `order` divides `modulus - 1`.
fn find_primitive_root(modulus: u64, order: u64) -> u64 {
    debug_assert_eq!((modulus - 1) % order, 0);
    let exponent = (modulus - 1) / order;
    let factors = distinct_prime_factors(order);

    'candidate: for candidate in 2..modulus {
        let root = pow_mod(candidate, exponent, modulus);
        if root == 1 {
            continue;
        }
        for &factor in &factors {
            if pow_mod(root, order / factor, modulus) == 1 {
                continue 'candidate;
            }
        }
        return root;
    }
    unreachable!("no primitive root for modulus {modulus}, order {order}")
}

fn distinct_prime_factors(mut value: u64) -> Vec<u64> {
    let mut factors = Vec::new();
    let mut d = 2u64;
    while d * d <= value {
        if value % d == 0 {
            factors.push(d);
            while value % d == 0 {
                value /= d;
            }
        }
        d += 1;
    }
    if value > 1 {
        factors.push(value);
    }
    factors
}

fn reverse_bits(value: usize, bit_count: usize) -> usize {
    value.reverse_bits() >> (usize::BITS as usize - bit_count)
}
