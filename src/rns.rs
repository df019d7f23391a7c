//! Residue number system representation of ring elements.
//!
//! A polynomial in `Z_Q[x]/(x^n + 1)` with `Q = q_0 * ... * q_{k-1}` is held
//! as one residue channel per prime. All coefficient-wise arithmetic happens
//! channel by channel; crossing channels requires CRT reconstruction.

use std::ops::Neg;
use std::sync::Arc;

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::error::{Error, Result};
use crate::math::NttTable;
use crate::math::ntt::{add_mod, mul_mod, sub_mod};

// ─── RnsBasis ────────────────────────────────────────────────────────────────

/// A fixed prime chain together with its NTT tables and CRT precomputation.
#[derive(Debug, Clone)]
pub struct RnsBasis {
    degree: usize,
    moduli: Vec<u64>,
    ntt_tables: Vec<NttTable>,
    modulus_product: BigUint,
    punctured: Vec<BigUint>,
    punctured_inv: Vec<u64>,
}

impl RnsBasis {
    /// Builds a basis over `moduli`, all of which must be distinct
    /// NTT-friendly primes for `degree`.
    pub fn new(degree: usize, moduli: Vec<u64>) -> Result<Self> {
        if moduli.is_empty() {
            return Err(Error::invalid("modulus chain is empty"));
        }
        for (i, &q) in moduli.iter().enumerate() {
            if moduli[..i].contains(&q) {
                return Err(Error::invalid(format!("duplicate modulus {q} in chain")));
            }
        }
        let ntt_tables = moduli
            .iter()
            .map(|&q| NttTable::new(degree, q))
            .collect::<Result<Vec<_>>>()?;

        let modulus_product: BigUint = moduli.iter().map(|&q| BigUint::from(q)).product();
        let punctured: Vec<BigUint> = moduli
            .iter()
            .map(|&q| &modulus_product / BigUint::from(q))
            .collect();
        let punctured_inv = moduli
            .iter()
            .zip(&punctured)
            .map(|(&q, p)| {
                let p_mod_q = (p % BigUint::from(q))
                    .to_u64()
                    .ok_or_else(|| Error::invalid("punctured product does not reduce"))?;
                Ok(crate::math::ntt::mod_inverse(p_mod_q, q))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            degree,
            moduli,
            ntt_tables,
            modulus_product,
            punctured,
            punctured_inv,
        })
    }

    /// The basis with the last prime removed, for the next chain level.
    pub fn drop_last(&self) -> Result<Self> {
        if self.moduli.len() < 2 {
            return Err(Error::invalid("cannot drop the last remaining modulus"));
        }
        Self::new(self.degree, self.moduli[..self.moduli.len() - 1].to_vec())
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    pub fn channel_count(&self) -> usize {
        self.moduli.len()
    }

    /// Product of the chain, `Q`.
    pub fn modulus_product(&self) -> &BigUint {
        &self.modulus_product
    }

    pub fn ntt_table(&self, channel: usize) -> &NttTable {
        &self.ntt_tables[channel]
    }

    /// `(Q / q_j) * ((Q / q_j)^{-1} mod q_j)` for key-switch decomposition.
    pub fn punctured_projector(&self, channel: usize) -> BigUint {
        &self.punctured[channel] * BigUint::from(self.punctured_inv[channel])
    }

    /// CRT-reconstructs one coefficient into `(-Q/2, Q/2]`.
    pub fn reconstruct_centered(&self, residues: &[u64]) -> BigInt {
        debug_assert_eq!(residues.len(), self.channel_count());
        let mut acc = BigUint::zero();
        for (channel, &r) in residues.iter().enumerate() {
            let term = mul_mod(r, self.punctured_inv[channel], self.moduli[channel]);
            acc += &self.punctured[channel] * BigUint::from(term);
        }
        acc %= &self.modulus_product;
        let half = &self.modulus_product / 2u32;
        if acc > half {
            BigInt::from(acc) - BigInt::from(self.modulus_product.clone())
        } else {
            BigInt::from(acc)
        }
    }

    /// Residues of a (possibly negative) integer in every channel.
    pub fn residues_of(&self, value: &BigInt) -> Vec<u64> {
        self.moduli
            .iter()
            .map(|&q| {
                value
                    .mod_floor(&BigInt::from(q))
                    .to_u64()
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Bit length of `Q`.
    pub fn total_bits(&self) -> u64 {
        self.modulus_product.bits()
    }
}

impl PartialEq for RnsBasis {
    fn eq(&self, other: &Self) -> bool {
        self.degree == other.degree && self.moduli == other.moduli
    }
}

impl Eq for RnsBasis {}

// ─── RnsPoly ─────────────────────────────────────────────────────────────────

/// A ring element in RNS form, either in coefficient or NTT domain.
///
/// # Invariants
/// - `channels.len() == basis.channel_count()`
/// - every residue in channel `j` is reduced modulo `basis.moduli()[j]`
#[derive(Debug, Clone, PartialEq)]
pub struct RnsPoly {
    channels: Vec<Vec<u64>>,
    basis: Arc<RnsBasis>,
    in_ntt_domain: bool,
}

impl RnsPoly {
    pub fn zero(basis: Arc<RnsBasis>) -> Self {
        let channels = vec![vec![0u64; basis.degree()]; basis.channel_count()];
        Self {
            channels,
            basis,
            in_ntt_domain: false,
        }
    }

    /// Lifts small signed coefficients into every channel.
    pub fn from_signed_coeffs(basis: Arc<RnsBasis>, coeffs: &[i64]) -> Self {
        debug_assert_eq!(coeffs.len(), basis.degree());
        let channels = basis
            .moduli()
            .iter()
            .map(|&q| {
                coeffs
                    .iter()
                    .map(|&c| c.rem_euclid(q as i64) as u64)
                    .collect()
            })
            .collect();
        Self {
            channels,
            basis,
            in_ntt_domain: false,
        }
    }

    /// Reduces arbitrary-precision coefficients into every channel.
    pub fn from_bigint_coeffs(basis: Arc<RnsBasis>, coeffs: &[BigInt]) -> Self {
        debug_assert_eq!(coeffs.len(), basis.degree());
        let mut channels = vec![Vec::with_capacity(basis.degree()); basis.channel_count()];
        for coeff in coeffs {
            for (channel, &residue) in basis.residues_of(coeff).iter().enumerate() {
                channels[channel].push(residue);
            }
        }
        Self {
            channels,
            basis,
            in_ntt_domain: false,
        }
    }

    /// Internal constructor for channels already known to be reduced.
    pub(crate) fn from_channels_unchecked(
        basis: Arc<RnsBasis>,
        channels: Vec<Vec<u64>>,
        in_ntt_domain: bool,
    ) -> Self {
        debug_assert_eq!(channels.len(), basis.channel_count());
        debug_assert!(channels.iter().all(|ch| ch.len() == basis.degree()));
        Self {
            channels,
            basis,
            in_ntt_domain,
        }
    }

    /// An all-zero polynomial already marked as NTT domain.
    pub(crate) fn zero_ntt(basis: Arc<RnsBasis>) -> Self {
        let mut poly = Self::zero(basis);
        poly.in_ntt_domain = true;
        poly
    }

    /// Rebuilds a polynomial from raw channels, validating shape and reduction.
    pub fn from_channels(
        basis: Arc<RnsBasis>,
        channels: Vec<Vec<u64>>,
        in_ntt_domain: bool,
    ) -> Result<Self> {
        if channels.len() != basis.channel_count() {
            return Err(Error::invalid(format!(
                "expected {} residue channels, got {}",
                basis.channel_count(),
                channels.len()
            )));
        }
        for (channel, residues) in channels.iter().enumerate() {
            if residues.len() != basis.degree() {
                return Err(Error::invalid(format!(
                    "channel {channel} holds {} coefficients, expected {}",
                    residues.len(),
                    basis.degree()
                )));
            }
            let q = basis.moduli()[channel];
            if residues.iter().any(|&r| r >= q) {
                return Err(Error::invalid(format!(
                    "channel {channel} contains a coefficient not reduced modulo {q}"
                )));
            }
        }
        Ok(Self {
            channels,
            basis,
            in_ntt_domain,
        })
    }

    pub fn basis(&self) -> &Arc<RnsBasis> {
        &self.basis
    }

    pub fn channels(&self) -> &[Vec<u64>] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> &[u64] {
        &self.channels[index]
    }

    pub fn in_ntt_domain(&self) -> bool {
        self.in_ntt_domain
    }

    pub fn to_ntt_domain(&mut self) {
        if self.in_ntt_domain {
            return;
        }
        for (channel, residues) in self.channels.iter_mut().enumerate() {
            self.basis.ntt_table(channel).forward(residues);
        }
        self.in_ntt_domain = true;
    }

    pub fn to_coeff_domain(&mut self) {
        if !self.in_ntt_domain {
            return;
        }
        for (channel, residues) in self.channels.iter_mut().enumerate() {
            self.basis.ntt_table(channel).inverse(residues);
        }
        self.in_ntt_domain = false;
    }

    /// Slot-wise product; both operands must already be in NTT domain.
    pub fn pointwise_mul_assign(&mut self, rhs: &RnsPoly) {
        debug_assert!(Arc::ptr_eq(&self.basis, &rhs.basis) || self.basis == rhs.basis);
        debug_assert!(self.in_ntt_domain && rhs.in_ntt_domain);
        for (channel, (a, b)) in self.channels.iter_mut().zip(&rhs.channels).enumerate() {
            let q = self.basis.moduli()[channel];
            for (x, &y) in a.iter_mut().zip(b) {
                *x = mul_mod(*x, y, q);
            }
        }
    }

    /// Negacyclic product via forward transforms, returned in coefficient
    /// domain. Neither operand is mutated.
    pub fn ntt_mul(&self, rhs: &RnsPoly) -> RnsPoly {
        let mut a = self.clone();
        let mut b = rhs.clone();
        a.to_ntt_domain();
        b.to_ntt_domain();
        a.pointwise_mul_assign(&b);
        a.to_coeff_domain();
        a
    }

    /// Multiplies every channel by the same scalar, reduced per channel.
    pub fn mul_scalar_assign(&mut self, scalar: u64) {
        for (channel, residues) in self.channels.iter_mut().enumerate() {
            let q = self.basis.moduli()[channel];
            let s = scalar % q;
            for r in residues.iter_mut() {
                *r = mul_mod(*r, s, q);
            }
        }
    }

    /// Drops trailing channels so the polynomial lives in the smaller `basis`.
    ///
    /// Valid because smaller bases are prefixes of the chain and residues are
    /// channel-local.
    pub(crate) fn restricted_to(&self, basis: &Arc<RnsBasis>) -> RnsPoly {
        debug_assert!(!self.in_ntt_domain);
        debug_assert!(basis.channel_count() <= self.basis.channel_count());
        debug_assert_eq!(
            basis.moduli(),
            &self.basis.moduli()[..basis.channel_count()]
        );
        RnsPoly::from_channels_unchecked(
            Arc::clone(basis),
            self.channels[..basis.channel_count()].to_vec(),
            false,
        )
    }

    /// Applies the Galois automorphism `x -> x^element`.
    ///
    /// # Panics
    /// Debug-panics unless `element` is odd and the polynomial is in
    /// coefficient domain.
    pub fn automorphism(&self, element: u64) -> RnsPoly {
        debug_assert!(!self.in_ntt_domain);
        debug_assert_eq!(element % 2, 1);
        let n = self.basis.degree() as u64;
        let mut out = RnsPoly::zero(Arc::clone(&self.basis));
        for (channel, residues) in self.channels.iter().enumerate() {
            let q = self.basis.moduli()[channel];
            for (i, &r) in residues.iter().enumerate() {
                let raw = (i as u64 * element) % (2 * n);
                let (target, negate) = if raw >= n {
                    ((raw - n) as usize, true)
                } else {
                    (raw as usize, false)
                };
                out.channels[channel][target] = if negate && r != 0 { q - r } else { r };
            }
        }
        out
    }

    /// CRT-reconstructs every coefficient into `(-Q/2, Q/2]`.
    ///
    /// # Panics
    /// Debug-panics when called in NTT domain.
    pub fn to_centered_bigints(&self) -> Vec<BigInt> {
        debug_assert!(!self.in_ntt_domain);
        let mut residues = vec![0u64; self.basis.channel_count()];
        (0..self.basis.degree())
            .map(|i| {
                for (channel, r) in residues.iter_mut().enumerate() {
                    *r = self.channels[channel][i];
                }
                self.basis.reconstruct_centered(&residues)
            })
            .collect()
    }

    pub fn add_assign_poly(&mut self, rhs: &RnsPoly) {
        debug_assert_eq!(self.in_ntt_domain, rhs.in_ntt_domain);
        debug_assert!(Arc::ptr_eq(&self.basis, &rhs.basis) || self.basis == rhs.basis);
        for (channel, (a, b)) in self.channels.iter_mut().zip(&rhs.channels).enumerate() {
            let q = self.basis.moduli()[channel];
            for (x, &y) in a.iter_mut().zip(b) {
                *x = add_mod(*x, y, q);
            }
        }
    }

    pub fn sub_assign_poly(&mut self, rhs: &RnsPoly) {
        debug_assert_eq!(self.in_ntt_domain, rhs.in_ntt_domain);
        debug_assert!(Arc::ptr_eq(&self.basis, &rhs.basis) || self.basis == rhs.basis);
        for (channel, (a, b)) in self.channels.iter_mut().zip(&rhs.channels).enumerate() {
            let q = self.basis.moduli()[channel];
            for (x, &y) in a.iter_mut().zip(b) {
                *x = sub_mod(*x, y, q);
            }
        }
    }
}

impl std::ops::AddAssign<&RnsPoly> for RnsPoly {
    fn add_assign(&mut self, rhs: &RnsPoly) {
        self.add_assign_poly(rhs);
    }
}

impl std::ops::SubAssign<&RnsPoly> for RnsPoly {
    fn sub_assign(&mut self, rhs: &RnsPoly) {
        self.sub_assign_poly(rhs);
    }
}

impl Neg for RnsPoly {
    type Output = RnsPoly;

    fn neg(mut self) -> RnsPoly {
        for (channel, residues) in self.channels.iter_mut().enumerate() {
            let q = self.basis.moduli()[channel];
            for r in residues.iter_mut() {
                if *r != 0 {
                    *r = q - *r;
                }
            }
        }
        self
    }
}

/// Schoolbook negacyclic product over arbitrary-precision coefficients.
///
/// Used where the exact integer product must be known before reduction, as in
/// BFV tensoring.
pub fn negacyclic_bigint_mul(a: &[BigInt], b: &[BigInt]) -> Vec<BigInt> {
    let n = a.len();
    debug_assert_eq!(b.len(), n);
    let mut out = vec![BigInt::zero(); n];
    for (i, ai) in a.iter().enumerate() {
        if ai.is_zero() {
            continue;
        }
        for (j, bj) in b.iter().enumerate() {
            if bj.is_zero() {
                continue;
            }
            let prod = ai * bj;
            let k = i + j;
            if k < n {
                out[k] += prod;
            } else {
                out[k - n] -= prod;
            }
        }
    }
    out
}

/// `round(numerator * value / denominator)` with ties away from zero.
pub fn scale_and_round(value: &BigInt, numerator: &BigInt, denominator: &BigInt) -> BigInt {
    debug_assert!(denominator.is_positive());
    let scaled = value * numerator;
    let twice = &scaled * 2 + if scaled.is_negative() {
        -denominator.clone()
    } else {
        denominator.clone()
    };
    twice / (denominator * 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_basis() -> Arc<RnsBasis> {
        Arc::new(RnsBasis::new(8, vec![97, 113]).unwrap())
    }

    #[test]
    fn rejects_duplicate_moduli() {
        assert!(matches!(
            RnsBasis::new(8, vec![97, 97]),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn reconstruct_roundtrips_signed_values() {
        let basis = small_basis();
        for value in [-5000i64, -1, 0, 1, 42, 5480] {
            let big = BigInt::from(value);
            let residues = basis.residues_of(&big);
            assert_eq!(basis.reconstruct_centered(&residues), big);
        }
    }

    #[test]
    fn drop_last_shrinks_the_chain() {
        let basis = small_basis();
        let next = basis.drop_last().unwrap();
        assert_eq!(next.moduli(), &[97]);
        assert!(next.drop_last().is_err());
    }

    #[test]
    fn from_channels_validates_reduction() {
        let basis = small_basis();
        let bad = vec![vec![97u64; 8], vec![0u64; 8]];
        assert!(RnsPoly::from_channels(Arc::clone(&basis), bad, false).is_err());
        let short = vec![vec![0u64; 8]];
        assert!(RnsPoly::from_channels(Arc::clone(&basis), short, false).is_err());
    }

    #[test]
    fn ntt_mul_matches_bigint_convolution() {
        let basis = small_basis();
        let a_coeffs: Vec<i64> = vec![3, -1, 4, 1, -5, 9, 2, -6];
        let b_coeffs: Vec<i64> = vec![-2, 7, 1, 0, 3, -1, 0, 5];
        let a = RnsPoly::from_signed_coeffs(Arc::clone(&basis), &a_coeffs);
        let b = RnsPoly::from_signed_coeffs(Arc::clone(&basis), &b_coeffs);

        let product = a.ntt_mul(&b);

        let a_big: Vec<BigInt> = a_coeffs.iter().map(|&c| BigInt::from(c)).collect();
        let b_big: Vec<BigInt> = b_coeffs.iter().map(|&c| BigInt::from(c)).collect();
        let expected = negacyclic_bigint_mul(&a_big, &b_big);
        assert_eq!(product.to_centered_bigints(), expected);
    }

    #[test]
    fn add_and_neg_behave_like_ring_ops() {
        let basis = small_basis();
        let coeffs: Vec<i64> = vec![1, -2, 3, -4, 5, -6, 7, -8];
        let a = RnsPoly::from_signed_coeffs(Arc::clone(&basis), &coeffs);
        let mut sum = a.clone();
        sum += &a;
        sum += &(-a);
        let expected: Vec<BigInt> = coeffs.iter().map(|&c| BigInt::from(c)).collect();
        assert_eq!(sum.to_centered_bigints(), expected);
    }

    #[test]
    fn automorphism_maps_monomials_with_sign() {
        let basis = small_basis();
        // x under x -> x^3 becomes x^3; x^3 becomes x^9 = -x.
        let x = RnsPoly::from_signed_coeffs(Arc::clone(&basis), &[0, 1, 0, 0, 0, 0, 0, 0]);
        let mapped = x.automorphism(3);
        assert_eq!(
            mapped.to_centered_bigints(),
            [0, 0, 0, 1, 0, 0, 0, 0].map(BigInt::from)
        );
        let cube = RnsPoly::from_signed_coeffs(Arc::clone(&basis), &[0, 0, 0, 1, 0, 0, 0, 0]);
        let mapped = cube.automorphism(3);
        assert_eq!(
            mapped.to_centered_bigints(),
            [0, -1, 0, 0, 0, 0, 0, 0].map(BigInt::from)
        );
    }

    #[test]
    fn scale_and_round_rounds_to_nearest() {
        let half_up = scale_and_round(&BigInt::from(3), &BigInt::from(1), &BigInt::from(2));
        assert_eq!(half_up, BigInt::from(2));
        let negative = scale_and_round(&BigInt::from(-3), &BigInt::from(1), &BigInt::from(2));
        assert_eq!(negative, BigInt::from(-2));
        let exact = scale_and_round(&BigInt::from(10), &BigInt::from(3), &BigInt::from(5));
        assert_eq!(exact, BigInt::from(6));
    }
}
