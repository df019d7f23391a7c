//! Key switching keys, with relinearization and Galois keys on top.
//!
//! A switching key re-expresses `c * s'` as a pair decryptable under `s`. The
//! RNS decomposition uses one projector per prime channel; within a channel,
//! coefficients are further split into base `2^16` digits so that the noise
//! added per multiply-accumulate stays near `2^16 * e` instead of `q * e`.

use std::sync::Arc;

use rand::Rng;

use crate::context::ParmsId;
use crate::math::ntt::pow_mod;
use crate::memory::MemoryPool;
use crate::math::sampling;
use crate::rns::{RnsBasis, RnsPoly};

/// Digit width of the in-channel decomposition.
pub(crate) const DECOMPOSITION_LOG2: u32 = 16;

/// A key switching `s' -> s` over one RNS basis.
///
/// Entry `(j, k)` encrypts `2^{16k} * P_j * s'` where `P_j` is the CRT
/// projector of channel `j`. Polynomials are stored in NTT domain.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySwitchKey {
    keys: Vec<Vec<(RnsPoly, RnsPoly)>>,
    parms_id: ParmsId,
}

impl KeySwitchKey {
    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    pub(crate) fn from_parts(keys: Vec<Vec<(RnsPoly, RnsPoly)>>, parms_id: ParmsId) -> Self {
        Self { keys, parms_id }
    }

    pub(crate) fn pairs(&self) -> &[Vec<(RnsPoly, RnsPoly)>] {
        &self.keys
    }

    /// Generates the key material for switching `switch_from` to `secret`.
    ///
    /// Both key polynomials are given in coefficient domain over `basis`.
    pub(crate) fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        basis: &Arc<RnsBasis>,
        secret: &RnsPoly,
        switch_from: &RnsPoly,
        parms_id: ParmsId,
        error_standard_deviation: f64,
    ) -> Self {
        let degree = basis.degree();
        let mut keys = Vec::with_capacity(basis.channel_count());
        for (channel, &q) in basis.moduli().iter().enumerate() {
            let digit_count = digit_count_for(q);
            let mut digit_keys = Vec::with_capacity(digit_count);
            for digit in 0..digit_count {
                let a_channels = basis
                    .moduli()
                    .iter()
                    .map(|&m| sampling::uniform_residues(rng, degree, m))
                    .collect();
                let a = RnsPoly::from_channels_unchecked(Arc::clone(basis), a_channels, false);
                let e = RnsPoly::from_signed_coeffs(
                    Arc::clone(basis),
                    &sampling::gaussian_coeffs(rng, degree, error_standard_deviation),
                );

                // The payload lives in channel `channel` only; the CRT
                // projector is zero in every other channel.
                let shift = pow_mod(2, (digit as u32 * DECOMPOSITION_LOG2) as u64, q);
                let mut payload_channels = vec![vec![0u64; degree]; basis.channel_count()];
                payload_channels[channel] = switch_from
                    .channel(channel)
                    .iter()
                    .map(|&r| crate::math::ntt::mul_mod(r, shift, q))
                    .collect();
                let payload =
                    RnsPoly::from_channels_unchecked(Arc::clone(basis), payload_channels, false);

                let mut b = -a.ntt_mul(secret);
                b -= &e;
                b += &payload;

                let mut b_ntt = b;
                b_ntt.to_ntt_domain();
                let mut a_ntt = a;
                a_ntt.to_ntt_domain();
                digit_keys.push((b_ntt, a_ntt));
            }
            keys.push(digit_keys);
        }
        Self { keys, parms_id }
    }

    /// Computes `(d0, d1)` with `d0 + d1 * s ~ target * s'`.
    ///
    /// `target` must be in coefficient domain over the basis this key was
    /// generated for.
    pub(crate) fn apply(&self, target: &RnsPoly, pool: &MemoryPool) -> (RnsPoly, RnsPoly) {
        debug_assert!(!target.in_ntt_domain());
        let basis = target.basis();
        debug_assert_eq!(self.keys.len(), basis.channel_count());

        let mut acc0 = RnsPoly::zero_ntt(Arc::clone(basis));
        let mut acc1 = RnsPoly::zero_ntt(Arc::clone(basis));
        let mask = (1u64 << DECOMPOSITION_LOG2) - 1;
        let mut digits = pool.acquire(basis.degree());

        for (channel, digit_keys) in self.keys.iter().enumerate() {
            let residues = target.channel(channel);
            for (digit, (b, a)) in digit_keys.iter().enumerate() {
                let shift = digit as u32 * DECOMPOSITION_LOG2;
                for (slot, &r) in digits.iter_mut().zip(residues) {
                    *slot = (r >> shift) & mask;
                }
                let channels = basis
                    .moduli()
                    .iter()
                    .map(|&m| digits.iter().map(|&d| d % m).collect())
                    .collect();
                let mut digit_poly =
                    RnsPoly::from_channels_unchecked(Arc::clone(basis), channels, false);
                digit_poly.to_ntt_domain();

                let mut term = digit_poly.clone();
                term.pointwise_mul_assign(b);
                acc0 += &term;
                digit_poly.pointwise_mul_assign(a);
                acc1 += &digit_poly;
            }
        }

        acc0.to_coeff_domain();
        acc1.to_coeff_domain();
        (acc0, acc1)
    }
}

pub(crate) fn digit_count_for(modulus: u64) -> usize {
    let bits = 64 - modulus.leading_zeros();
    bits.div_ceil(DECOMPOSITION_LOG2) as usize
}

// ─── RelinearizationKey ──────────────────────────────────────────────────────

/// Switches the `s^2` component of a size-3 ciphertext back onto `s`.
///
/// One switching key is held per chain level so relinearization works after
/// modulus switching or rescaling.
#[derive(Debug, Clone, PartialEq)]
pub struct RelinearizationKey {
    levels: Vec<KeySwitchKey>,
}

impl RelinearizationKey {
    pub(crate) fn new(levels: Vec<KeySwitchKey>) -> Self {
        Self { levels }
    }

    pub(crate) fn key_for(&self, parms_id: &ParmsId) -> Option<&KeySwitchKey> {
        self.levels.iter().find(|key| key.parms_id() == *parms_id)
    }

    pub(crate) fn levels(&self) -> &[KeySwitchKey] {
        &self.levels
    }
}

// ─── GaloisKey ───────────────────────────────────────────────────────────────

/// Switching keys for a set of Galois automorphisms `x -> x^g`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaloisKey {
    keys: Vec<(u64, Vec<KeySwitchKey>)>,
}

impl GaloisKey {
    pub(crate) fn new(keys: Vec<(u64, Vec<KeySwitchKey>)>) -> Self {
        Self { keys }
    }

    /// The automorphism elements this key covers.
    pub fn elements(&self) -> Vec<u64> {
        self.keys.iter().map(|(element, _)| *element).collect()
    }

    pub(crate) fn keys(&self) -> &[(u64, Vec<KeySwitchKey>)] {
        &self.keys
    }

    pub(crate) fn key_for(&self, element: u64, parms_id: &ParmsId) -> Option<&KeySwitchKey> {
        self.keys
            .iter()
            .find(|(e, _)| *e == element)
            .and_then(|(_, levels)| levels.iter().find(|key| key.parms_id() == *parms_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_counts_track_modulus_width() {
        assert_eq!(digit_count_for(12289), 1);
        assert_eq!(digit_count_for(1038337), 2);
        assert_eq!(digit_count_for(1125899906826241), 4);
    }
}
