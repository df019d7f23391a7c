//! Key generation.

use std::sync::Arc;

use rand::Rng;

use crate::context::{Context, ParmsId};
use crate::error::{Error, Result};
use crate::keys::switch_key::KeySwitchKey;
use crate::keys::{GaloisKey, PublicKey, RelinearizationKey, SecretKey};
use crate::math::sampling::{self, NOISE_STANDARD_DEVIATION};
use crate::rns::{RnsBasis, RnsPoly};

/// Tunable sampling parameters for key generation.
///
/// The defaults match the scheme-standard choices: a uniform ternary secret
/// and Gaussian noise with standard deviation 3.2. A fixed Hamming weight
/// (HEAAN style) can be requested instead of the uniform secret.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyGenParams {
    pub hamming_weight: Option<usize>,
    pub error_standard_deviation: f64,
}

impl Default for KeyGenParams {
    fn default() -> Self {
        Self {
            hamming_weight: None,
            error_standard_deviation: NOISE_STANDARD_DEVIATION,
        }
    }
}

/// Generates all key material for one context.
///
/// The secret key is ternary; noise is Gaussian with the standard deviation
/// from [`KeyGenParams`]. All keys are anchored at the key level, and
/// switching keys additionally cover every lower level of the chain.
pub struct KeyGenerator {
    context: Context,
    secret_key: SecretKey,
    params: KeyGenParams,
}

impl KeyGenerator {
    /// Samples a fresh secret key from the thread RNG.
    pub fn new(context: &Context) -> Result<Self> {
        Self::new_with_rng(context, &mut rand::rng())
    }

    pub fn new_with_rng<R: Rng + ?Sized>(context: &Context, rng: &mut R) -> Result<Self> {
        Self::with_params_and_rng(context, KeyGenParams::default(), rng)
    }

    pub fn with_params(context: &Context, params: KeyGenParams) -> Result<Self> {
        Self::with_params_and_rng(context, params, &mut rand::rng())
    }

    pub fn with_params_and_rng<R: Rng + ?Sized>(
        context: &Context,
        params: KeyGenParams,
        rng: &mut R,
    ) -> Result<Self> {
        let sigma = params.error_standard_deviation;
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(Error::invalid(format!(
                "error standard deviation {sigma} must be finite and positive"
            )));
        }
        let data = context.key_context_data();
        let degree = data.basis().degree();
        let coeffs = match params.hamming_weight {
            Some(weight) => {
                if weight > degree {
                    return Err(Error::invalid(format!(
                        "hamming weight {weight} exceeds the ring degree {degree}"
                    )));
                }
                sampling::ternary_coeffs_with_weight(rng, degree, weight)
            }
            None => sampling::ternary_coeffs(rng, degree),
        };
        let s = RnsPoly::from_signed_coeffs(Arc::clone(data.basis()), &coeffs);
        Ok(Self {
            context: context.clone(),
            secret_key: SecretKey::new(s, data.parms_id()),
            params,
        })
    }

    /// Restores a generator around an existing secret key, so public and
    /// switching keys can be reissued for it.
    pub fn from_secret_key(context: &Context, secret_key: SecretKey) -> Result<Self> {
        if secret_key.parms_id() != context.key_parms_id() {
            return Err(Error::incompatible(
                "secret key belongs to a different parameter set",
            ));
        }
        Ok(Self {
            context: context.clone(),
            secret_key,
            params: KeyGenParams::default(),
        })
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn create_public_key(&self) -> PublicKey {
        self.create_public_key_with_rng(&mut rand::rng())
    }

    pub fn create_public_key_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> PublicKey {
        let data = self.context.key_context_data();
        let basis = data.basis();
        let a_channels = basis
            .moduli()
            .iter()
            .map(|&q| sampling::uniform_residues(rng, basis.degree(), q))
            .collect();
        let a = RnsPoly::from_channels_unchecked(Arc::clone(basis), a_channels, false);
        let e = RnsPoly::from_signed_coeffs(
            Arc::clone(basis),
            &sampling::gaussian_coeffs(rng, basis.degree(), self.params.error_standard_deviation),
        );
        let mut b = -a.ntt_mul(self.secret_key.poly());
        b -= &e;
        PublicKey::new(b, a, data.parms_id())
    }

    pub fn create_relinearization_key(&self) -> RelinearizationKey {
        self.create_relinearization_key_with_rng(&mut rand::rng())
    }

    /// Switching keys for `s^2 -> s`, one per chain level.
    pub fn create_relinearization_key_with_rng<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> RelinearizationKey {
        let sigma = self.params.error_standard_deviation;
        let levels = self
            .per_level(|rng, basis, parms_id, s_level| {
                let s_squared = s_level.ntt_mul(s_level);
                KeySwitchKey::generate(rng, basis, s_level, &s_squared, parms_id, sigma)
            }, rng);
        RelinearizationKey::new(levels)
    }

    pub fn create_galois_keys(&self) -> GaloisKey {
        self.create_galois_keys_with_rng(&mut rand::rng())
    }

    /// Switching keys for the power-of-two rotation automorphisms plus
    /// conjugation, each covering every chain level.
    pub fn create_galois_keys_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> GaloisKey {
        let sigma = self.params.error_standard_deviation;
        let degree = self.context.encryption_parameters().poly_modulus_degree();
        let mut keys = Vec::new();
        for element in default_galois_elements(degree) {
            let levels = self.per_level(
                |rng, basis, parms_id, s_level| {
                    let rotated = s_level.automorphism(element);
                    KeySwitchKey::generate(rng, basis, s_level, &rotated, parms_id, sigma)
                },
                rng,
            );
            keys.push((element, levels));
        }
        GaloisKey::new(keys)
    }

    /// Runs `build` once per chain level with the secret key restricted to
    /// that level's basis.
    fn per_level<R, F>(&self, mut build: F, rng: &mut R) -> Vec<KeySwitchKey>
    where
        R: Rng + ?Sized,
        F: FnMut(&mut R, &Arc<RnsBasis>, ParmsId, &RnsPoly) -> KeySwitchKey,
    {
        let mut levels = Vec::with_capacity(self.context.chain_length());
        let mut cursor = Some(self.context.key_parms_id());
        while let Some(parms_id) = cursor {
            let Some(data) = self.context.context_data(&parms_id).map(Arc::clone) else {
                break;
            };
            let basis = data.basis();
            let s_level = self.secret_key.poly().restricted_to(basis);
            levels.push(build(rng, basis, parms_id, &s_level));
            cursor = data.next_parms_id();
        }
        levels
    }
}

/// The automorphism elements backing power-of-two slot rotations and complex
/// conjugation: `3^step mod 2n` for each power-of-two step, and `2n - 1`.
fn default_galois_elements(degree: u64) -> Vec<u64> {
    let order = 2 * degree;
    let slot_count = degree / 2;
    let mut elements = Vec::new();
    let mut step = 1;
    while step <= slot_count / 2 {
        elements.push(crate::math::ntt::pow_mod(3, step, order));
        step *= 2;
    }
    elements.push(order - 1);
    elements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulus::{CoefficientModulus, Modulus, SecurityLevel};
    use crate::parameters::BfvEncryptionParametersBuilder;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn context() -> Context {
        let parms = BfvEncryptionParametersBuilder::new()
            .set_poly_modulus_degree(1024)
            .set_coefficient_modulus(CoefficientModulus::create(1024, &[27]).unwrap())
            .set_plain_modulus(Modulus::new(1234).unwrap())
            .build()
            .unwrap();
        Context::new(&parms, true, SecurityLevel::None).unwrap()
    }

    #[test]
    fn fresh_generators_have_distinct_secrets() {
        let context = context();
        let a = KeyGenerator::new(&context).unwrap();
        let b = KeyGenerator::new(&context).unwrap();
        assert_ne!(a.secret_key(), b.secret_key());
    }

    #[test]
    fn seeded_generation_is_deterministic() {
        let context = context();
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let a = KeyGenerator::new_with_rng(&context, &mut rng).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let b = KeyGenerator::new_with_rng(&context, &mut rng).unwrap();
        assert_eq!(a.secret_key(), b.secret_key());
    }

    #[test]
    fn from_secret_key_round_trips() {
        let context = context();
        let generator = KeyGenerator::new(&context).unwrap();
        let restored =
            KeyGenerator::from_secret_key(&context, generator.secret_key().clone()).unwrap();
        assert_eq!(generator.secret_key(), restored.secret_key());
    }

    #[test]
    fn from_secret_key_rejects_foreign_contexts() {
        let context = context();
        let generator = KeyGenerator::new(&context).unwrap();

        let other_parms = BfvEncryptionParametersBuilder::new()
            .set_poly_modulus_degree(1024)
            .set_coefficient_modulus(CoefficientModulus::create(1024, &[27]).unwrap())
            .set_plain_modulus(Modulus::new(4321).unwrap())
            .build()
            .unwrap();
        let other = Context::new(&other_parms, true, SecurityLevel::None).unwrap();
        assert!(matches!(
            KeyGenerator::from_secret_key(&other, generator.secret_key().clone()),
            Err(Error::IncompatibleCiphertext { .. })
        ));
    }

    #[test]
    fn weighted_secrets_have_exact_support() {
        let context = context();
        let params = KeyGenParams {
            hamming_weight: Some(64),
            ..KeyGenParams::default()
        };
        let generator = KeyGenerator::with_params(&context, params).unwrap();
        let data = context.key_context_data();
        let q = data.basis().moduli()[0];
        let nonzero = generator
            .secret_key()
            .poly()
            .channel(0)
            .iter()
            .filter(|&&r| r != 0)
            .count();
        assert_eq!(nonzero, 64);
        assert!(generator
            .secret_key()
            .poly()
            .channel(0)
            .iter()
            .all(|&r| r == 0 || r == 1 || r == q - 1));
    }

    #[test]
    fn bad_generation_params_are_rejected() {
        let context = context();
        let overweight = KeyGenParams {
            hamming_weight: Some(2048),
            ..KeyGenParams::default()
        };
        assert!(matches!(
            KeyGenerator::with_params(&context, overweight),
            Err(Error::InvalidParameter { .. })
        ));
        let negative_sigma = KeyGenParams {
            hamming_weight: None,
            error_standard_deviation: -1.0,
        };
        assert!(matches!(
            KeyGenerator::with_params(&context, negative_sigma),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn galois_elements_cover_rotations_and_conjugation() {
        let context = context();
        let generator = KeyGenerator::new(&context).unwrap();
        let keys = generator.create_galois_keys();
        let elements = keys.elements();
        // Steps 1, 2, ..., 256 plus conjugation at 2n - 1.
        assert_eq!(elements.len(), 10);
        assert_eq!(elements[0], 3);
        assert_eq!(*elements.last().unwrap(), 2047);
        assert!(elements.iter().all(|&e| e % 2 == 1 && e < 2048));
    }
}
