//! Encryption under a public or a secret key.

use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use rand::Rng;

use crate::ciphertext::Ciphertext;
use crate::context::{Context, ContextData};
use crate::error::{Error, Result};
use crate::keys::{PublicKey, SecretKey};
use crate::math::sampling::{self, NOISE_STANDARD_DEVIATION};
use crate::parameters::Scheme;
use crate::plaintext::{PlainRepr, Plaintext};
use crate::rns::RnsPoly;

enum EncryptionKey {
    Public(PublicKey),
    Secret(SecretKey),
}

/// Encrypts plaintexts into fresh size-2 ciphertexts.
///
/// BFV plaintexts are scaled by `Q / t` and encrypted at the key level; CKKS
/// plaintexts are encrypted at the level they were encoded at.
pub struct Encryptor {
    context: Context,
    key: EncryptionKey,
}

/// The randomness consumed by one public-key encryption, exposed for
/// protocols that prove correct encryption.
pub struct EncryptionComponents {
    /// The ternary blinding polynomial.
    pub u: RnsPoly,
    /// The noise polynomials, one per ciphertext component.
    pub e: Vec<RnsPoly>,
    /// The BFV rounding remainder `round(Q m / t) - floor(Q / t) m`; absent
    /// for CKKS.
    pub r: Option<RnsPoly>,
}

impl Encryptor {
    pub fn with_public_key(context: &Context, key: PublicKey) -> Result<Self> {
        if key.parms_id() != context.key_parms_id() {
            return Err(Error::incompatible(
                "public key belongs to a different parameter set",
            ));
        }
        Ok(Self {
            context: context.clone(),
            key: EncryptionKey::Public(key),
        })
    }

    pub fn with_secret_key(context: &Context, key: SecretKey) -> Result<Self> {
        if key.parms_id() != context.key_parms_id() {
            return Err(Error::incompatible(
                "secret key belongs to a different parameter set",
            ));
        }
        Ok(Self {
            context: context.clone(),
            key: EncryptionKey::Secret(key),
        })
    }

    pub fn encrypt(&self, plaintext: &Plaintext) -> Result<Ciphertext> {
        self.encrypt_with_rng(plaintext, &mut rand::rng())
    }

    pub fn encrypt_with_rng<R: Rng + ?Sized>(
        &self,
        plaintext: &Plaintext,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        self.encrypt_inner(plaintext, rng).map(|(ct, _)| ct)
    }

    /// Encrypts and also returns the randomness used. Only available with a
    /// public key, where the components fully determine the ciphertext.
    pub fn encrypt_return_components(
        &self,
        plaintext: &Plaintext,
    ) -> Result<(Ciphertext, EncryptionComponents)> {
        self.encrypt_return_components_with_rng(plaintext, &mut rand::rng())
    }

    pub fn encrypt_return_components_with_rng<R: Rng + ?Sized>(
        &self,
        plaintext: &Plaintext,
        rng: &mut R,
    ) -> Result<(Ciphertext, EncryptionComponents)> {
        if !matches!(self.key, EncryptionKey::Public(_)) {
            return Err(Error::invalid(
                "encryption components are only defined for public-key encryption",
            ));
        }
        let (ciphertext, components) = self.encrypt_inner(plaintext, rng)?;
        components
            .ok_or_else(|| Error::invalid("encryption produced no components"))
            .map(|c| (ciphertext, c))
    }

    fn encrypt_inner<R: Rng + ?Sized>(
        &self,
        plaintext: &Plaintext,
        rng: &mut R,
    ) -> Result<(Ciphertext, Option<EncryptionComponents>)> {
        let scheme = self.context.encryption_parameters().scheme();
        let (data, message, scale) = match (scheme, plaintext.repr()) {
            (Scheme::Bfv, PlainRepr::Bfv {
                coeffs,
                plain_modulus,
            }) => {
                let data = self.context.key_context_data();
                let message = scale_bfv_message(data, coeffs, *plain_modulus)?;
                (Arc::clone(data), message, 1.0)
            }
            (Scheme::Ckks, PlainRepr::Ckks {
                poly,
                parms_id,
                scale,
            }) => {
                let data = self.context.context_data(parms_id).ok_or_else(|| {
                    Error::incompatible("plaintext level is not part of this context")
                })?;
                (Arc::clone(data), poly.clone(), *scale)
            }
            _ => {
                return Err(Error::incompatible(
                    "plaintext encoding does not match the context scheme",
                ));
            }
        };

        let basis = data.basis();
        let degree = basis.degree();
        match &self.key {
            EncryptionKey::Public(public) => {
                let u = RnsPoly::from_signed_coeffs(
                    Arc::clone(basis),
                    &sampling::ternary_coeffs(rng, degree),
                );
                let e0 = RnsPoly::from_signed_coeffs(
                    Arc::clone(basis),
                    &sampling::gaussian_coeffs(rng, degree, NOISE_STANDARD_DEVIATION),
                );
                let e1 = RnsPoly::from_signed_coeffs(
                    Arc::clone(basis),
                    &sampling::gaussian_coeffs(rng, degree, NOISE_STANDARD_DEVIATION),
                );

                let pk_b = public.b().restricted_to(basis);
                let pk_a = public.a().restricted_to(basis);
                let mut c0 = pk_b.ntt_mul(&u);
                c0 += &e0;
                c0 += &message;
                let mut c1 = pk_a.ntt_mul(&u);
                c1 += &e1;

                let remainder = match plaintext.repr() {
                    PlainRepr::Bfv {
                        coeffs,
                        plain_modulus,
                    } => Some(rounding_remainder(&data, coeffs, *plain_modulus)?),
                    PlainRepr::Ckks { .. } => None,
                };
                let ciphertext =
                    Ciphertext::new(vec![c0, c1], data.parms_id(), scale, scheme);
                let components = EncryptionComponents {
                    u,
                    e: vec![e0, e1],
                    r: remainder,
                };
                Ok((ciphertext, Some(components)))
            }
            EncryptionKey::Secret(secret) => {
                let a_channels = basis
                    .moduli()
                    .iter()
                    .map(|&q| sampling::uniform_residues(rng, degree, q))
                    .collect();
                let a = RnsPoly::from_channels_unchecked(Arc::clone(basis), a_channels, false);
                let e = RnsPoly::from_signed_coeffs(
                    Arc::clone(basis),
                    &sampling::gaussian_coeffs(rng, degree, NOISE_STANDARD_DEVIATION),
                );
                let s = secret.poly().restricted_to(basis);
                let mut c0 = -a.ntt_mul(&s);
                c0 -= &e;
                c0 += &message;
                let ciphertext =
                    Ciphertext::new(vec![c0, a], data.parms_id(), scale, scheme);
                Ok((ciphertext, None))
            }
        }
    }
}

/// Lifts BFV coefficients to `round(Q m / t)` in the RNS basis.
///
/// Computed as `floor(Q / t) * m + round((Q mod t) * m / t)` so no
/// per-coefficient big-integer work is needed.
pub(crate) fn scale_bfv_message(
    data: &ContextData,
    coeffs: &[u64],
    plain_modulus: u64,
) -> Result<RnsPoly> {
    let t = plaintext_modulus_checked(data, plain_modulus)?;
    let delta = data
        .coeff_div_plain_modulus()
        .ok_or_else(|| Error::incompatible("context level carries no BFV scaling data"))?;
    let q_mod_t = q_mod_t(data, t);

    let basis = data.basis();
    let channels = basis
        .moduli()
        .iter()
        .zip(delta)
        .map(|(&q, &delta_q)| {
            coeffs
                .iter()
                .map(|&m| {
                    let fix = ((q_mod_t as u128 * m as u128 + t as u128 / 2) / t as u128) as u64;
                    crate::math::ntt::add_mod(
                        crate::math::ntt::mul_mod(delta_q, m % q, q),
                        fix % q,
                        q,
                    )
                })
                .collect()
        })
        .collect();
    Ok(RnsPoly::from_channels_unchecked(
        Arc::clone(basis),
        channels,
        false,
    ))
}

/// The remainder `round(Q m / t) - floor(Q / t) m`, lifted into the basis.
fn rounding_remainder(data: &ContextData, coeffs: &[u64], plain_modulus: u64) -> Result<RnsPoly> {
    let t = plaintext_modulus_checked(data, plain_modulus)?;
    let q_mod_t = q_mod_t(data, t);
    let remainders: Vec<i64> = coeffs
        .iter()
        .map(|&m| ((q_mod_t as u128 * m as u128 + t as u128 / 2) / t as u128) as i64)
        .collect();
    Ok(RnsPoly::from_signed_coeffs(
        Arc::clone(data.basis()),
        &remainders,
    ))
}

fn plaintext_modulus_checked(data: &ContextData, plain_modulus: u64) -> Result<u64> {
    let expected = data
        .parms()
        .plain_modulus()
        .map(|m| m.value())
        .unwrap_or_default();
    if plain_modulus != expected {
        return Err(Error::incompatible(
            "plaintext was encoded for a different plain modulus",
        ));
    }
    Ok(plain_modulus)
}

fn q_mod_t(data: &ContextData, t: u64) -> u64 {
    (data.total_coeff_modulus() % BigUint::from(t))
        .to_u64()
        .unwrap_or_default()
}
