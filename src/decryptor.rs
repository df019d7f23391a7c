//! Decryption and noise budget measurement.

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive};

use crate::ciphertext::Ciphertext;
use crate::context::{Context, ContextData};
use crate::error::{Error, Result};
use crate::keys::SecretKey;
use crate::parameters::Scheme;
use crate::plaintext::Plaintext;
use crate::rns::RnsPoly;

pub struct Decryptor {
    context: Context,
    secret_key: SecretKey,
}

impl Decryptor {
    pub fn new(context: &Context, secret_key: SecretKey) -> Result<Self> {
        if secret_key.parms_id() != context.key_parms_id() {
            return Err(Error::incompatible(
                "secret key belongs to a different parameter set",
            ));
        }
        Ok(Self {
            context: context.clone(),
            secret_key,
        })
    }

    /// Decrypts a ciphertext of any size.
    ///
    /// BFV decryption fails with [`Error::NoiseBudgetExhausted`] once the
    /// noise has consumed the whole budget; the result would be garbage.
    pub fn decrypt(&self, ciphertext: &Ciphertext) -> Result<Plaintext> {
        let data = self.level_of(ciphertext)?;
        let dot = self.dot_with_secret_powers(ciphertext, &data);
        match ciphertext.scheme() {
            Scheme::Ckks => Ok(Plaintext::new_ckks(
                dot,
                ciphertext.parms_id(),
                ciphertext.scale(),
            )),
            Scheme::Bfv => {
                let t = data
                    .parms()
                    .plain_modulus()
                    .map(|m| m.value())
                    .ok_or(Error::MissingParameter {
                        field: "plain_modulus",
                    })?;
                let q = BigInt::from(data.total_coeff_modulus().clone());
                let coeffs = dot.to_centered_bigints();

                if noise_budget_bits(&coeffs, t, &q) == 0 {
                    return Err(Error::NoiseBudgetExhausted);
                }

                let t_big = BigInt::from(t);
                let message = coeffs
                    .iter()
                    .map(|x| {
                        crate::rns::scale_and_round(x, &t_big, &q)
                            .mod_floor(&t_big)
                            .to_u64()
                            .unwrap_or_default()
                    })
                    .collect();
                Ok(Plaintext::new_bfv(message, t))
            }
        }
    }

    /// Remaining invariant noise budget in bits; zero means undecryptable.
    ///
    /// Defined for BFV only.
    pub fn invariant_noise_budget(&self, ciphertext: &Ciphertext) -> Result<u32> {
        if ciphertext.scheme() != Scheme::Bfv {
            return Err(Error::invalid(
                "the invariant noise budget is a BFV quantity",
            ));
        }
        let data = self.level_of(ciphertext)?;
        let t = data
            .parms()
            .plain_modulus()
            .map(|m| m.value())
            .ok_or(Error::MissingParameter {
                field: "plain_modulus",
            })?;
        let q = BigInt::from(data.total_coeff_modulus().clone());
        let coeffs = self
            .dot_with_secret_powers(ciphertext, &data)
            .to_centered_bigints();
        Ok(noise_budget_bits(&coeffs, t, &q))
    }

    fn level_of(&self, ciphertext: &Ciphertext) -> Result<std::sync::Arc<ContextData>> {
        self.context
            .context_data(&ciphertext.parms_id())
            .cloned()
            .ok_or_else(|| {
                Error::incompatible("ciphertext level is not part of this context")
            })
    }

    /// `c_0 + c_1 s + c_2 s^2 + ...` at the ciphertext's level.
    fn dot_with_secret_powers(&self, ciphertext: &Ciphertext, data: &ContextData) -> RnsPoly {
        let s = self.secret_key.poly().restricted_to(data.basis());
        let polys = ciphertext.polys();
        let mut acc = polys[polys.len() - 1].clone();
        for c in polys.iter().rev().skip(1) {
            acc = acc.ntt_mul(&s);
            acc += c;
        }
        acc
    }
}

/// Bits of budget left: `bits(Q) - bits(max |t x mod Q centered|) - 1`.
fn noise_budget_bits(coeffs: &[BigInt], t: u64, q: &BigInt) -> u32 {
    let half = q / 2;
    let t_big = BigInt::from(t);
    let max_noise = coeffs
        .iter()
        .map(|x| {
            let mut w = (x * &t_big).mod_floor(q);
            if w > half {
                w -= q;
            }
            w.abs()
        })
        .max()
        .unwrap_or_default();
    let q_bits = q.to_biguint().map(|b| b.bits()).unwrap_or_default();
    let noise_bits = max_noise.to_biguint().map(|b| b.bits()).unwrap_or_default();
    q_bits.saturating_sub(noise_bits + 1).min(u32::MAX as u64) as u32
}
