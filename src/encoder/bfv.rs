//! Slot batching encoder for BFV.
//!
//! With a plain modulus `t = 1 (mod 2n)` the plaintext ring `Z_t[x]/(x^n + 1)`
//! splits into `n` slots via the NTT over `t`. Encoding places one integer per
//! slot and inverts the transform; slot-wise addition and multiplication of
//! plaintexts then match the ring operations on the underlying polynomials.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::math::NttTable;
use crate::parameters::Scheme;
use crate::plaintext::Plaintext;

pub struct BfvEncoder {
    plain_ntt: NttTable,
}

impl BfvEncoder {
    /// Fails unless the context is BFV with a batching-capable plain modulus.
    pub fn new(context: &Context) -> Result<Self> {
        if context.encryption_parameters().scheme() != Scheme::Bfv {
            return Err(Error::invalid("batch encoding requires a BFV context"));
        }
        let plain_ntt = context
            .key_context_data()
            .plain_ntt()
            .ok_or_else(|| {
                Error::invalid(
                    "plain modulus does not support batching; use PlainModulus::batching",
                )
            })?
            .clone();
        Ok(Self { plain_ntt })
    }

    /// Number of available slots, equal to the polynomial modulus degree.
    pub fn slot_count(&self) -> usize {
        self.plain_ntt.degree()
    }

    fn plain_modulus(&self) -> u64 {
        self.plain_ntt.modulus()
    }

    /// Encodes signed integers, one per slot. Unfilled slots are zero.
    pub fn encode_int(&self, values: &[i64]) -> Result<Plaintext> {
        let t = self.plain_modulus();
        let half = (t - 1) / 2;
        let residues = values
            .iter()
            .map(|&v| {
                if v.unsigned_abs() > half {
                    Err(Error::EncodeOverflow {
                        reason: format!(
                            "value {v} falls outside [-{half}, {half}] for plain modulus {t}"
                        ),
                    })
                } else {
                    Ok(v.rem_euclid(t as i64) as u64)
                }
            })
            .collect::<Result<Vec<u64>>>()?;
        self.encode_slots(residues)
    }

    /// Encodes unsigned integers, one per slot. Unfilled slots are zero.
    pub fn encode_uint(&self, values: &[u64]) -> Result<Plaintext> {
        let t = self.plain_modulus();
        if let Some(&v) = values.iter().find(|&&v| v >= t) {
            return Err(Error::EncodeOverflow {
                reason: format!("value {v} is not below plain modulus {t}"),
            });
        }
        self.encode_slots(values.to_vec())
    }

    fn encode_slots(&self, mut slots: Vec<u64>) -> Result<Plaintext> {
        if slots.len() > self.slot_count() {
            return Err(Error::EncodeOverflow {
                reason: format!(
                    "{} values exceed the {} available slots",
                    slots.len(),
                    self.slot_count()
                ),
            });
        }
        slots.resize(self.slot_count(), 0);
        self.plain_ntt.inverse(&mut slots);
        Ok(Plaintext::new_bfv(slots, self.plain_modulus()))
    }

    /// Decodes to signed slot values in `[-(t-1)/2, (t-1)/2]`.
    pub fn decode_int(&self, plaintext: &Plaintext) -> Result<Vec<i64>> {
        let t = self.plain_modulus();
        let half = (t - 1) / 2;
        Ok(self
            .decode_uint(plaintext)?
            .into_iter()
            .map(|r| if r > half { r as i64 - t as i64 } else { r as i64 })
            .collect())
    }

    /// Decodes to unsigned slot values in `[0, t)`.
    pub fn decode_uint(&self, plaintext: &Plaintext) -> Result<Vec<u64>> {
        let (coeffs, plain_modulus) = plaintext.as_bfv().ok_or_else(|| {
            Error::invalid("plaintext was not produced by a BFV encoder")
        })?;
        if plain_modulus != self.plain_modulus() || coeffs.len() != self.slot_count() {
            return Err(Error::invalid(
                "plaintext belongs to a different parameter set",
            ));
        }
        let mut slots = coeffs.to_vec();
        self.plain_ntt.forward(&mut slots);
        Ok(slots)
    }
}
