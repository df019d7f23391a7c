//! Approximate evaluation for CKKS ciphertexts.

use std::sync::Arc;

use crate::ciphertext::Ciphertext;
use crate::context::{Context, ContextData};
use crate::error::{Error, Result};
use crate::keys::{GaloisKey, RelinearizationKey};
use crate::math::ntt::{add_mod, mod_inverse, mul_mod, sub_mod};
use crate::parameters::Scheme;
use crate::plaintext::Plaintext;
use crate::rns::RnsPoly;

/// Evaluates circuits over CKKS ciphertexts.
///
/// Multiplication multiplies the scales; [`Self::rescale_to_next`] divides the
/// scale by the dropped prime and steps the ciphertext one level down the
/// chain, keeping the scale near its original magnitude.
pub struct CkksEvaluator {
    context: Context,
}

impl CkksEvaluator {
    pub fn new(context: &Context) -> Result<Self> {
        if context.encryption_parameters().scheme() != Scheme::Ckks {
            return Err(Error::invalid("this evaluator requires a CKKS context"));
        }
        Ok(Self {
            context: context.clone(),
        })
    }

    pub fn negate(&self, ciphertext: &Ciphertext) -> Result<Ciphertext> {
        self.level_of(ciphertext)?;
        Ok(super::negate(ciphertext))
    }

    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.level_of(a)?;
        super::add(a, b)
    }

    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.level_of(a)?;
        super::sub(a, b)
    }

    pub fn add_many(&self, ciphertexts: &[Ciphertext]) -> Result<Ciphertext> {
        super::add_many(ciphertexts)
    }

    /// Multiplies without relinearizing. The result scale is the product of
    /// the operand scales.
    pub fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.level_of(a)?;
        if a.parms_id() != b.parms_id() {
            return Err(Error::incompatible(
                "ciphertexts live at different chain levels",
            ));
        }
        let polys = super::ntt_tensor(a.polys(), b.polys());
        Ok(Ciphertext::new(
            polys,
            a.parms_id(),
            a.scale() * b.scale(),
            Scheme::Ckks,
        ))
    }

    pub fn relinearize(
        &self,
        ciphertext: &Ciphertext,
        key: &RelinearizationKey,
    ) -> Result<Ciphertext> {
        self.level_of(ciphertext)?;
        super::relinearize(ciphertext, key, self.context.pool())
    }

    /// Applies the automorphism `x -> x^element` to the encrypted plaintext,
    /// then switches the result back onto the secret key.
    ///
    /// Only size-2 ciphertexts can be switched; relinearize first.
    pub fn apply_galois(
        &self,
        ciphertext: &Ciphertext,
        element: u64,
        key: &GaloisKey,
    ) -> Result<Ciphertext> {
        self.level_of(ciphertext)?;
        if ciphertext.size() != 2 {
            return Err(Error::invalid(format!(
                "a Galois automorphism expects a size-2 ciphertext, got size {}",
                ciphertext.size()
            )));
        }
        let switch_key = key
            .key_for(element, &ciphertext.parms_id())
            .ok_or_else(|| {
                Error::incompatible(format!(
                    "no Galois key covers element {element} at this chain level"
                ))
            })?;
        let mut c0 = ciphertext.polys()[0].automorphism(element);
        let c1 = ciphertext.polys()[1].automorphism(element);
        let (d0, d1) = switch_key.apply(&c1, self.context.pool());
        c0 += &d0;
        Ok(Ciphertext::new(
            vec![c0, d1],
            ciphertext.parms_id(),
            ciphertext.scale(),
            Scheme::Ckks,
        ))
    }

    /// Complex conjugation of every slot.
    pub fn conjugate(&self, ciphertext: &Ciphertext, key: &GaloisKey) -> Result<Ciphertext> {
        let degree = self.context.encryption_parameters().poly_modulus_degree();
        self.apply_galois(ciphertext, 2 * degree - 1, key)
    }

    pub fn multiply_plain(
        &self,
        ciphertext: &Ciphertext,
        plaintext: &Plaintext,
    ) -> Result<Ciphertext> {
        self.level_of(ciphertext)?;
        let (plain_poly, plain_id, plain_scale) = ckks_plain(plaintext)?;
        if plain_id != ciphertext.parms_id() {
            return Err(Error::incompatible(
                "plaintext was encoded at a different chain level",
            ));
        }
        let mut lifted = plain_poly.clone();
        lifted.to_ntt_domain();
        let polys = ciphertext
            .polys()
            .iter()
            .map(|p| {
                let mut p = p.clone();
                p.to_ntt_domain();
                p.pointwise_mul_assign(&lifted);
                p.to_coeff_domain();
                p
            })
            .collect();
        Ok(Ciphertext::new(
            polys,
            ciphertext.parms_id(),
            ciphertext.scale() * plain_scale,
            Scheme::Ckks,
        ))
    }

    pub fn add_plain(&self, ciphertext: &Ciphertext, plaintext: &Plaintext) -> Result<Ciphertext> {
        self.plain_offset(ciphertext, plaintext, false)
    }

    pub fn sub_plain(&self, ciphertext: &Ciphertext, plaintext: &Plaintext) -> Result<Ciphertext> {
        self.plain_offset(ciphertext, plaintext, true)
    }

    /// Divides by the level's last prime, stepping one level down the chain.
    ///
    /// The scale is divided by the dropped prime, so a ciphertext at scale
    /// near `q_last` returns to a scale near 1:1 with its encoding.
    pub fn rescale_to_next(&self, ciphertext: &Ciphertext) -> Result<Ciphertext> {
        let data = self.level_of(ciphertext)?;
        let next_id = data
            .next_parms_id()
            .ok_or_else(|| Error::invalid("ciphertext is already at the last chain level"))?;
        let next = self
            .context
            .context_data(&next_id)
            .ok_or_else(|| Error::incompatible("chain level lookup failed"))?;
        let next_basis = next.basis();

        let basis = data.basis();
        let last = basis.channel_count() - 1;
        let q_last = basis.moduli()[last];
        let half_last = q_last / 2;
        let inverses: Vec<u64> = next_basis
            .moduli()
            .iter()
            .map(|&q| mod_inverse(q_last % q, q))
            .collect();

        let polys = ciphertext
            .polys()
            .iter()
            .map(|poly| {
                let dropped = poly.channel(last);
                let channels = next_basis
                    .moduli()
                    .iter()
                    .enumerate()
                    .map(|(channel, &q)| {
                        let residues = poly.channel(channel);
                        residues
                            .iter()
                            .zip(dropped)
                            .map(|(&x, &r)| {
                                // Subtract the centered lift of the dropped
                                // residue, then divide by q_last.
                                let shifted = if r > half_last {
                                    add_mod(x, (q_last - r) % q, q)
                                } else {
                                    sub_mod(x, r % q, q)
                                };
                                mul_mod(shifted, inverses[channel], q)
                            })
                            .collect()
                    })
                    .collect();
                RnsPoly::from_channels_unchecked(Arc::clone(next_basis), channels, false)
            })
            .collect();

        Ok(Ciphertext::new(
            polys,
            next_id,
            ciphertext.scale() / q_last as f64,
            Scheme::Ckks,
        ))
    }

    fn plain_offset(
        &self,
        ciphertext: &Ciphertext,
        plaintext: &Plaintext,
        negate: bool,
    ) -> Result<Ciphertext> {
        self.level_of(ciphertext)?;
        let (plain_poly, plain_id, plain_scale) = ckks_plain(plaintext)?;
        if plain_id != ciphertext.parms_id() {
            return Err(Error::incompatible(
                "plaintext was encoded at a different chain level",
            ));
        }
        if !super::scales_match(ciphertext.scale(), plain_scale) {
            return Err(Error::incompatible(format!(
                "plaintext scale {plain_scale} does not match ciphertext scale {}",
                ciphertext.scale()
            )));
        }
        let mut polys = ciphertext.polys().to_vec();
        if negate {
            polys[0] -= plain_poly;
        } else {
            polys[0] += plain_poly;
        }
        Ok(Ciphertext::new(
            polys,
            ciphertext.parms_id(),
            ciphertext.scale(),
            Scheme::Ckks,
        ))
    }

    fn level_of(&self, ciphertext: &Ciphertext) -> Result<Arc<ContextData>> {
        if ciphertext.scheme() != Scheme::Ckks {
            return Err(Error::incompatible("ciphertext is not a CKKS ciphertext"));
        }
        self.context
            .context_data(&ciphertext.parms_id())
            .cloned()
            .ok_or_else(|| Error::incompatible("ciphertext level is not part of this context"))
    }
}

fn ckks_plain(plaintext: &Plaintext) -> Result<(&RnsPoly, crate::context::ParmsId, f64)> {
    plaintext
        .as_ckks()
        .ok_or_else(|| Error::incompatible("plaintext was not produced by a CKKS encoder"))
}
