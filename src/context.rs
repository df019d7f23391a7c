//! Validated parameter context with the modulus switching chain.
//!
//! A [`Context`] freezes one [`EncryptionParameters`] set, validates it, and
//! precomputes per-level data: the RNS basis, NTT tables, and the BFV scaling
//! constants. Every ciphertext and key carries the [`ParmsId`] of the level it
//! lives at; operations look the level up through the context.

use std::collections::HashMap;
use std::sync::Arc;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::math::{NttTable, is_ntt_friendly_prime};
use crate::memory::MemoryPool;
use crate::modulus::SecurityLevel;
use crate::parameters::{EncryptionParameters, Scheme};
use crate::rns::RnsBasis;

// ─── ParmsId ─────────────────────────────────────────────────────────────────

/// Fingerprint of one parameter set in the chain.
///
/// Two contexts built from equal parameters produce equal fingerprints, so a
/// serialized ciphertext can be matched to its level after deserialization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub struct ParmsId(pub(crate) [u64; 4]);

impl ParmsId {
    fn fingerprint(parms: &EncryptionParameters) -> Self {
        let mut hasher = Sha256::new();
        hasher.update([match parms.scheme() {
            Scheme::Bfv => 1u8,
            Scheme::Ckks => 2u8,
        }]);
        hasher.update(parms.poly_modulus_degree().to_le_bytes());
        for modulus in parms.coeff_modulus() {
            hasher.update(modulus.value().to_le_bytes());
        }
        hasher.update(
            parms
                .plain_modulus()
                .map(|m| m.value())
                .unwrap_or_default()
                .to_le_bytes(),
        );
        let digest = hasher.finalize();
        let mut words = [0u64; 4];
        for (word, chunk) in words.iter_mut().zip(digest.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *word = u64::from_le_bytes(bytes);
        }
        ParmsId(words)
    }
}

// ─── ContextData ─────────────────────────────────────────────────────────────

/// Precomputed data for one level of the chain.
#[derive(Debug)]
pub struct ContextData {
    parms: EncryptionParameters,
    parms_id: ParmsId,
    chain_index: usize,
    basis: Arc<RnsBasis>,
    total_coeff_modulus: BigUint,
    /// `floor(Q / t) mod q_j` per channel; BFV only.
    coeff_div_plain_modulus: Option<Vec<u64>>,
    /// NTT table over the plain modulus, present when it supports batching.
    plain_ntt: Option<NttTable>,
    next: Option<ParmsId>,
}

impl ContextData {
    pub fn parms(&self) -> &EncryptionParameters {
        &self.parms
    }

    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    /// Position in the chain; 0 is the key level with the full chain.
    pub fn chain_index(&self) -> usize {
        self.chain_index
    }

    pub fn basis(&self) -> &Arc<RnsBasis> {
        &self.basis
    }

    pub fn total_coeff_modulus(&self) -> &BigUint {
        &self.total_coeff_modulus
    }

    pub fn coeff_div_plain_modulus(&self) -> Option<&[u64]> {
        self.coeff_div_plain_modulus.as_deref()
    }

    pub fn plain_ntt(&self) -> Option<&NttTable> {
        self.plain_ntt.as_ref()
    }

    /// Fingerprint of the next (smaller) level, if any.
    pub fn next_parms_id(&self) -> Option<ParmsId> {
        self.next
    }
}

// ─── Context ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct ContextInner {
    levels: Vec<Arc<ContextData>>,
    by_id: HashMap<ParmsId, Arc<ContextData>>,
    security_level: SecurityLevel,
    expand_mod_chain: bool,
    pool: MemoryPool,
}

/// A cheaply clonable handle to the validated chain.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Validates `parms` and builds the chain.
    ///
    /// With `expand_mod_chain` the chain descends one prime per level down to
    /// a single prime; otherwise the full chain is the only level. Keys and
    /// fresh ciphertexts always live at the full-chain level.
    pub fn new(
        parms: &EncryptionParameters,
        expand_mod_chain: bool,
        security_level: SecurityLevel,
    ) -> Result<Self> {
        let degree = parms.poly_modulus_degree();
        if !degree.is_power_of_two() || !(1024..=32768).contains(&degree) {
            return Err(Error::invalid(format!(
                "poly modulus degree {degree} is not a power of two in 1024..=32768"
            )));
        }
        for modulus in parms.coeff_modulus() {
            if !is_ntt_friendly_prime(modulus.value(), degree) {
                return Err(Error::invalid(format!(
                    "coefficient modulus {} is not an NTT prime for degree {degree}",
                    modulus.value()
                )));
            }
        }

        let total_bits: u64 = parms
            .coeff_modulus()
            .iter()
            .map(|m| u64::from(m.bit_count()))
            .sum();
        let budget = security_level.max_total_bits(degree).ok_or_else(|| {
            Error::invalid(format!(
                "degree {degree} has no entry in the security table"
            ))
        })?;
        if total_bits > budget {
            return Err(Error::invalid(format!(
                "total coefficient modulus of {total_bits} bits exceeds the \
                 {budget}-bit budget for degree {degree}"
            )));
        }

        if parms.scheme() == Scheme::Bfv {
            let plain = parms.plain_modulus().ok_or(Error::MissingParameter {
                field: "plain_modulus",
            })?;
            for modulus in parms.coeff_modulus() {
                if plain.value().gcd(&modulus.value()) != 1 {
                    return Err(Error::invalid(format!(
                        "plain modulus {} shares a factor with coefficient modulus {}",
                        plain.value(),
                        modulus.value()
                    )));
                }
            }
        }

        let level_count = if expand_mod_chain {
            parms.coeff_modulus().len()
        } else {
            1
        };

        let level_parms_list: Vec<EncryptionParameters> = (0..level_count)
            .map(|chain_index| {
                let keep = parms.coeff_modulus().len() - chain_index;
                parms.with_coeff_modulus(parms.coeff_modulus()[..keep].to_vec())
            })
            .collect();
        let level_ids: Vec<ParmsId> = level_parms_list.iter().map(ParmsId::fingerprint).collect();

        let mut levels = Vec::with_capacity(level_count);
        for (chain_index, level_parms) in level_parms_list.into_iter().enumerate() {
            let moduli: Vec<u64> = level_parms
                .coeff_modulus()
                .iter()
                .map(|m| m.value())
                .collect();
            let basis = Arc::new(RnsBasis::new(degree as usize, moduli)?);
            let total_coeff_modulus = basis.modulus_product().clone();

            let coeff_div_plain_modulus = match level_parms.plain_modulus() {
                Some(plain) => {
                    let delta = &total_coeff_modulus / BigUint::from(plain.value());
                    Some(
                        basis
                            .moduli()
                            .iter()
                            .map(|&q| {
                                (&delta % BigUint::from(q)).to_u64().ok_or_else(|| {
                                    Error::invalid("scaling constant does not reduce")
                                })
                            })
                            .collect::<Result<Vec<u64>>>()?,
                    )
                }
                None => None,
            };

            let plain_ntt = level_parms
                .plain_modulus()
                .filter(|m| is_ntt_friendly_prime(m.value(), degree))
                .map(|m| NttTable::new(degree as usize, m.value()))
                .transpose()?;

            levels.push(Arc::new(ContextData {
                parms: level_parms,
                parms_id: level_ids[chain_index],
                chain_index,
                basis,
                total_coeff_modulus,
                coeff_div_plain_modulus,
                plain_ntt,
                next: level_ids.get(chain_index + 1).copied(),
            }));
        }

        let by_id = levels
            .iter()
            .map(|data| (data.parms_id, Arc::clone(data)))
            .collect();

        Ok(Self {
            inner: Arc::new(ContextInner {
                levels,
                by_id,
                security_level,
                expand_mod_chain,
                pool: MemoryPool::new(),
            }),
        })
    }

    /// Fingerprint of the key level, where keys and fresh ciphertexts live.
    pub fn key_parms_id(&self) -> ParmsId {
        self.inner.levels[0].parms_id
    }

    /// Fingerprint of the smallest level in the chain.
    pub fn last_parms_id(&self) -> ParmsId {
        self.inner.levels[self.inner.levels.len() - 1].parms_id
    }

    pub fn context_data(&self, parms_id: &ParmsId) -> Option<&Arc<ContextData>> {
        self.inner.by_id.get(parms_id)
    }

    pub fn key_context_data(&self) -> &Arc<ContextData> {
        &self.inner.levels[0]
    }

    /// The parameters the context was built from.
    pub fn encryption_parameters(&self) -> &EncryptionParameters {
        self.inner.levels[0].parms()
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.inner.security_level
    }

    pub fn expand_mod_chain(&self) -> bool {
        self.inner.expand_mod_chain
    }

    pub fn chain_length(&self) -> usize {
        self.inner.levels.len()
    }

    pub(crate) fn pool(&self) -> &MemoryPool {
        &self.inner.pool
    }

}
