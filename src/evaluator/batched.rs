//! Sharded CKKS batches for vectors longer than one ciphertext's slots.
//!
//! A vector of arbitrary length is split into slot-capacity chunks, one
//! ciphertext per chunk. The batch types mirror the scalar pipeline: encode,
//! encrypt, evaluate shard-wise, decrypt, decode.

use rand::Rng;

use crate::ciphertext::Ciphertext;
use crate::context::Context;
use crate::decryptor::Decryptor;
use crate::encoder::CkksEncoder;
use crate::encryptor::Encryptor;
use crate::error::{Error, Result};
use crate::keys::{PublicKey, SecretKey};
use crate::plaintext::Plaintext;

/// A sharded plaintext vector.
#[derive(Debug, Clone)]
pub struct PlaintextBatch {
    chunks: Vec<Plaintext>,
    len: usize,
}

impl PlaintextBatch {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunks(&self) -> &[Plaintext] {
        &self.chunks
    }
}

/// A sharded ciphertext vector.
#[derive(Debug, Clone)]
pub struct CiphertextBatch {
    shards: Vec<Ciphertext>,
    len: usize,
}

impl CiphertextBatch {
    /// Logical vector length across all shards.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn shards(&self) -> &[Ciphertext] {
        &self.shards
    }
}

// ─── CkksBatchEncoder ────────────────────────────────────────────────────────

/// Encodes vectors of any length by chunking them into slot-sized pieces.
pub struct CkksBatchEncoder {
    inner: CkksEncoder,
}

impl CkksBatchEncoder {
    pub fn new(context: &Context) -> Result<Self> {
        Ok(Self {
            inner: CkksEncoder::new(context)?,
        })
    }

    /// Slots per shard.
    pub fn slot_count(&self) -> usize {
        self.inner.slot_count()
    }

    pub fn encode(&self, values: &[f64], scale: f64) -> Result<PlaintextBatch> {
        if values.is_empty() {
            return Err(Error::invalid("cannot encode an empty vector"));
        }
        let chunks = values
            .chunks(self.slot_count())
            .map(|chunk| self.inner.encode(chunk, scale))
            .collect::<Result<Vec<_>>>()?;
        Ok(PlaintextBatch {
            chunks,
            len: values.len(),
        })
    }

    /// A batch holding `value` in every slot, shaped to combine with a batch
    /// of length `len`.
    pub fn encode_broadcast(&self, value: f64, len: usize, scale: f64) -> Result<PlaintextBatch> {
        self.encode(&vec![value; len], scale)
    }

    pub fn decode(&self, batch: &PlaintextBatch) -> Result<Vec<f64>> {
        let mut values = Vec::with_capacity(batch.len);
        for chunk in &batch.chunks {
            values.extend(self.inner.decode(chunk)?);
        }
        values.truncate(batch.len);
        Ok(values)
    }
}

// ─── BatchEncryptor / BatchDecryptor ─────────────────────────────────────────

pub struct BatchEncryptor {
    inner: Encryptor,
}

impl BatchEncryptor {
    pub fn with_public_key(context: &Context, key: PublicKey) -> Result<Self> {
        Ok(Self {
            inner: Encryptor::with_public_key(context, key)?,
        })
    }

    pub fn with_secret_key(context: &Context, key: SecretKey) -> Result<Self> {
        Ok(Self {
            inner: Encryptor::with_secret_key(context, key)?,
        })
    }

    pub fn encrypt(&self, batch: &PlaintextBatch) -> Result<CiphertextBatch> {
        self.encrypt_with_rng(batch, &mut rand::rng())
    }

    pub fn encrypt_with_rng<R: Rng + ?Sized>(
        &self,
        batch: &PlaintextBatch,
        rng: &mut R,
    ) -> Result<CiphertextBatch> {
        let shards = batch
            .chunks
            .iter()
            .map(|chunk| self.inner.encrypt_with_rng(chunk, rng))
            .collect::<Result<Vec<_>>>()?;
        Ok(CiphertextBatch {
            shards,
            len: batch.len,
        })
    }
}

pub struct BatchDecryptor {
    inner: Decryptor,
}

impl BatchDecryptor {
    pub fn new(context: &Context, secret_key: SecretKey) -> Result<Self> {
        Ok(Self {
            inner: Decryptor::new(context, secret_key)?,
        })
    }

    pub fn decrypt(&self, batch: &CiphertextBatch) -> Result<PlaintextBatch> {
        let chunks = batch
            .shards
            .iter()
            .map(|shard| self.inner.decrypt(shard))
            .collect::<Result<Vec<_>>>()?;
        Ok(PlaintextBatch {
            chunks,
            len: batch.len,
        })
    }
}

// ─── CkksBatchEvaluator ──────────────────────────────────────────────────────

/// Shard-wise evaluation over ciphertext batches.
pub struct CkksBatchEvaluator {
    inner: super::CkksEvaluator,
}

impl CkksBatchEvaluator {
    pub fn new(context: &Context) -> Result<Self> {
        Ok(Self {
            inner: super::CkksEvaluator::new(context)?,
        })
    }

    pub fn add(&self, a: &CiphertextBatch, b: &CiphertextBatch) -> Result<CiphertextBatch> {
        check_same_shape(a, b)?;
        let shards = a
            .shards
            .iter()
            .zip(&b.shards)
            .map(|(x, y)| self.inner.add(x, y))
            .collect::<Result<Vec<_>>>()?;
        Ok(CiphertextBatch {
            shards,
            len: a.len,
        })
    }

    /// Sums a list of equally shaped batches.
    pub fn add_many(&self, batches: &[CiphertextBatch]) -> Result<CiphertextBatch> {
        let (first, rest) = batches
            .split_first()
            .ok_or_else(|| Error::invalid("cannot sum an empty list of batches"))?;
        rest.iter().try_fold(first.clone(), |acc, b| self.add(&acc, b))
    }

    /// Shard-wise plaintext multiplication; the plaintext batch must have the
    /// same length and chunking.
    pub fn multiply_plain(
        &self,
        batch: &CiphertextBatch,
        plain: &PlaintextBatch,
    ) -> Result<CiphertextBatch> {
        if batch.len != plain.len || batch.shards.len() != plain.chunks.len() {
            return Err(Error::incompatible(format!(
                "batch of length {} does not match plaintext batch of length {}",
                batch.len, plain.len
            )));
        }
        let shards = batch
            .shards
            .iter()
            .zip(&plain.chunks)
            .map(|(shard, chunk)| self.inner.multiply_plain(shard, chunk))
            .collect::<Result<Vec<_>>>()?;
        Ok(CiphertextBatch {
            shards,
            len: batch.len,
        })
    }

    pub fn rescale_to_next(&self, batch: &CiphertextBatch) -> Result<CiphertextBatch> {
        let shards = batch
            .shards
            .iter()
            .map(|shard| self.inner.rescale_to_next(shard))
            .collect::<Result<Vec<_>>>()?;
        Ok(CiphertextBatch {
            shards,
            len: batch.len,
        })
    }
}

fn check_same_shape(a: &CiphertextBatch, b: &CiphertextBatch) -> Result<()> {
    if a.len != b.len || a.shards.len() != b.shards.len() {
        return Err(Error::incompatible(format!(
            "batches of lengths {} and {} cannot be combined",
            a.len, b.len
        )));
    }
    Ok(())
}
