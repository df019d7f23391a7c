//! A leveled homomorphic encryption engine over power-of-two cyclotomic
//! rings, with the BFV scheme for exact modular arithmetic and the CKKS
//! scheme for approximate arithmetic on real and complex vectors.
//!
//! The [`Context`] validates a parameter set and precomputes the modulus
//! switching chain; encoders map vectors into ring plaintexts; the
//! [`Encryptor`]/[`Decryptor`] pair and the per-scheme evaluators operate on
//! [`Ciphertext`] values whose level is tracked by [`ParmsId`] fingerprints.

pub mod ciphertext;
pub mod context;
pub mod decryptor;
pub mod encoder;
pub mod encryptor;
pub mod error;
pub mod evaluator;
pub mod keys;
pub mod math;
pub mod memory;
pub mod modulus;
pub mod parameters;
pub mod plaintext;
pub mod poly_array;
pub mod rns;
pub mod serialization;

pub use ciphertext::Ciphertext;
pub use context::{Context, ParmsId};
pub use decryptor::Decryptor;
pub use encoder::{BfvEncoder, CkksEncoder};
pub use encryptor::{EncryptionComponents, Encryptor};
pub use error::{Error, Result};
pub use evaluator::{
    BatchDecryptor, BatchEncryptor, BfvEvaluator, CiphertextBatch, CkksBatchEncoder,
    CkksBatchEvaluator, CkksEvaluator, PlaintextBatch,
};
pub use keys::{GaloisKey, KeyGenParams, KeyGenerator, PublicKey, RelinearizationKey, SecretKey};
pub use modulus::{CoefficientModulus, Modulus, PlainModulus, SecurityLevel};
pub use parameters::{
    BfvEncryptionParametersBuilder, CkksEncryptionParametersBuilder, EncryptionParameters,
    PlainModulusInput, Scheme,
};
pub use plaintext::Plaintext;
pub use poly_array::{PolyForm, PolynomialArray};
pub use serialization::{FromBytes, ToBytes};
