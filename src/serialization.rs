//! Byte-level persistence for contexts, keys, and ciphertexts.
//!
//! Wire payloads are private serde structs encoded with `bincode`. Decoding
//! anything that carries polynomials requires the owning [`Context`] so the
//! residue channels can be re-linked to their level and validated; corrupt or
//! inconsistent bytes fail with [`Error::Deserialization`] and never yield a
//! partial object.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ciphertext::Ciphertext;
use crate::context::{Context, ParmsId};
use crate::error::{Error, Result};
use crate::keys::{GaloisKey, KeySwitchKey, PublicKey, RelinearizationKey, SecretKey};
use crate::modulus::SecurityLevel;
use crate::parameters::{EncryptionParameters, Scheme};
use crate::plaintext::{PlainRepr, Plaintext};
use crate::rns::RnsPoly;

/// Conversion into a self-contained byte representation.
pub trait ToBytes {
    fn as_bytes(&self) -> Result<Vec<u8>>;
}

/// Reconstruction from bytes under some state, usually the owning context.
pub trait FromBytes {
    /// State needed to rebuild the object.
    type State;

    fn from_bytes(state: &Self::State, bytes: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    bincode::serialize(payload).map_err(|e| Error::invalid(format!("encoding failed: {e}")))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::deserialization(e.to_string()))
}

// ─── Wire payloads ───────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct PolyPayload {
    channels: Vec<Vec<u64>>,
    ntt: bool,
}

impl PolyPayload {
    fn of(poly: &RnsPoly) -> Self {
        Self {
            channels: poly.channels().to_vec(),
            ntt: poly.in_ntt_domain(),
        }
    }

    fn rebuild(self, context: &Context, parms_id: &ParmsId) -> Result<RnsPoly> {
        let data = context
            .context_data(parms_id)
            .ok_or_else(|| Error::deserialization("unknown parameter fingerprint"))?;
        RnsPoly::from_channels(Arc::clone(data.basis()), self.channels, self.ntt)
            .map_err(|e| Error::deserialization(e.to_string()))
    }
}

#[derive(Serialize, Deserialize)]
struct CiphertextPayload {
    scheme: Scheme,
    parms_id: ParmsId,
    scale: f64,
    polys: Vec<PolyPayload>,
}

#[derive(Serialize, Deserialize)]
enum PlaintextPayload {
    Bfv {
        coeffs: Vec<u64>,
        plain_modulus: u64,
    },
    Ckks {
        parms_id: ParmsId,
        scale: f64,
        poly: PolyPayload,
    },
}

#[derive(Serialize, Deserialize)]
struct SecretKeyPayload {
    parms_id: ParmsId,
    s: PolyPayload,
}

#[derive(Serialize, Deserialize)]
struct PublicKeyPayload {
    parms_id: ParmsId,
    b: PolyPayload,
    a: PolyPayload,
}

#[derive(Serialize, Deserialize)]
struct SwitchKeyPayload {
    parms_id: ParmsId,
    pairs: Vec<Vec<(PolyPayload, PolyPayload)>>,
}

impl SwitchKeyPayload {
    fn of(key: &KeySwitchKey) -> Self {
        Self {
            parms_id: key.parms_id(),
            pairs: key
                .pairs()
                .iter()
                .map(|digits| {
                    digits
                        .iter()
                        .map(|(b, a)| (PolyPayload::of(b), PolyPayload::of(a)))
                        .collect()
                })
                .collect(),
        }
    }

    fn rebuild(self, context: &Context) -> Result<KeySwitchKey> {
        let parms_id = self.parms_id;
        let pairs = self
            .pairs
            .into_iter()
            .map(|digits| {
                digits
                    .into_iter()
                    .map(|(b, a)| {
                        Ok((b.rebuild(context, &parms_id)?, a.rebuild(context, &parms_id)?))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(KeySwitchKey::from_parts(pairs, parms_id))
    }
}

#[derive(Serialize, Deserialize)]
struct RelinearizationKeyPayload {
    levels: Vec<SwitchKeyPayload>,
}

#[derive(Serialize, Deserialize)]
struct GaloisKeyPayload {
    keys: Vec<(u64, Vec<SwitchKeyPayload>)>,
}

#[derive(Serialize, Deserialize)]
struct ContextPayload {
    parms: EncryptionParameters,
    expand_mod_chain: bool,
    security_level: SecurityLevel,
}

// ─── Trait impls ─────────────────────────────────────────────────────────────

impl ToBytes for Ciphertext {
    fn as_bytes(&self) -> Result<Vec<u8>> {
        encode(&CiphertextPayload {
            scheme: self.scheme(),
            parms_id: self.parms_id(),
            scale: self.scale(),
            polys: self.polys().iter().map(PolyPayload::of).collect(),
        })
    }
}

impl FromBytes for Ciphertext {
    type State = Context;

    fn from_bytes(context: &Context, bytes: &[u8]) -> Result<Self> {
        let payload: CiphertextPayload = decode(bytes)?;
        if payload.scheme != context.encryption_parameters().scheme() {
            return Err(Error::deserialization(
                "ciphertext scheme does not match the context",
            ));
        }
        if payload.polys.len() < 2 {
            return Err(Error::deserialization(
                "a ciphertext holds at least two polynomials",
            ));
        }
        let polys = payload
            .polys
            .into_iter()
            .map(|poly| {
                let poly = poly.rebuild(context, &payload.parms_id)?;
                if poly.in_ntt_domain() {
                    return Err(Error::deserialization(
                        "ciphertext polynomials are stored in coefficient domain",
                    ));
                }
                Ok(poly)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Ciphertext::new(
            polys,
            payload.parms_id,
            payload.scale,
            payload.scheme,
        ))
    }
}

impl ToBytes for Plaintext {
    fn as_bytes(&self) -> Result<Vec<u8>> {
        encode(&match self.repr() {
            PlainRepr::Bfv {
                coeffs,
                plain_modulus,
            } => PlaintextPayload::Bfv {
                coeffs: coeffs.clone(),
                plain_modulus: *plain_modulus,
            },
            PlainRepr::Ckks {
                poly,
                parms_id,
                scale,
            } => PlaintextPayload::Ckks {
                parms_id: *parms_id,
                scale: *scale,
                poly: PolyPayload::of(poly),
            },
        })
    }
}

impl FromBytes for Plaintext {
    type State = Context;

    fn from_bytes(context: &Context, bytes: &[u8]) -> Result<Self> {
        match decode(bytes)? {
            PlaintextPayload::Bfv {
                coeffs,
                plain_modulus,
            } => {
                let expected = context
                    .encryption_parameters()
                    .plain_modulus()
                    .map(|m| m.value());
                if expected != Some(plain_modulus) {
                    return Err(Error::deserialization(
                        "plaintext modulus does not match the context",
                    ));
                }
                let degree = context.encryption_parameters().poly_modulus_degree() as usize;
                if coeffs.len() > degree {
                    return Err(Error::deserialization("plaintext exceeds the ring degree"));
                }
                if coeffs.iter().any(|&c| c >= plain_modulus) {
                    return Err(Error::deserialization(
                        "plaintext coefficients are not reduced",
                    ));
                }
                Ok(Plaintext::new_bfv(coeffs, plain_modulus))
            }
            PlaintextPayload::Ckks {
                parms_id,
                scale,
                poly,
            } => {
                let poly = poly.rebuild(context, &parms_id)?;
                Ok(Plaintext::new_ckks(poly, parms_id, scale))
            }
        }
    }
}

impl ToBytes for SecretKey {
    fn as_bytes(&self) -> Result<Vec<u8>> {
        encode(&SecretKeyPayload {
            parms_id: self.parms_id(),
            s: PolyPayload::of(self.poly()),
        })
    }
}

impl FromBytes for SecretKey {
    type State = Context;

    fn from_bytes(context: &Context, bytes: &[u8]) -> Result<Self> {
        let payload: SecretKeyPayload = decode(bytes)?;
        if payload.parms_id != context.key_parms_id() {
            return Err(Error::deserialization("secret key is not at the key level"));
        }
        let s = payload.s.rebuild(context, &payload.parms_id)?;
        Ok(SecretKey::new(s, payload.parms_id))
    }
}

impl ToBytes for PublicKey {
    fn as_bytes(&self) -> Result<Vec<u8>> {
        encode(&PublicKeyPayload {
            parms_id: self.parms_id(),
            b: PolyPayload::of(self.b()),
            a: PolyPayload::of(self.a()),
        })
    }
}

impl FromBytes for PublicKey {
    type State = Context;

    fn from_bytes(context: &Context, bytes: &[u8]) -> Result<Self> {
        let payload: PublicKeyPayload = decode(bytes)?;
        if payload.parms_id != context.key_parms_id() {
            return Err(Error::deserialization("public key is not at the key level"));
        }
        let b = payload.b.rebuild(context, &payload.parms_id)?;
        let a = payload.a.rebuild(context, &payload.parms_id)?;
        Ok(PublicKey::new(b, a, payload.parms_id))
    }
}

impl ToBytes for RelinearizationKey {
    fn as_bytes(&self) -> Result<Vec<u8>> {
        encode(&RelinearizationKeyPayload {
            levels: self.levels().iter().map(SwitchKeyPayload::of).collect(),
        })
    }
}

impl FromBytes for RelinearizationKey {
    type State = Context;

    fn from_bytes(context: &Context, bytes: &[u8]) -> Result<Self> {
        let payload: RelinearizationKeyPayload = decode(bytes)?;
        let levels = payload
            .levels
            .into_iter()
            .map(|level| level.rebuild(context))
            .collect::<Result<Vec<_>>>()?;
        Ok(RelinearizationKey::new(levels))
    }
}

impl ToBytes for GaloisKey {
    fn as_bytes(&self) -> Result<Vec<u8>> {
        encode(&GaloisKeyPayload {
            keys: self
                .keys()
                .iter()
                .map(|(element, levels)| {
                    (*element, levels.iter().map(SwitchKeyPayload::of).collect())
                })
                .collect(),
        })
    }
}

impl FromBytes for GaloisKey {
    type State = Context;

    fn from_bytes(context: &Context, bytes: &[u8]) -> Result<Self> {
        let payload: GaloisKeyPayload = decode(bytes)?;
        let keys = payload
            .keys
            .into_iter()
            .map(|(element, levels)| {
                let levels = levels
                    .into_iter()
                    .map(|level| level.rebuild(context))
                    .collect::<Result<Vec<_>>>()?;
                Ok((element, levels))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(GaloisKey::new(keys))
    }
}

impl ToBytes for Context {
    fn as_bytes(&self) -> Result<Vec<u8>> {
        encode(&ContextPayload {
            parms: self.encryption_parameters().clone(),
            expand_mod_chain: self.expand_mod_chain(),
            security_level: self.security_level(),
        })
    }
}

impl FromBytes for Context {
    type State = ();

    fn from_bytes(_state: &(), bytes: &[u8]) -> Result<Self> {
        let payload: ContextPayload = decode(bytes)?;
        Context::new(
            &payload.parms,
            payload.expand_mod_chain,
            payload.security_level,
        )
        .map_err(|e| Error::deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decryptor::Decryptor;
    use crate::encoder::BfvEncoder;
    use crate::encryptor::Encryptor;
    use crate::keys::KeyGenerator;
    use crate::modulus::{CoefficientModulus, PlainModulus};
    use crate::parameters::BfvEncryptionParametersBuilder;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn context() -> Context {
        let parms = BfvEncryptionParametersBuilder::new()
            .set_poly_modulus_degree(1024)
            .set_coefficient_modulus(CoefficientModulus::create(1024, &[54]).unwrap())
            .set_plain_modulus(PlainModulus::batching(1024, 20).unwrap())
            .build()
            .unwrap();
        Context::new(&parms, true, SecurityLevel::None).unwrap()
    }

    #[test]
    fn context_roundtrip_preserves_fingerprints() {
        let context = context();
        let bytes = context.as_bytes().unwrap();
        let restored = Context::from_bytes(&(), &bytes).unwrap();
        assert_eq!(restored.key_parms_id(), context.key_parms_id());
        assert_eq!(restored.last_parms_id(), context.last_parms_id());
        assert_eq!(restored.chain_length(), context.chain_length());
    }

    #[test]
    fn ciphertext_roundtrip_decrypts_in_a_rebuilt_context() {
        let context = context();
        let mut rng = ChaCha20Rng::seed_from_u64(71);
        let generator = KeyGenerator::new_with_rng(&context, &mut rng).unwrap();
        let encoder = BfvEncoder::new(&context).unwrap();
        let encryptor = Encryptor::with_public_key(
            &context,
            generator.create_public_key_with_rng(&mut rng),
        )
        .unwrap();

        let plaintext = encoder.encode_int(&[5, -4, 3]).unwrap();
        let ciphertext = encryptor.encrypt_with_rng(&plaintext, &mut rng).unwrap();

        let restored_context =
            Context::from_bytes(&(), &context.as_bytes().unwrap()).unwrap();
        let restored_secret =
            SecretKey::from_bytes(&restored_context, &generator.secret_key().as_bytes().unwrap())
                .unwrap();
        let restored_ciphertext =
            Ciphertext::from_bytes(&restored_context, &ciphertext.as_bytes().unwrap()).unwrap();

        let decryptor = Decryptor::new(&restored_context, restored_secret).unwrap();
        let encoder = BfvEncoder::new(&restored_context).unwrap();
        let decoded = encoder
            .decode_int(&decryptor.decrypt(&restored_ciphertext).unwrap())
            .unwrap();
        assert_eq!(&decoded[..3], &[5, -4, 3]);
    }

    #[test]
    fn plaintext_and_key_roundtrips_are_exact() {
        let context = context();
        let mut rng = ChaCha20Rng::seed_from_u64(72);
        let generator = KeyGenerator::new_with_rng(&context, &mut rng).unwrap();
        let encoder = BfvEncoder::new(&context).unwrap();

        let plaintext = encoder.encode_uint(&[1, 2, 3]).unwrap();
        let restored =
            Plaintext::from_bytes(&context, &plaintext.as_bytes().unwrap()).unwrap();
        assert_eq!(restored, plaintext);

        let public_key = generator.create_public_key_with_rng(&mut rng);
        let restored =
            PublicKey::from_bytes(&context, &public_key.as_bytes().unwrap()).unwrap();
        assert_eq!(restored, public_key);

        let relin = generator.create_relinearization_key_with_rng(&mut rng);
        let restored =
            RelinearizationKey::from_bytes(&context, &relin.as_bytes().unwrap()).unwrap();
        assert_eq!(restored, relin);

        let galois = generator.create_galois_keys_with_rng(&mut rng);
        let restored = GaloisKey::from_bytes(&context, &galois.as_bytes().unwrap()).unwrap();
        assert_eq!(restored, galois);
    }

    #[test]
    fn corrupt_and_mismatched_input_is_rejected() {
        let context = context();
        assert!(matches!(
            Ciphertext::from_bytes(&context, b"not a ciphertext"),
            Err(Error::Deserialization { .. })
        ));

        // A plaintext whose coefficients are not reduced mod t.
        let bytes = encode(&PlaintextPayload::Bfv {
            coeffs: vec![u64::MAX],
            plain_modulus: context
                .encryption_parameters()
                .plain_modulus()
                .unwrap()
                .value(),
        })
        .unwrap();
        assert!(matches!(
            Plaintext::from_bytes(&context, &bytes),
            Err(Error::Deserialization { .. })
        ));

        // A ciphertext from a foreign parameter set.
        let foreign_parms = BfvEncryptionParametersBuilder::new()
            .set_poly_modulus_degree(2048)
            .set_coefficient_modulus(CoefficientModulus::create(2048, &[54]).unwrap())
            .set_plain_modulus(PlainModulus::batching(2048, 20).unwrap())
            .build()
            .unwrap();
        let foreign = Context::new(&foreign_parms, true, SecurityLevel::None).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(73);
        let generator = KeyGenerator::new_with_rng(&foreign, &mut rng).unwrap();
        let encoder = BfvEncoder::new(&foreign).unwrap();
        let encryptor = Encryptor::with_public_key(
            &foreign,
            generator.create_public_key_with_rng(&mut rng),
        )
        .unwrap();
        let ciphertext = encryptor
            .encrypt_with_rng(&encoder.encode_int(&[1]).unwrap(), &mut rng)
            .unwrap();
        assert!(matches!(
            Ciphertext::from_bytes(&context, &ciphertext.as_bytes().unwrap()),
            Err(Error::Deserialization { .. })
        ));
    }
}
