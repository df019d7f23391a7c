//! Flat polynomial arrays for exporting key and ciphertext material.
//!
//! Protocols that prove statements about ciphertexts need the raw coefficient
//! data in a fixed layout. An array holds `num_polynomials` ring elements in
//! either RNS form (`[poly][channel][coeff]`, one residue word per channel) or
//! multiprecision form (`[poly][coeff][limb]`, little-endian limbs of the CRT
//! composition in `[0, Q)`). Both forms occupy the same number of words.

use std::sync::Arc;

use num_bigint::BigUint;

use crate::ciphertext::Ciphertext;
use crate::context::Context;
use crate::encryptor::EncryptionComponents;
use crate::error::{Error, Result};
use crate::keys::PublicKey;
use crate::rns::{RnsBasis, RnsPoly};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolyForm {
    Rns,
    Multiprecision,
}

#[derive(Debug, Clone)]
pub struct PolynomialArray {
    data: Vec<u64>,
    num_polynomials: usize,
    form: PolyForm,
    basis: Option<Arc<RnsBasis>>,
}

impl PolynomialArray {
    /// An empty, unreserved array.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            num_polynomials: 0,
            form: PolyForm::Rns,
            basis: None,
        }
    }

    /// Whether backing memory has been attached.
    pub fn is_reserved(&self) -> bool {
        self.basis.is_some()
    }

    pub fn form(&self) -> PolyForm {
        self.form
    }

    pub fn num_polynomials(&self) -> usize {
        self.num_polynomials
    }

    pub fn poly_modulus_degree(&self) -> usize {
        self.basis.as_ref().map(|b| b.degree()).unwrap_or_default()
    }

    /// Channel count in RNS form, limb count in multiprecision form.
    pub fn coeff_modulus_size(&self) -> usize {
        self.basis
            .as_ref()
            .map(|b| b.channel_count())
            .unwrap_or_default()
    }

    /// The raw words in the current layout.
    pub fn as_ints(&self) -> Vec<u64> {
        self.data.clone()
    }

    /// Captures the component polynomials of a ciphertext, in RNS form.
    pub fn from_ciphertext(context: &Context, ciphertext: &Ciphertext) -> Result<Self> {
        let data = context
            .context_data(&ciphertext.parms_id())
            .ok_or_else(|| Error::incompatible("ciphertext level is not part of this context"))?;
        Ok(Self::from_polys(
            Arc::clone(data.basis()),
            ciphertext.polys(),
        ))
    }

    /// Captures the two public key polynomials, in RNS form.
    pub fn from_public_key(context: &Context, public_key: &PublicKey) -> Result<Self> {
        if public_key.parms_id() != context.key_parms_id() {
            return Err(Error::incompatible(
                "public key belongs to a different parameter set",
            ));
        }
        let basis = Arc::clone(context.key_context_data().basis());
        Ok(Self::from_polys(
            basis,
            &[public_key.b().clone(), public_key.a().clone()],
        ))
    }

    /// Captures encryption randomness as `[u, e_0, ..., e_k, r]`, in RNS form.
    pub fn from_components(context: &Context, components: &EncryptionComponents) -> Result<Self> {
        let basis = Arc::clone(components.u.basis());
        if context
            .context_data(&context.key_parms_id())
            .is_none_or(|data| data.basis().moduli() != basis.moduli())
        {
            return Err(Error::incompatible(
                "encryption components belong to a different parameter set",
            ));
        }
        let mut polys = vec![components.u.clone()];
        polys.extend(components.e.iter().cloned());
        if let Some(r) = &components.r {
            polys.push(r.clone());
        }
        Ok(Self::from_polys(basis, &polys))
    }

    fn from_polys(basis: Arc<RnsBasis>, polys: &[RnsPoly]) -> Self {
        let mut data =
            Vec::with_capacity(polys.len() * basis.channel_count() * basis.degree());
        for poly in polys {
            debug_assert!(!poly.in_ntt_domain());
            for channel in poly.channels() {
                data.extend_from_slice(channel);
            }
        }
        Self {
            data,
            num_polynomials: polys.len(),
            form: PolyForm::Rns,
            basis: Some(basis),
        }
    }

    /// The same polynomials with each coefficient CRT-composed into
    /// little-endian limbs.
    pub fn to_multiprecision(&self) -> Result<Self> {
        let basis = self.reserved_basis()?;
        if self.form == PolyForm::Multiprecision {
            return Ok(self.clone());
        }
        let degree = basis.degree();
        let channels = basis.channel_count();
        let mut data = Vec::with_capacity(self.data.len());
        let mut residues = vec![0u64; channels];
        for poly in 0..self.num_polynomials {
            let base = poly * channels * degree;
            for coeff in 0..degree {
                for (channel, r) in residues.iter_mut().enumerate() {
                    *r = self.data[base + channel * degree + coeff];
                }
                let composed = compose(basis, &residues);
                let mut limbs = composed.to_u64_digits();
                limbs.resize(channels, 0);
                data.extend_from_slice(&limbs);
            }
        }
        Ok(Self {
            data,
            num_polynomials: self.num_polynomials,
            form: PolyForm::Multiprecision,
            basis: Some(Arc::clone(basis)),
        })
    }

    /// The same polynomials decomposed back into residue channels.
    pub fn to_rns(&self) -> Result<Self> {
        let basis = self.reserved_basis()?;
        if self.form == PolyForm::Rns {
            return Ok(self.clone());
        }
        let degree = basis.degree();
        let channels = basis.channel_count();
        let mut data = vec![0u64; self.data.len()];
        for poly in 0..self.num_polynomials {
            let base = poly * channels * degree;
            for coeff in 0..degree {
                let limbs = &self.data[base + coeff * channels..base + (coeff + 1) * channels];
                let value = limbs
                    .iter()
                    .rev()
                    .fold(BigUint::ZERO, |acc, &limb| (acc << 64) | BigUint::from(limb));
                for (channel, &q) in basis.moduli().iter().enumerate() {
                    data[base + channel * degree + coeff] =
                        residue_of(&value, q);
                }
            }
        }
        Ok(Self {
            data,
            num_polynomials: self.num_polynomials,
            form: PolyForm::Rns,
            basis: Some(Arc::clone(basis)),
        })
    }

    fn reserved_basis(&self) -> Result<&Arc<RnsBasis>> {
        self.basis
            .as_ref()
            .ok_or_else(|| Error::invalid("polynomial array holds no data"))
    }
}

impl Default for PolynomialArray {
    fn default() -> Self {
        Self::new()
    }
}

/// CRT composition into `[0, Q)`.
fn compose(basis: &RnsBasis, residues: &[u64]) -> BigUint {
    let centered = basis.reconstruct_centered(residues);
    match centered.to_biguint() {
        Some(non_negative) => non_negative,
        None => {
            let magnitude = (-centered).to_biguint().unwrap_or_default();
            basis.modulus_product() - magnitude
        }
    }
}

fn residue_of(value: &BigUint, q: u64) -> u64 {
    use num_traits::ToPrimitive;
    (value % BigUint::from(q)).to_u64().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decryptor::Decryptor;
    use crate::encoder::BfvEncoder;
    use crate::encryptor::Encryptor;
    use crate::keys::KeyGenerator;
    use crate::modulus::{CoefficientModulus, PlainModulus, SecurityLevel};
    use crate::parameters::BfvEncryptionParametersBuilder;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn context() -> Context {
        let parms = BfvEncryptionParametersBuilder::new()
            .set_poly_modulus_degree(1024)
            .set_coefficient_modulus(CoefficientModulus::create(1024, &[30, 30]).unwrap())
            .set_plain_modulus(PlainModulus::batching(1024, 20).unwrap())
            .build()
            .unwrap();
        Context::new(&parms, true, SecurityLevel::None).unwrap()
    }

    #[test]
    fn fresh_arrays_are_unreserved() {
        let array = PolynomialArray::new();
        assert!(!array.is_reserved());
        assert_eq!(array.num_polynomials(), 0);
        assert!(array.to_multiprecision().is_err());
    }

    #[test]
    fn ciphertext_capture_has_the_expected_shape() {
        let context = context();
        let mut rng = ChaCha20Rng::seed_from_u64(51);
        let generator = KeyGenerator::new_with_rng(&context, &mut rng).unwrap();
        let encoder = BfvEncoder::new(&context).unwrap();
        let encryptor = Encryptor::with_public_key(
            &context,
            generator.create_public_key_with_rng(&mut rng),
        )
        .unwrap();

        let plaintext = encoder.encode_int(&[1, 2, 3]).unwrap();
        let ciphertext = encryptor.encrypt_with_rng(&plaintext, &mut rng).unwrap();
        let array = PolynomialArray::from_ciphertext(&context, &ciphertext).unwrap();

        assert!(array.is_reserved());
        assert_eq!(array.num_polynomials(), 2);
        assert_eq!(array.poly_modulus_degree(), 1024);
        assert_eq!(array.coeff_modulus_size(), 2);
        assert_eq!(array.as_ints().len(), 2 * 2 * 1024);
        assert_eq!(array.form(), PolyForm::Rns);
    }

    #[test]
    fn form_conversions_roundtrip() {
        let context = context();
        let mut rng = ChaCha20Rng::seed_from_u64(52);
        let generator = KeyGenerator::new_with_rng(&context, &mut rng).unwrap();
        let public_key = generator.create_public_key_with_rng(&mut rng);
        let array = PolynomialArray::from_public_key(&context, &public_key).unwrap();

        let multiprecision = array.to_multiprecision().unwrap();
        assert_eq!(multiprecision.form(), PolyForm::Multiprecision);
        assert_eq!(multiprecision.as_ints().len(), array.as_ints().len());
        assert_ne!(multiprecision.as_ints(), array.as_ints());

        let back = multiprecision.to_rns().unwrap();
        assert_eq!(back.as_ints(), array.as_ints());
        // Converting to the current form is the identity.
        assert_eq!(array.to_rns().unwrap().as_ints(), array.as_ints());
    }

    #[test]
    fn components_capture_includes_the_remainder() {
        let context = context();
        let mut rng = ChaCha20Rng::seed_from_u64(53);
        let generator = KeyGenerator::new_with_rng(&context, &mut rng).unwrap();
        let encoder = BfvEncoder::new(&context).unwrap();
        let encryptor = Encryptor::with_public_key(
            &context,
            generator.create_public_key_with_rng(&mut rng),
        )
        .unwrap();
        let decryptor = Decryptor::new(&context, generator.secret_key().clone()).unwrap();

        let plaintext = encoder.encode_int(&[9, 8, 7]).unwrap();
        let (ciphertext, components) = encryptor
            .encrypt_return_components_with_rng(&plaintext, &mut rng)
            .unwrap();
        // u, e0, e1, r
        let array = PolynomialArray::from_components(&context, &components).unwrap();
        assert_eq!(array.num_polynomials(), 4);

        // The captured ciphertext still decrypts.
        let decoded = encoder
            .decode_int(&decryptor.decrypt(&ciphertext).unwrap())
            .unwrap();
        assert_eq!(&decoded[..3], &[9, 8, 7]);
    }
}
