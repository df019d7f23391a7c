//! Exact evaluation for BFV ciphertexts.

use std::sync::Arc;

use num_bigint::BigInt;

use crate::ciphertext::Ciphertext;
use crate::context::{Context, ContextData};
use crate::encryptor::scale_bfv_message;
use crate::error::{Error, Result};
use crate::keys::RelinearizationKey;
use crate::parameters::Scheme;
use crate::plaintext::Plaintext;
use crate::rns::{RnsPoly, negacyclic_bigint_mul, scale_and_round};

/// Evaluates circuits over BFV ciphertexts.
///
/// Multiplication is exact as long as the scaled product stays inside the
/// coefficient modulus: roughly `n * t * |a| * |b| < Q / 2` for plaintext
/// polynomials `a` and `b`. The chain must be sized for the circuit depth.
pub struct BfvEvaluator {
    context: Context,
}

impl BfvEvaluator {
    pub fn new(context: &Context) -> Result<Self> {
        if context.encryption_parameters().scheme() != Scheme::Bfv {
            return Err(Error::invalid("this evaluator requires a BFV context"));
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

    /// Multiplies without relinearizing; the result has size
    /// `a.size() + b.size() - 1`.
    pub fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        super::check_compatible(a, b)?;
        let data = self.level_of(a)?;
        let t = plain_modulus_of(&data)?;
        let q = BigInt::from(data.total_coeff_modulus().clone());
        let t_big = BigInt::from(t);

        // Tensor over the exact integers, then scale each component by t / Q.
        // Working outside the RNS basis keeps the product exact before the
        // final rounding.
        let a_big: Vec<Vec<BigInt>> =
            a.polys().iter().map(|p| p.to_centered_bigints()).collect();
        let b_big: Vec<Vec<BigInt>> =
            b.polys().iter().map(|p| p.to_centered_bigints()).collect();

        let degree = data.basis().degree();
        let out_size = a_big.len() + b_big.len() - 1;
        let mut tensor = vec![vec![BigInt::ZERO; degree]; out_size];
        for (i, ai) in a_big.iter().enumerate() {
            for (j, bj) in b_big.iter().enumerate() {
                let product = negacyclic_bigint_mul(ai, bj);
                for (acc, term) in tensor[i + j].iter_mut().zip(product) {
                    *acc += term;
                }
            }
        }

        let polys = tensor
            .into_iter()
            .map(|component| {
                let scaled: Vec<BigInt> = component
                    .iter()
                    .map(|x| scale_and_round(x, &t_big, &q))
                    .collect();
                RnsPoly::from_bigint_coeffs(Arc::clone(data.basis()), &scaled)
            })
            .collect();
        Ok(Ciphertext::new(polys, a.parms_id(), 1.0, Scheme::Bfv))
    }

    pub fn relinearize(
        &self,
        ciphertext: &Ciphertext,
        key: &RelinearizationKey,
    ) -> Result<Ciphertext> {
        self.level_of(ciphertext)?;
        super::relinearize(ciphertext, key, self.context.pool())
    }

    /// Multiplies by a plaintext, lifted to centered representatives to keep
    /// the noise growth at `|m|` instead of `t`.
    pub fn multiply_plain(
        &self,
        ciphertext: &Ciphertext,
        plaintext: &Plaintext,
    ) -> Result<Ciphertext> {
        let data = self.level_of(ciphertext)?;
        let (coeffs, plain_modulus) = bfv_plain(plaintext)?;
        let t = plain_modulus_of(&data)?;
        if plain_modulus != t {
            return Err(Error::incompatible(
                "plaintext was encoded for a different plain modulus",
            ));
        }
        let centered: Vec<i64> = coeffs
            .iter()
            .map(|&v| {
                if v > t / 2 {
                    v as i64 - t as i64
                } else {
                    v as i64
                }
            })
            .collect();
        let mut lifted = RnsPoly::from_signed_coeffs(Arc::clone(data.basis()), &centered);
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
            1.0,
            Scheme::Bfv,
        ))
    }

    pub fn add_plain(&self, ciphertext: &Ciphertext, plaintext: &Plaintext) -> Result<Ciphertext> {
        self.plain_offset(ciphertext, plaintext, false)
    }

    pub fn sub_plain(&self, ciphertext: &Ciphertext, plaintext: &Plaintext) -> Result<Ciphertext> {
        self.plain_offset(ciphertext, plaintext, true)
    }

    fn plain_offset(
        &self,
        ciphertext: &Ciphertext,
        plaintext: &Plaintext,
        negate: bool,
    ) -> Result<Ciphertext> {
        let data = self.level_of(ciphertext)?;
        let (coeffs, plain_modulus) = bfv_plain(plaintext)?;
        let lifted = scale_bfv_message(&data, coeffs, plain_modulus)?;
        let mut polys = ciphertext.polys().to_vec();
        if negate {
            polys[0] -= &lifted;
        } else {
            polys[0] += &lifted;
        }
        Ok(Ciphertext::new(
            polys,
            ciphertext.parms_id(),
            1.0,
            Scheme::Bfv,
        ))
    }

    fn level_of(&self, ciphertext: &Ciphertext) -> Result<Arc<ContextData>> {
        if ciphertext.scheme() != Scheme::Bfv {
            return Err(Error::incompatible("ciphertext is not a BFV ciphertext"));
        }
        self.context
            .context_data(&ciphertext.parms_id())
            .cloned()
            .ok_or_else(|| Error::incompatible("ciphertext level is not part of this context"))
    }
}

fn plain_modulus_of(data: &ContextData) -> Result<u64> {
    data.parms()
        .plain_modulus()
        .map(|m| m.value())
        .ok_or(Error::MissingParameter {
            field: "plain_modulus",
        })
}

fn bfv_plain(plaintext: &Plaintext) -> Result<(&[u64], u64)> {
    plaintext
        .as_bfv()
        .ok_or_else(|| Error::incompatible("plaintext was not produced by a BFV encoder"))
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

    struct Fixture {
        context: Context,
        encoder: BfvEncoder,
        encryptor: Encryptor,
        decryptor: Decryptor,
        evaluator: BfvEvaluator,
        relin_key: RelinearizationKey,
        rng: ChaCha20Rng,
    }

    fn fixture(seed: u64) -> Fixture {
        let parms = BfvEncryptionParametersBuilder::new()
            .set_poly_modulus_degree(1024)
            .set_coefficient_modulus(CoefficientModulus::create(1024, &[54, 54]).unwrap())
            .set_plain_modulus(PlainModulus::batching(1024, 20).unwrap())
            .build()
            .unwrap();
        let context = Context::new(&parms, true, SecurityLevel::None).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let generator = KeyGenerator::new_with_rng(&context, &mut rng).unwrap();
        Fixture {
            encoder: BfvEncoder::new(&context).unwrap(),
            encryptor: Encryptor::with_public_key(
                &context,
                generator.create_public_key_with_rng(&mut rng),
            )
            .unwrap(),
            decryptor: Decryptor::new(&context, generator.secret_key().clone()).unwrap(),
            evaluator: BfvEvaluator::new(&context).unwrap(),
            relin_key: generator.create_relinearization_key_with_rng(&mut rng),
            context,
            rng,
        }
    }

    impl Fixture {
        fn encrypt(&mut self, values: &[i64]) -> Ciphertext {
            let plaintext = self.encoder.encode_int(values).unwrap();
            self.encryptor
                .encrypt_with_rng(&plaintext, &mut self.rng)
                .unwrap()
        }

        fn decrypt(&self, ciphertext: &Ciphertext) -> Vec<i64> {
            self.encoder
                .decode_int(&self.decryptor.decrypt(ciphertext).unwrap())
                .unwrap()
        }
    }

    #[test]
    fn add_sub_negate_are_slotwise() {
        let mut fx = fixture(21);
        let a = fx.encrypt(&[1, -2, 30, 400]);
        let b = fx.encrypt(&[10, 20, -30, 5]);

        let sum = fx.evaluator.add(&a, &b).unwrap();
        assert_eq!(&fx.decrypt(&sum)[..4], &[11, 18, 0, 405]);

        let diff = fx.evaluator.sub(&a, &b).unwrap();
        assert_eq!(&fx.decrypt(&diff)[..4], &[-9, -22, 60, 395]);

        let neg = fx.evaluator.negate(&a).unwrap();
        assert_eq!(&fx.decrypt(&neg)[..4], &[-1, 2, -30, -400]);
    }

    #[test]
    fn add_many_folds_the_list() {
        let mut fx = fixture(22);
        let cts = vec![
            fx.encrypt(&[1, 2, 3]),
            fx.encrypt(&[10, 20, 30]),
            fx.encrypt(&[100, 200, 300]),
        ];
        let total = fx.evaluator.add_many(&cts).unwrap();
        assert_eq!(&fx.decrypt(&total)[..3], &[111, 222, 333]);
        assert!(fx.evaluator.add_many(&[]).is_err());
    }

    #[test]
    fn multiply_then_relinearize_decrypts_to_the_product() {
        let mut fx = fixture(23);
        let a = fx.encrypt(&[2, -3, 7, 100]);
        let b = fx.encrypt(&[5, 5, -2, 100]);

        let product = fx.evaluator.multiply(&a, &b).unwrap();
        assert_eq!(product.size(), 3);
        assert_eq!(&fx.decrypt(&product)[..4], &[10, -15, -14, 10_000]);

        let relinearized = fx.evaluator.relinearize(&product, &fx.relin_key).unwrap();
        assert_eq!(relinearized.size(), 2);
        assert_eq!(&fx.decrypt(&relinearized)[..4], &[10, -15, -14, 10_000]);
    }

    #[test]
    fn multiply_consumes_noise_budget() {
        let mut fx = fixture(24);
        let a = fx.encrypt(&[3, 4]);
        let b = fx.encrypt(&[5, 6]);
        let fresh = fx.decryptor.invariant_noise_budget(&a).unwrap();
        let product = fx.evaluator.multiply(&a, &b).unwrap();
        let after = fx.decryptor.invariant_noise_budget(&product).unwrap();
        assert!(after < fresh, "budget went from {fresh} to {after}");
        assert!(after > 0);
    }

    #[test]
    fn relinearize_rejects_fresh_ciphertexts() {
        let mut fx = fixture(25);
        let fresh = fx.encrypt(&[1]);
        assert!(fx.evaluator.relinearize(&fresh, &fx.relin_key).is_err());
    }

    #[test]
    fn plain_operands_are_slotwise() {
        let mut fx = fixture(26);
        let ct = fx.encrypt(&[4, -6, 11]);
        let plain = fx.encoder.encode_int(&[3, 3, -2]).unwrap();

        let product = fx.evaluator.multiply_plain(&ct, &plain).unwrap();
        assert_eq!(&fx.decrypt(&product)[..3], &[12, -18, -22]);

        let sum = fx.evaluator.add_plain(&ct, &plain).unwrap();
        assert_eq!(&fx.decrypt(&sum)[..3], &[7, -3, 9]);

        let diff = fx.evaluator.sub_plain(&ct, &plain).unwrap();
        assert_eq!(&fx.decrypt(&diff)[..3], &[1, -9, 13]);
    }

    #[test]
    fn rejects_operands_at_different_levels() {
        let mut fx = fixture(27);
        let a = fx.encrypt(&[1]);
        let mut b = fx.encrypt(&[2]);
        // Forge a level mismatch.
        b.set_parms_id(fx.context.last_parms_id());
        assert!(matches!(
            fx.evaluator.add(&a, &b),
            Err(Error::IncompatibleCiphertext { .. })
        ));
    }
}
