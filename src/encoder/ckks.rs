//! Approximate encoder for CKKS.
//!
//! Vectors of up to `n / 2` complex values are mapped onto the canonical
//! embedding of `Z[x]/(x^n + 1)`: slot `h` is the evaluation of the plaintext
//! polynomial at a fixed primitive `2n`-th root of unity. The transform is a
//! half-size FFT with a twist by powers of `psi = e^{i pi / n}`, so slot-wise
//! sums and products of slots correspond to ring operations.

use std::sync::Arc;

use num_complex::Complex64;
use num_traits::ToPrimitive;
use rustfft::{Fft, FftPlanner};

use crate::context::{Context, ParmsId};
use crate::error::{Error, Result};
use crate::parameters::Scheme;
use crate::plaintext::Plaintext;
use crate::rns::RnsPoly;

pub struct CkksEncoder {
    context: Context,
    fft_forward: Arc<dyn Fft<f64>>,
    fft_inverse: Arc<dyn Fft<f64>>,
    /// `psi^j` for `j` in `0..n/2`.
    psi_powers: Vec<Complex64>,
}

impl CkksEncoder {
    /// Fails unless the context is CKKS.
    pub fn new(context: &Context) -> Result<Self> {
        if context.encryption_parameters().scheme() != Scheme::Ckks {
            return Err(Error::invalid("approximate encoding requires a CKKS context"));
        }
        let degree = context.encryption_parameters().poly_modulus_degree() as usize;
        let half = degree / 2;
        let mut planner = FftPlanner::new();
        let psi_powers = (0..half)
            .map(|j| Complex64::from_polar(1.0, std::f64::consts::PI * j as f64 / degree as f64))
            .collect();
        Ok(Self {
            context: context.clone(),
            fft_forward: planner.plan_fft_forward(half),
            fft_inverse: planner.plan_fft_inverse(half),
            psi_powers,
        })
    }

    /// Number of slots, half the polynomial modulus degree.
    pub fn slot_count(&self) -> usize {
        self.psi_powers.len()
    }

    /// Encodes real values at the key level.
    pub fn encode(&self, values: &[f64], scale: f64) -> Result<Plaintext> {
        let slots: Vec<Complex64> = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        self.encode_complex_at(&slots, scale, &self.context.key_parms_id())
    }

    /// Encodes complex values at the key level.
    pub fn encode_complex(&self, values: &[Complex64], scale: f64) -> Result<Plaintext> {
        self.encode_complex_at(values, scale, &self.context.key_parms_id())
    }

    /// Encodes real values at the level identified by `parms_id`, for use as
    /// an operand against a mod-switched or rescaled ciphertext.
    pub fn encode_at(&self, values: &[f64], scale: f64, parms_id: &ParmsId) -> Result<Plaintext> {
        let slots: Vec<Complex64> = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        self.encode_complex_at(&slots, scale, parms_id)
    }

    pub fn encode_complex_at(
        &self,
        values: &[Complex64],
        scale: f64,
        parms_id: &ParmsId,
    ) -> Result<Plaintext> {
        let half = self.slot_count();
        if values.len() > half {
            return Err(Error::EncodeOverflow {
                reason: format!("{} values exceed the {half} available slots", values.len()),
            });
        }
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::invalid(format!("scale {scale} must be positive")));
        }
        let data = self.context.context_data(parms_id).ok_or_else(|| {
            Error::invalid("parms_id does not identify a level of this context")
        })?;

        let mut buf = vec![Complex64::default(); half];
        for (slot, &value) in buf.iter_mut().zip(values) {
            *slot = value * scale;
        }
        self.fft_forward.process(&mut buf);

        let norm = 2.0 / (2 * half) as f64;
        let mut coeffs = vec![0i64; 2 * half];
        for (j, c) in buf.iter().enumerate() {
            let twisted = c * norm * self.psi_powers[j].conj();
            let re = twisted.re.round();
            let im = twisted.im.round();
            if re.abs() >= (i64::MAX / 2) as f64 || im.abs() >= (i64::MAX / 2) as f64 {
                return Err(Error::EncodeOverflow {
                    reason: format!("scale {scale} drives coefficients out of range"),
                });
            }
            coeffs[j] = re as i64;
            coeffs[j + half] = im as i64;
        }

        let poly = RnsPoly::from_signed_coeffs(Arc::clone(data.basis()), &coeffs);
        Ok(Plaintext::new_ckks(poly, *parms_id, scale))
    }

    /// Decodes the real parts of the slots.
    pub fn decode(&self, plaintext: &Plaintext) -> Result<Vec<f64>> {
        Ok(self
            .decode_complex(plaintext)?
            .into_iter()
            .map(|c| c.re)
            .collect())
    }

    pub fn decode_complex(&self, plaintext: &Plaintext) -> Result<Vec<Complex64>> {
        let (poly, parms_id, scale) = plaintext.as_ckks().ok_or_else(|| {
            Error::invalid("plaintext was not produced by a CKKS encoder")
        })?;
        if self.context.context_data(&parms_id).is_none() {
            return Err(Error::invalid(
                "plaintext level is not part of this context",
            ));
        }
        let half = self.slot_count();
        let coeffs = poly.to_centered_bigints();
        debug_assert_eq!(coeffs.len(), 2 * half);

        let mut buf = vec![Complex64::default(); half];
        for (j, slot) in buf.iter_mut().enumerate() {
            let re = coeffs[j].to_f64().unwrap_or_default();
            let im = coeffs[j + half].to_f64().unwrap_or_default();
            *slot = Complex64::new(re, im) * self.psi_powers[j];
        }
        self.fft_inverse.process(&mut buf);

        Ok(buf.into_iter().map(|c| c / scale).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulus::{CoefficientModulus, SecurityLevel};
    use crate::parameters::CkksEncryptionParametersBuilder;
    use approx::assert_relative_eq;

    fn tiny_context() -> Context {
        let parms = CkksEncryptionParametersBuilder::new()
            .set_poly_modulus_degree(1024)
            .set_coefficient_modulus(CoefficientModulus::ckks(1024, &[20, 20, 20]).unwrap())
            .build()
            .unwrap();
        Context::new(&parms, true, SecurityLevel::None).unwrap()
    }

    #[test]
    fn real_roundtrip_is_close() {
        let encoder = CkksEncoder::new(&tiny_context()).unwrap();
        let values = vec![1.5, -2.25, 3.0, 0.0, 0.125, -0.5];
        let plaintext = encoder.encode(&values, (1u64 << 30) as f64).unwrap();
        let decoded = encoder.decode(&plaintext).unwrap();
        assert_eq!(decoded.len(), encoder.slot_count());
        for (got, want) in decoded.iter().zip(&values) {
            assert_relative_eq!(*got, *want, epsilon = 1e-6);
        }
        for &tail in &decoded[values.len()..] {
            assert_relative_eq!(tail, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn complex_roundtrip_is_close() {
        let encoder = CkksEncoder::new(&tiny_context()).unwrap();
        let values = vec![
            Complex64::new(0.5, -1.5),
            Complex64::new(-2.0, 0.25),
            Complex64::new(3.125, 2.0),
        ];
        let plaintext = encoder
            .encode_complex(&values, (1u64 << 30) as f64)
            .unwrap();
        let decoded = encoder.decode_complex(&plaintext).unwrap();
        for (got, want) in decoded.iter().zip(&values) {
            assert_relative_eq!(got.re, want.re, epsilon = 1e-6);
            assert_relative_eq!(got.im, want.im, epsilon = 1e-6);
        }
    }

    #[test]
    fn slots_multiply_when_polynomials_multiply() {
        let context = tiny_context();
        let encoder = CkksEncoder::new(&context).unwrap();
        let scale = (1u64 << 20) as f64;
        let a_slots = vec![1.0, -0.5, 2.0, 0.75];
        let b_slots = vec![2.0, 4.0, -1.5, 0.5];
        let a = encoder.encode(&a_slots, scale).unwrap();
        let b = encoder.encode(&b_slots, scale).unwrap();

        let (a_poly, parms_id, _) = a.as_ckks().unwrap();
        let (b_poly, _, _) = b.as_ckks().unwrap();
        let product = Plaintext::new_ckks(a_poly.ntt_mul(b_poly), parms_id, scale * scale);

        let decoded = encoder.decode(&product).unwrap();
        for (i, (&x, &y)) in a_slots.iter().zip(&b_slots).enumerate() {
            assert_relative_eq!(decoded[i], x * y, epsilon = 1e-3);
        }
    }

    #[test]
    fn rejects_too_many_values_and_bad_scale() {
        let encoder = CkksEncoder::new(&tiny_context()).unwrap();
        let too_many = vec![1.0; encoder.slot_count() + 1];
        assert!(matches!(
            encoder.encode(&too_many, 1024.0),
            Err(Error::EncodeOverflow { .. })
        ));
        assert!(encoder.encode(&[1.0], -1.0).is_err());
        assert!(encoder.encode(&[1.0], f64::NAN).is_err());
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(24))]

        #[test]
        fn any_small_vector_roundtrips_within_scale_precision(
            values in proptest::collection::vec(-100.0f64..100.0, 1..16),
        ) {
            let encoder = CkksEncoder::new(&tiny_context()).unwrap();
            let plaintext = encoder.encode(&values, (1u64 << 30) as f64).unwrap();
            let decoded = encoder.decode(&plaintext).unwrap();
            for (got, want) in decoded.iter().zip(&values) {
                proptest::prop_assert!((got - want).abs() < 1e-5);
            }
        }
    }
}
