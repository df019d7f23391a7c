//! Encryption parameter sets and their builders.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::modulus::Modulus;

/// Which homomorphic scheme a parameter set targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    /// Exact arithmetic over integers modulo the plain modulus.
    Bfv,
    /// Approximate arithmetic over complex fixed-point values.
    Ckks,
}

/// A validated set of encryption parameters.
///
/// Construct through [`BfvEncryptionParametersBuilder`] or
/// [`CkksEncryptionParametersBuilder`]; the builders enforce that every
/// scheme-mandatory field is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionParameters {
    scheme: Scheme,
    poly_modulus_degree: u64,
    coeff_modulus: Vec<Modulus>,
    plain_modulus: Option<Modulus>,
}

impl EncryptionParameters {
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn poly_modulus_degree(&self) -> u64 {
        self.poly_modulus_degree
    }

    pub fn coeff_modulus(&self) -> &[Modulus] {
        &self.coeff_modulus
    }

    /// The plain modulus; always present for BFV, never for CKKS.
    pub fn plain_modulus(&self) -> Option<Modulus> {
        self.plain_modulus
    }

    /// Parameters identical to these but with a truncated modulus chain.
    pub(crate) fn with_coeff_modulus(&self, coeff_modulus: Vec<Modulus>) -> Self {
        Self {
            coeff_modulus,
            ..self.clone()
        }
    }
}

fn validate_degree(degree: u64) -> Result<()> {
    if !degree.is_power_of_two() || !(8..=65536).contains(&degree) {
        return Err(Error::invalid(format!(
            "polynomial modulus degree {degree} must be a power of two in [8, 65536]"
        )));
    }
    Ok(())
}

// ─── Builders ────────────────────────────────────────────────────────────────

/// Plain modulus given either as a validated [`Modulus`] or a raw constant.
///
/// The constant form is resolved into a `Modulus` once, at `build()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlainModulusInput {
    Modulus(Modulus),
    Constant(u64),
}

impl From<Modulus> for PlainModulusInput {
    fn from(modulus: Modulus) -> Self {
        PlainModulusInput::Modulus(modulus)
    }
}

impl From<u64> for PlainModulusInput {
    fn from(constant: u64) -> Self {
        PlainModulusInput::Constant(constant)
    }
}

impl PlainModulusInput {
    fn resolve(self) -> Result<Modulus> {
        match self {
            PlainModulusInput::Modulus(modulus) => Ok(modulus),
            PlainModulusInput::Constant(constant) => Modulus::new(constant),
        }
    }
}

/// Builder for BFV parameter sets.
#[derive(Debug, Default)]
pub struct BfvEncryptionParametersBuilder {
    poly_modulus_degree: Option<u64>,
    coeff_modulus: Option<Vec<Modulus>>,
    plain_modulus: Option<PlainModulusInput>,
}

impl BfvEncryptionParametersBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_poly_modulus_degree(mut self, degree: u64) -> Self {
        self.poly_modulus_degree = Some(degree);
        self
    }

    pub fn set_coefficient_modulus(mut self, coeff_modulus: Vec<Modulus>) -> Self {
        self.coeff_modulus = Some(coeff_modulus);
        self
    }

    pub fn set_plain_modulus(mut self, plain_modulus: impl Into<PlainModulusInput>) -> Self {
        self.plain_modulus = Some(plain_modulus.into());
        self
    }

    pub fn build(self) -> Result<EncryptionParameters> {
        let poly_modulus_degree = self
            .poly_modulus_degree
            .ok_or(Error::MissingParameter {
                field: "poly_modulus_degree",
            })?;
        validate_degree(poly_modulus_degree)?;
        let coeff_modulus = self.coeff_modulus.ok_or(Error::MissingParameter {
            field: "coeff_modulus",
        })?;
        if coeff_modulus.is_empty() {
            return Err(Error::invalid("coefficient modulus chain is empty"));
        }
        let plain_modulus = self
            .plain_modulus
            .ok_or(Error::MissingParameter {
                field: "plain_modulus",
            })?
            .resolve()?;
        Ok(EncryptionParameters {
            scheme: Scheme::Bfv,
            poly_modulus_degree,
            coeff_modulus,
            plain_modulus: Some(plain_modulus),
        })
    }
}

/// Builder for CKKS parameter sets. CKKS carries no plain modulus.
#[derive(Debug, Default)]
pub struct CkksEncryptionParametersBuilder {
    poly_modulus_degree: Option<u64>,
    coeff_modulus: Option<Vec<Modulus>>,
}

impl CkksEncryptionParametersBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_poly_modulus_degree(mut self, degree: u64) -> Self {
        self.poly_modulus_degree = Some(degree);
        self
    }

    pub fn set_coefficient_modulus(mut self, coeff_modulus: Vec<Modulus>) -> Self {
        self.coeff_modulus = Some(coeff_modulus);
        self
    }

    pub fn build(self) -> Result<EncryptionParameters> {
        let poly_modulus_degree = self
            .poly_modulus_degree
            .ok_or(Error::MissingParameter {
                field: "poly_modulus_degree",
            })?;
        validate_degree(poly_modulus_degree)?;
        let coeff_modulus = self.coeff_modulus.ok_or(Error::MissingParameter {
            field: "coeff_modulus",
        })?;
        if coeff_modulus.is_empty() {
            return Err(Error::invalid("coefficient modulus chain is empty"));
        }
        Ok(EncryptionParameters {
            scheme: Scheme::Ckks,
            poly_modulus_degree,
            coeff_modulus,
            plain_modulus: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulus::{CoefficientModulus, SecurityLevel};

    #[test]
    fn bfv_builder_requires_every_field() {
        let err = BfvEncryptionParametersBuilder::new()
            .set_poly_modulus_degree(1024)
            .set_coefficient_modulus(
                CoefficientModulus::bfv(1024, SecurityLevel::Tc128).unwrap(),
            )
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingParameter {
                field: "plain_modulus"
            }
        ));
    }

    #[test]
    fn bfv_builder_assembles_parameters() {
        let params = BfvEncryptionParametersBuilder::new()
            .set_poly_modulus_degree(1024)
            .set_coefficient_modulus(
                CoefficientModulus::bfv(1024, SecurityLevel::Tc128).unwrap(),
            )
            .set_plain_modulus(Modulus::new(1234).unwrap())
            .build()
            .unwrap();
        assert_eq!(params.scheme(), Scheme::Bfv);
        assert_eq!(params.poly_modulus_degree(), 1024);
        assert_eq!(params.plain_modulus().unwrap().value(), 1234);
    }

    #[test]
    fn bfv_builder_accepts_a_raw_plain_modulus_constant() {
        let params = BfvEncryptionParametersBuilder::new()
            .set_poly_modulus_degree(1024)
            .set_coefficient_modulus(
                CoefficientModulus::bfv(1024, SecurityLevel::Tc128).unwrap(),
            )
            .set_plain_modulus(1234u64)
            .build()
            .unwrap();
        assert_eq!(params.plain_modulus().unwrap().value(), 1234);

        // The constant still goes through Modulus validation.
        let err = BfvEncryptionParametersBuilder::new()
            .set_poly_modulus_degree(1024)
            .set_coefficient_modulus(
                CoefficientModulus::bfv(1024, SecurityLevel::Tc128).unwrap(),
            )
            .set_plain_modulus(0u64)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn ckks_builder_has_no_plain_modulus() {
        let params = CkksEncryptionParametersBuilder::new()
            .set_poly_modulus_degree(8192)
            .set_coefficient_modulus(
                CoefficientModulus::ckks(8192, &[50, 30, 30, 50, 50]).unwrap(),
            )
            .build()
            .unwrap();
        assert_eq!(params.scheme(), Scheme::Ckks);
        assert!(params.plain_modulus().is_none());
    }

    #[test]
    fn rejects_non_power_of_two_degree() {
        let err = CkksEncryptionParametersBuilder::new()
            .set_poly_modulus_degree(3000)
            .set_coefficient_modulus(CoefficientModulus::create(4096, &[40]).unwrap())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }
}
