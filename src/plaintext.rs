//! Encoded plaintexts.

use crate::context::ParmsId;
use crate::rns::RnsPoly;

/// A plaintext polynomial produced by one of the encoders.
///
/// BFV plaintexts live in `Z_t[x]/(x^n + 1)` and are independent of the chain
/// level; CKKS plaintexts are already lifted into the RNS basis of a specific
/// level and carry their encoding scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Plaintext {
    repr: PlainRepr,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PlainRepr {
    Bfv {
        coeffs: Vec<u64>,
        plain_modulus: u64,
    },
    Ckks {
        poly: RnsPoly,
        parms_id: ParmsId,
        scale: f64,
    },
}

impl Plaintext {
    pub(crate) fn new_bfv(coeffs: Vec<u64>, plain_modulus: u64) -> Self {
        debug_assert!(coeffs.iter().all(|&c| c < plain_modulus));
        Self {
            repr: PlainRepr::Bfv {
                coeffs,
                plain_modulus,
            },
        }
    }

    pub(crate) fn new_ckks(poly: RnsPoly, parms_id: ParmsId, scale: f64) -> Self {
        Self {
            repr: PlainRepr::Ckks {
                poly,
                parms_id,
                scale,
            },
        }
    }

    /// The encoding scale; 1 for BFV plaintexts.
    pub fn scale(&self) -> f64 {
        match &self.repr {
            PlainRepr::Bfv { .. } => 1.0,
            PlainRepr::Ckks { scale, .. } => *scale,
        }
    }

    /// The chain level a CKKS plaintext was encoded at.
    pub fn parms_id(&self) -> Option<ParmsId> {
        match &self.repr {
            PlainRepr::Bfv { .. } => None,
            PlainRepr::Ckks { parms_id, .. } => Some(*parms_id),
        }
    }

    pub(crate) fn repr(&self) -> &PlainRepr {
        &self.repr
    }

    pub(crate) fn as_bfv(&self) -> Option<(&[u64], u64)> {
        match &self.repr {
            PlainRepr::Bfv {
                coeffs,
                plain_modulus,
            } => Some((coeffs, *plain_modulus)),
            PlainRepr::Ckks { .. } => None,
        }
    }

    pub(crate) fn as_ckks(&self) -> Option<(&RnsPoly, ParmsId, f64)> {
        match &self.repr {
            PlainRepr::Bfv { .. } => None,
            PlainRepr::Ckks {
                poly,
                parms_id,
                scale,
            } => Some((poly, *parms_id, *scale)),
        }
    }
}
