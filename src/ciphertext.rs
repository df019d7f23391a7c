//! Ciphertexts.

use crate::context::ParmsId;
use crate::parameters::Scheme;
use crate::rns::RnsPoly;

/// An RLWE ciphertext: `size` polynomials at one chain level.
///
/// Fresh ciphertexts have size 2; each unrelinearized multiplication grows the
/// size by one. Polynomials are kept in coefficient domain at rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Ciphertext {
    polys: Vec<RnsPoly>,
    parms_id: ParmsId,
    scale: f64,
    scheme: Scheme,
}

impl Ciphertext {
    pub(crate) fn new(polys: Vec<RnsPoly>, parms_id: ParmsId, scale: f64, scheme: Scheme) -> Self {
        debug_assert!(polys.len() >= 2);
        debug_assert!(polys.iter().all(|p| !p.in_ntt_domain()));
        Self {
            polys,
            parms_id,
            scale,
            scheme,
        }
    }

    /// Number of component polynomials.
    pub fn size(&self) -> usize {
        self.polys.len()
    }

    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    /// The CKKS scale; 1 for BFV.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub(crate) fn polys(&self) -> &[RnsPoly] {
        &self.polys
    }

    pub(crate) fn polys_mut(&mut self) -> &mut [RnsPoly] {
        &mut self.polys
    }

    pub(crate) fn into_polys(self) -> Vec<RnsPoly> {
        self.polys
    }

    pub(crate) fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    pub(crate) fn set_parms_id(&mut self, parms_id: ParmsId) {
        self.parms_id = parms_id;
    }
}
