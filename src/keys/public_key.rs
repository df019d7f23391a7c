//! The public encryption key.

use crate::context::ParmsId;
use crate::rns::RnsPoly;

/// An encryption of zero under the secret key: `b = -(a * s + e)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicKey {
    b: RnsPoly,
    a: RnsPoly,
    parms_id: ParmsId,
}

impl PublicKey {
    pub(crate) fn new(b: RnsPoly, a: RnsPoly, parms_id: ParmsId) -> Self {
        Self { b, a, parms_id }
    }

    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    pub(crate) fn b(&self) -> &RnsPoly {
        &self.b
    }

    pub(crate) fn a(&self) -> &RnsPoly {
        &self.a
    }
}
