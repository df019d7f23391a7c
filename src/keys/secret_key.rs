//! The secret key.

use crate::context::ParmsId;
use crate::rns::RnsPoly;

/// A ternary secret polynomial at the key level.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretKey {
    s: RnsPoly,
    parms_id: ParmsId,
}

impl SecretKey {
    pub(crate) fn new(s: RnsPoly, parms_id: ParmsId) -> Self {
        debug_assert!(!s.in_ntt_domain());
        Self { s, parms_id }
    }

    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    pub(crate) fn poly(&self) -> &RnsPoly {
        &self.s
    }
}
