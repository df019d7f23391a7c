//! Error and result types shared across the crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while building parameters, encoding,
/// encrypting, evaluating, or deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A builder was finalized without a required field.
    #[error("missing required parameter `{field}`")]
    MissingParameter { field: &'static str },

    /// A parameter value is outside its admissible range.
    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    /// Input values cannot be represented in the plaintext space.
    #[error("encoding overflow: {reason}")]
    EncodeOverflow { reason: String },

    /// Operands belong to different parameter sets, levels, or scales.
    #[error("incompatible ciphertext: {reason}")]
    IncompatibleCiphertext { reason: String },

    /// The invariant noise has swallowed the message.
    #[error("noise budget exhausted")]
    NoiseBudgetExhausted,

    /// Serialized bytes are corrupt or inconsistent with the context.
    #[error("deserialization failed: {reason}")]
    Deserialization { reason: String },
}

impl Error {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            reason: reason.into(),
        }
    }

    pub(crate) fn incompatible(reason: impl Into<String>) -> Self {
        Error::IncompatibleCiphertext {
            reason: reason.into(),
        }
    }

    pub(crate) fn deserialization(reason: impl Into<String>) -> Self {
        Error::Deserialization {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_their_payload() {
        let err = Error::invalid("degree 100 is not a power of two");
        assert_eq!(
            err.to_string(),
            "invalid parameter: degree 100 is not a power of two"
        );
        let err = Error::MissingParameter {
            field: "plain_modulus",
        };
        assert!(err.to_string().contains("plain_modulus"));
    }
}
