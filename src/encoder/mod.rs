//! Plaintext encoders.

mod bfv;
mod ckks;

pub use bfv::BfvEncoder;
pub use ckks::CkksEncoder;
