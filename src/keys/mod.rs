//! Key material: secret, public, relinearization, and Galois keys.

mod generator;
mod public_key;
mod secret_key;
mod switch_key;

pub use generator::{KeyGenParams, KeyGenerator};
pub use public_key::PublicKey;
pub use secret_key::SecretKey;
pub use switch_key::{GaloisKey, KeySwitchKey, RelinearizationKey};
