//! Number-theoretic support: primality, NTT tables, coefficient sampling.

pub mod ntt;
pub mod primes;
pub mod sampling;

pub use ntt::NttTable;
pub use primes::{is_ntt_friendly_prime, is_prime, largest_ntt_prime_below};
