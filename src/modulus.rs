//! Modulus values, security levels, and coefficient modulus factories.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::{is_prime, largest_ntt_prime_below};

// ─── Modulus ─────────────────────────────────────────────────────────────────

/// A single modulus value.
///
/// Coefficient moduli must be NTT-friendly primes, which the factories below
/// guarantee. Plain moduli only need to be at least 2; batching additionally
/// requires a prime congruent to 1 modulo `2 * degree`, produced by
/// [`PlainModulus::batching`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modulus {
    value: u64,
}

impl Modulus {
    pub fn new(value: u64) -> Result<Self> {
        if value < 2 {
            return Err(Error::invalid(format!("modulus value {value} is below 2")));
        }
        Ok(Self { value })
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn bit_count(&self) -> u32 {
        64 - self.value.leading_zeros()
    }

    pub fn is_prime(&self) -> bool {
        is_prime(self.value)
    }
}

// ─── SecurityLevel ───────────────────────────────────────────────────────────

/// Classical security target for the LWE estimator bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityLevel {
    /// No enforcement; any chain is accepted. Test use only.
    None,
    Tc128,
    Tc192,
    Tc256,
}

impl SecurityLevel {
    /// Largest permitted total coefficient modulus bit count for `degree`,
    /// or `None` when the degree is not in the standardized table.
    pub fn max_total_bits(&self, degree: u64) -> Option<u64> {
        let column = match self {
            SecurityLevel::None => return Some(u64::MAX),
            SecurityLevel::Tc128 => 0,
            SecurityLevel::Tc192 => 1,
            SecurityLevel::Tc256 => 2,
        };
        let row: [u64; 3] = match degree {
            1024 => [27, 19, 14],
            2048 => [54, 37, 29],
            4096 => [109, 75, 58],
            8192 => [218, 152, 118],
            16384 => [438, 305, 237],
            32768 => [881, 611, 476],
            _ => return None,
        };
        Some(row[column])
    }
}

// ─── CoefficientModulus ──────────────────────────────────────────────────────

/// Factories for coefficient modulus chains.
pub struct CoefficientModulus;

impl CoefficientModulus {
    /// Builds a chain of distinct NTT primes for `degree`, one per requested
    /// bit size, each prime having exactly that bit length.
    ///
    /// Repeated bit sizes receive distinct primes; occurrences of the same
    /// size are filled in ascending prime order left to right.
    pub fn create(degree: u64, bit_sizes: &[u32]) -> Result<Vec<Modulus>> {
        if bit_sizes.is_empty() {
            return Err(Error::invalid("no coefficient modulus bit sizes given"));
        }
        if !degree.is_power_of_two() || degree < 2 {
            return Err(Error::invalid(format!(
                "polynomial modulus degree {degree} is not a power of two"
            )));
        }
        if let Some(&bad) = bit_sizes.iter().find(|&&b| !(2..=60).contains(&b)) {
            return Err(Error::invalid(format!(
                "coefficient modulus bit size {bad} is outside [2, 60]"
            )));
        }

        let mut counts = std::collections::BTreeMap::new();
        for &size in bit_sizes {
            *counts.entry(size).or_insert(0usize) += 1;
        }

        // Per bit size, the needed number of largest primes, kept ascending.
        let mut pools = std::collections::BTreeMap::new();
        for (&size, &count) in &counts {
            let floor = 1u64 << (size - 1);
            let mut bound = 1u64 << size;
            let mut primes = Vec::with_capacity(count);
            for _ in 0..count {
                let prime = largest_ntt_prime_below(bound, degree)
                    .filter(|&p| p >= floor)
                    .ok_or_else(|| {
                        Error::invalid(format!(
                            "not enough {size}-bit NTT primes for degree {degree}"
                        ))
                    })?;
                primes.push(prime);
                bound = prime;
            }
            primes.reverse();
            pools.insert(size, primes.into_iter());
        }

        bit_sizes
            .iter()
            .map(|size| {
                let prime = pools
                    .get_mut(size)
                    .and_then(|pool| pool.next())
                    .ok_or_else(|| Error::invalid("prime pool exhausted"))?;
                Modulus::new(prime)
            })
            .collect()
    }

    /// Default chain for CKKS at `degree`; identical to [`Self::create`].
    pub fn ckks(degree: u64, bit_sizes: &[u32]) -> Result<Vec<Modulus>> {
        Self::create(degree, bit_sizes)
    }

    /// Standardized default chain for BFV at `degree` under `security`.
    pub fn bfv(degree: u64, security: SecurityLevel) -> Result<Vec<Modulus>> {
        let values: &[u64] = match (security, degree) {
            (SecurityLevel::None, _) => {
                return Err(Error::invalid(
                    "no default coefficient modulus without a security level",
                ));
            }
            (SecurityLevel::Tc128, 1024) => &[132120577],
            (SecurityLevel::Tc128, 2048) => &[18014398509404161],
            (SecurityLevel::Tc128, 4096) => &[68719230977, 68719403009, 137438822401],
            (SecurityLevel::Tc128, 8192) => &[
                8796092792833,
                8796092858369,
                17592184717313,
                17592185438209,
                17592186028033,
            ],
            (SecurityLevel::Tc128, 16384) => &[
                281474975662081,
                281474976317441,
                281474976546817,
                562949951619073,
                562949951881217,
                562949951979521,
                562949952274433,
                562949952700417,
                562949952798721,
            ],
            (SecurityLevel::Tc128, 32768) => &[
                2251799810670593,
                2251799811391489,
                2251799813554177,
                4503599610003457,
                4503599610265601,
                4503599613214721,
                4503599614328833,
                4503599614722049,
                4503599615311873,
                4503599616688129,
                4503599618260993,
                4503599619112961,
                4503599621472257,
                4503599623045121,
                4503599625404417,
                4503599625535489,
                4503599626321921,
            ],
            (SecurityLevel::Tc192, 1024) => &[520193],
            (SecurityLevel::Tc192, 2048) => &[137438822401],
            (SecurityLevel::Tc192, 4096) => &[137438822401, 274877816833],
            (SecurityLevel::Tc192, 8192) => &[1125899906826241, 2251799813472257, 2251799813554177],
            (SecurityLevel::Tc192, 16384) => &[
                1125899904679937,
                2251799809916929,
                2251799810605057,
                2251799810670593,
                2251799811391489,
                2251799813554177,
            ],
            (SecurityLevel::Tc192, 32768) => &[
                1125899904679937,
                2251799804313601,
                2251799805100033,
                2251799805165569,
                2251799806345217,
                2251799807131649,
                2251799809294337,
                2251799809884161,
                2251799810605057,
                2251799810670593,
                2251799811391489,
                2251799813554177,
            ],
            (SecurityLevel::Tc256, 1024) => &[12289],
            (SecurityLevel::Tc256, 2048) => &[536813569],
            (SecurityLevel::Tc256, 4096) => &[536690689, 536813569],
            (SecurityLevel::Tc256, 8192) => &[549755486209, 549755731969, 1099511480321],
            (SecurityLevel::Tc256, 16384) => &[
                140737486716929,
                140737487306753,
                140737488125953,
                281474976317441,
                281474976546817,
            ],
            (SecurityLevel::Tc256, 32768) => &[
                4503599626321921,
                9007199248777217,
                9007199249891329,
                9007199250087937,
                9007199250481153,
                9007199250874369,
                9007199251660801,
                9007199252119553,
                9007199252840449,
            ],
            _ => {
                return Err(Error::invalid(format!(
                    "no default coefficient modulus for degree {degree}"
                )));
            }
        };
        values.iter().map(|&v| Modulus::new(v)).collect()
    }

    /// Largest total bit count allowed for `degree` at `security`.
    pub fn max_bit_count(degree: u64, security: SecurityLevel) -> u64 {
        security.max_total_bits(degree).unwrap_or(0)
    }
}

// ─── PlainModulus ────────────────────────────────────────────────────────────

/// Factory for plaintext moduli.
pub struct PlainModulus;

impl PlainModulus {
    /// A `bit_size`-bit prime congruent to 1 modulo `2 * degree`, enabling
    /// slot batching at `degree`.
    pub fn batching(degree: u64, bit_size: u32) -> Result<Modulus> {
        if !(2..=60).contains(&bit_size) {
            return Err(Error::invalid(format!(
                "plain modulus bit size {bit_size} is outside [2, 60]"
            )));
        }
        let floor = 1u64 << (bit_size - 1);
        largest_ntt_prime_below(1u64 << bit_size, degree)
            .filter(|&p| p >= floor)
            .map(|p| Modulus { value: p })
            .ok_or_else(|| {
                Error::invalid(format!(
                    "no {bit_size}-bit batching prime for degree {degree}"
                ))
            })
    }
}
