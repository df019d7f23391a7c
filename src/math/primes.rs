//! Primality testing and deterministic NTT-prime search.
//!
//! The modulus factories need two things: a fast prime check for `u64`
//! candidates, and a search that always yields the same prime sequence for
//! the same inputs. Miller-Rabin with the fixed base set below is a
//! deterministic primality test over the full `u64` range
//! (source: https://miller-rabin.appspot.com/), and the search only ever
//! steps downward through the residue class `p = 1 (mod 2n)`.

// Deterministic for all n < 3.3 * 10^24, which covers every u64.
const MILLER_RABIN_BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

fn mul_mod(a: u64, b: u64, modulus: u64) -> u64 {
    debug_assert!(modulus > 0);
    ((a as u128 * b as u128) % modulus as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    debug_assert!(modulus > 0);
    if modulus == 1 {
        return 0;
    }
    let mut acc = 1 % modulus;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, modulus);
        }
        base = mul_mod(base, base, modulus);
        exp >>= 1;
    }
    acc
}

/// Returns `true` if `n` is prime (deterministic Miller-Rabin on `u64`).
///
/// Writes `n - 1 = d * 2^r` with odd `d`, then for each fixed base checks
/// whether `base^d` is `1` or `n - 1`, or reaches `n - 1` under repeated
/// squaring. A base failing both witnesses compositeness.
pub fn is_prime(n: u64) -> bool {
    match n {
        0 | 1 => return false,
        2 | 3 => return true,
        _ if n & 1 == 0 => return false,
        _ => {}
    }

    let r = (n - 1).trailing_zeros();
    let d = (n - 1) >> r;

    'bases: for &base in MILLER_RABIN_BASES.iter() {
        if base >= n {
            continue;
        }
        let mut x = pow_mod(base, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..r {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'bases;
            }
        }
        return false;
    }
    true
}

/// Returns `true` when `p` is prime and `p = 1 (mod 2n)`.
///
/// The congruence guarantees `Z_p` contains a primitive `2n`-th root of
/// unity, which the negacyclic NTT over `x^n + 1` requires.
#[inline]
pub fn is_ntt_friendly_prime(p: u64, n: u64) -> bool {
    debug_assert!(n > 0 && n.is_power_of_two());
    is_prime(p) && p % (2 * n) == 1
}

/// Returns the largest NTT-friendly prime `p < bound` for ring degree `n`,
/// or `None` if the residue class is exhausted first.
///
/// Only candidates `p = 1 (mod 2n)` are visited, so the result is a pure
/// function of `(bound, n)`.
pub fn largest_ntt_prime_below(bound: u64, n: u64) -> Option<u64> {
    assert!(n > 0 && n.is_power_of_two(), "degree must be a power of two");
    let step = n.checked_mul(2).expect("2 * degree must fit in u64");
    if bound <= step + 1 {
        return None;
    }

    // Align bound - 1 downward onto the residue class 1 (mod 2n).
    let mut candidate = bound - 1;
    candidate -= (candidate - 1) % step;

    loop {
        if candidate <= 2 {
            return None;
        }
        if is_prime(candidate) {
            return Some(candidate);
        }
        candidate = candidate.checked_sub(step)?;
    }
}
