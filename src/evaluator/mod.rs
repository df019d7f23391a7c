//! Homomorphic evaluation.

mod batched;
mod bfv;
mod ckks;

pub use batched::{
    BatchDecryptor, BatchEncryptor, CiphertextBatch, CkksBatchEncoder, CkksBatchEvaluator,
    PlaintextBatch,
};
pub use bfv::BfvEvaluator;
pub use ckks::CkksEvaluator;

use crate::ciphertext::Ciphertext;
use crate::error::{Error, Result};
use crate::parameters::Scheme;
use crate::rns::RnsPoly;

/// Checks that two ciphertexts can be combined component-wise.
fn check_compatible(a: &Ciphertext, b: &Ciphertext) -> Result<()> {
    if a.scheme() != b.scheme() {
        return Err(Error::incompatible("ciphertexts use different schemes"));
    }
    if a.parms_id() != b.parms_id() {
        return Err(Error::incompatible(
            "ciphertexts live at different chain levels",
        ));
    }
    if a.scheme() == Scheme::Ckks && !scales_match(a.scale(), b.scale()) {
        return Err(Error::incompatible(format!(
            "ciphertext scales {} and {} do not match",
            a.scale(),
            b.scale()
        )));
    }
    Ok(())
}

fn scales_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}

fn negate(ciphertext: &Ciphertext) -> Ciphertext {
    let polys = ciphertext.polys().iter().map(|p| -p.clone()).collect();
    Ciphertext::new(
        polys,
        ciphertext.parms_id(),
        ciphertext.scale(),
        ciphertext.scheme(),
    )
}

/// Component-wise sum; the shorter ciphertext is implicitly zero-padded.
fn add(a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
    check_compatible(a, b)?;
    let (longer, shorter) = if a.size() >= b.size() { (a, b) } else { (b, a) };
    let mut polys: Vec<RnsPoly> = longer.polys().to_vec();
    for (acc, p) in polys.iter_mut().zip(shorter.polys()) {
        *acc += p;
    }
    Ok(Ciphertext::new(polys, a.parms_id(), a.scale(), a.scheme()))
}

fn sub(a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
    add(a, &negate(b))
}

fn add_many(ciphertexts: &[Ciphertext]) -> Result<Ciphertext> {
    let (first, rest) = ciphertexts
        .split_first()
        .ok_or_else(|| Error::invalid("cannot sum an empty list of ciphertexts"))?;
    rest.iter().try_fold(first.clone(), |acc, ct| add(&acc, ct))
}

/// Switches the quadratic component of a size-3 ciphertext back onto `s`.
fn relinearize(
    ciphertext: &Ciphertext,
    key: &crate::keys::RelinearizationKey,
    pool: &crate::memory::MemoryPool,
) -> Result<Ciphertext> {
    if ciphertext.size() != 3 {
        return Err(Error::invalid(format!(
            "relinearization expects a size-3 ciphertext, got size {}",
            ciphertext.size()
        )));
    }
    let switch_key = key.key_for(&ciphertext.parms_id()).ok_or_else(|| {
        Error::incompatible("no relinearization key covers this chain level")
    })?;
    let (d0, d1) = switch_key.apply(&ciphertext.polys()[2], pool);
    let mut c0 = ciphertext.polys()[0].clone();
    c0 += &d0;
    let mut c1 = ciphertext.polys()[1].clone();
    c1 += &d1;
    Ok(Ciphertext::new(
        vec![c0, c1],
        ciphertext.parms_id(),
        ciphertext.scale(),
        ciphertext.scheme(),
    ))
}

/// The tensor product `(sum_i c_i y^i)(sum_j d_j y^j)` over NTT channels.
///
/// Valid for CKKS, where no cross-channel scaling is needed. Inputs and
/// outputs are in coefficient domain.
fn ntt_tensor(a: &[RnsPoly], b: &[RnsPoly]) -> Vec<RnsPoly> {
    let mut a_ntt: Vec<RnsPoly> = a.to_vec();
    let mut b_ntt: Vec<RnsPoly> = b.to_vec();
    for p in a_ntt.iter_mut().chain(b_ntt.iter_mut()) {
        p.to_ntt_domain();
    }

    let basis = a[0].basis();
    let mut out: Vec<RnsPoly> = (0..a.len() + b.len() - 1)
        .map(|_| RnsPoly::zero_ntt(std::sync::Arc::clone(basis)))
        .collect();
    for (i, ai) in a_ntt.iter().enumerate() {
        for (j, bj) in b_ntt.iter().enumerate() {
            let mut term = ai.clone();
            term.pointwise_mul_assign(bj);
            out[i + j] += &term;
        }
    }
    for p in out.iter_mut() {
        p.to_coeff_domain();
    }
    out
}
