//! Substate splitting of beta arrays
//!
//! Each dimension is handled on its own: a dimension whose length already
//! equals the label's split count is copied, one whose split count is
//! exactly double is duplicated, anything else is a shape fault. Child
//! dimensions share the original mass between the two duplicates and
//! perturb the pair by `(1 + r, 1 - r)`, so every row or plane stays a
//! normalized distribution while the siblings stop being identical.
//! A fresh `r` is drawn for every parent row, so the two copies of a split
//! parent carry different child perturbations.

use rand::Rng;

use super::{BinaryBeta, BinaryBetas, UnaryBeta, UnaryBetas};
use crate::state::SplitCounts;
use crate::util::LOG_ZERO;
use crate::InductionError;

fn split_factor(
    current: usize,
    target: usize,
    context: impl FnOnce() -> String,
) -> Result<usize, InductionError> {
    if target == current {
        Ok(1)
    } else if target == current * 2 {
        Ok(2)
    } else {
        Err(InductionError::ShapeMismatch {
            context: context(),
            expected: target,
            actual: current,
        })
    }
}

fn draw<R: Rng>(rng: &mut R, noise: f64) -> f64 {
    if noise > 0.0 {
        rng.gen_range(-noise..noise)
    } else {
        0.0
    }
}

/// Sibling weight for duplicate `which` (0 or 1) under perturbation `r`
#[inline]
fn sibling_weight(factor: usize, which: usize, r: f64) -> f64 {
    match (factor, which) {
        (1, _) => 1.0,
        (_, 0) => 1.0 + r,
        _ => 1.0 - r,
    }
}

/// Expand a unary beta to `[parent_target][child_target]`
pub fn split_unary_beta<R: Rng>(
    beta: &UnaryBeta,
    parent_target: usize,
    child_target: usize,
    noise: f64,
    rng: &mut R,
) -> Result<UnaryBeta, InductionError> {
    let (parents, children) = beta.shape();
    let fp = split_factor(parents, parent_target, || "unary beta parent dimension".to_string())?;
    let fc = split_factor(children, child_target, || "unary beta child dimension".to_string())?;

    let mut split = UnaryBeta::filled(parent_target, child_target, LOG_ZERO);
    let share = (fc as f64).ln();
    for i in 0..parent_target {
        for j in 0..children {
            let base = beta.get(i / fp, j);
            let r = if fc == 2 { draw(rng, noise) } else { 0.0 };
            for a in 0..fc {
                let value = base - share + sibling_weight(fc, a, r).ln();
                split.set(i, j * fc + a, value);
            }
        }
    }
    Ok(split)
}

/// Expand a binary beta to `[parent_target][left_target][right_target]`
pub fn split_binary_beta<R: Rng>(
    beta: &BinaryBeta,
    parent_target: usize,
    left_target: usize,
    right_target: usize,
    noise: f64,
    rng: &mut R,
) -> Result<BinaryBeta, InductionError> {
    let (parents, lefts, rights) = beta.shape();
    let fp = split_factor(parents, parent_target, || "binary beta parent dimension".to_string())?;
    let fl = split_factor(lefts, left_target, || "binary beta left dimension".to_string())?;
    let fr = split_factor(rights, right_target, || "binary beta right dimension".to_string())?;

    let mut split = BinaryBeta::filled(parent_target, left_target, right_target, LOG_ZERO);
    let share = ((fl * fr) as f64).ln();
    for i in 0..parent_target {
        for j in 0..lefts {
            for k in 0..rights {
                let base = beta.get(i / fp, j, k);
                let rl = if fl == 2 { draw(rng, noise) } else { 0.0 };
                let rr = if fr == 2 { draw(rng, noise) } else { 0.0 };
                for a in 0..fl {
                    for b in 0..fr {
                        let weight = sibling_weight(fl, a, rl) * sibling_weight(fr, b, rr);
                        split.set(i, j * fl + a, k * fr + b, base - share + weight.ln());
                    }
                }
            }
        }
    }
    Ok(split)
}

/// Expand every beta of both tables to the current split counts
pub fn split_betas<R: Rng>(
    unary: &mut UnaryBetas,
    binary: &mut BinaryBetas,
    counts: &SplitCounts,
    noise: f64,
    rng: &mut R,
) -> Result<(), InductionError> {
    for (parent, child, beta) in unary.iter_mut() {
        let split = split_unary_beta(
            beta,
            counts.split_count(parent),
            counts.split_count(child),
            noise,
            rng,
        )
        .map_err(|err| err.in_context(format!("{parent} -> {child}")))?;
        *beta = split;
    }
    for (parent, left, right, beta) in binary.iter_mut() {
        let split = split_binary_beta(
            beta,
            counts.split_count(parent),
            counts.split_count(left),
            counts.split_count(right),
            noise,
            rng,
        )
        .map_err(|err| err.in_context(format!("{parent} -> {left} {right}")))?;
        *beta = split;
    }
    Ok(())
}
