//! EM over latent substates
//!
//! One E-step runs inside-outside over every trainable tree and sums the
//! weighted posteriors into fresh temporary tables, a fresh lexicon and
//! per-substate state mass. The M-step is a row-wise (unary) or
//! plane-wise (binary) renormalization of those tables.

mod accumulate;

pub use accumulate::StateMass;
pub(crate) use accumulate::Accumulator;

use tracing::{debug, warn};

use crate::beta::{BinaryBetas, UnaryBetas};
use crate::inside_outside::InsideOutside;
use crate::lexicon::Lexicon;
use crate::session::InductionSession;
use crate::util::{log_sum_exp, log_uniform};
use crate::InductionError;

/// Result of one E-step
///
/// `unary` and `binary` hold log expected counts until
/// [`rescale_temporary_betas`] turns them into log probabilities.
#[derive(Debug, Clone)]
pub struct Expectations<L> {
    /// Temporary unary tables
    pub unary: UnaryBetas,
    /// Temporary binary tables
    pub binary: BinaryBetas,
    /// Expected substate occupancy per label
    pub state_mass: StateMass,
    /// Lexicon retrained on this step's preterminal posteriors
    pub lexicon: L,
    /// Weighted corpus log-likelihood under the model that produced the step
    pub log_likelihood: f64,
    /// Tree nodes whose marginal was `-inf`
    pub uniform_fallbacks: usize,
}

fn normalize_log_slice(slice: &mut [f64]) -> bool {
    let total = log_sum_exp(slice);
    if total.is_finite() {
        for value in slice.iter_mut() {
            *value -= total;
        }
        false
    } else {
        slice.fill(log_uniform(slice.len()));
        true
    }
}

/// Renormalize every unary row and binary plane to a log distribution
///
/// A row or plane without mass becomes uniform. Returns how many did.
pub fn rescale_temporary_betas(unary: &mut UnaryBetas, binary: &mut BinaryBetas) -> usize {
    let mut uniform = 0;
    for (_, _, beta) in unary.iter_mut() {
        for i in 0..beta.shape().0 {
            uniform += usize::from(normalize_log_slice(beta.row_mut(i)));
        }
    }
    for (_, _, _, beta) in binary.iter_mut() {
        for i in 0..beta.shape().0 {
            uniform += usize::from(normalize_log_slice(beta.plane_mut(i)));
        }
    }
    uniform
}

fn entries_converged(old: &[f64], new: &[f64], epsilon: f64) -> bool {
    old.iter().zip(new).all(|(&a, &b)| {
        if a == b {
            true
        } else {
            (a - b).abs() < epsilon
        }
    })
}

/// Whether every entry moved by less than `epsilon`
///
/// Two `-inf` entries count as equal. A production present in one table and
/// not the other, or with a different shape, is a [`InductionError::ShapeMismatch`].
pub fn betas_converged(
    old_unary: &UnaryBetas,
    old_binary: &BinaryBetas,
    new_unary: &UnaryBetas,
    new_binary: &BinaryBetas,
    epsilon: f64,
) -> Result<bool, InductionError> {
    if old_unary.len() != new_unary.len() {
        return Err(InductionError::ShapeMismatch {
            context: "unary productions, old vs new".to_string(),
            expected: old_unary.len(),
            actual: new_unary.len(),
        });
    }
    if old_binary.len() != new_binary.len() {
        return Err(InductionError::ShapeMismatch {
            context: "binary productions, old vs new".to_string(),
            expected: old_binary.len(),
            actual: new_binary.len(),
        });
    }

    let mut converged = true;
    for (parent, child, old) in old_unary.iter() {
        let context = || format!("unary beta {parent} -> {child}, old vs new");
        let new = new_unary
            .get(parent, child)
            .ok_or_else(|| InductionError::ShapeMismatch {
                context: context(),
                expected: old.values().len(),
                actual: 0,
            })?;
        if old.shape() != new.shape() {
            return Err(InductionError::ShapeMismatch {
                context: context(),
                expected: old.values().len(),
                actual: new.values().len(),
            });
        }
        converged &= entries_converged(old.values(), new.values(), epsilon);
    }
    for (parent, left, right, old) in old_binary.iter() {
        let context = || format!("binary beta {parent} -> {left} {right}, old vs new");
        let new = new_binary
            .get(parent, left, right)
            .ok_or_else(|| InductionError::ShapeMismatch {
                context: context(),
                expected: old.values().len(),
                actual: 0,
            })?;
        if old.shape() != new.shape() {
            return Err(InductionError::ShapeMismatch {
                context: context(),
                expected: old.values().len(),
                actual: new.values().len(),
            });
        }
        converged &= entries_converged(old.values(), new.values(), epsilon);
    }
    Ok(converged)
}

impl<L: Lexicon> InductionSession<L> {
    /// One E-step over the trainable corpus
    ///
    /// With `split_ongoing`, preterminal substates are scored through the
    /// pre-split lexicon entry and their posteriors are Laplace smoothed
    /// before the lexicon is retrained.
    pub fn recalculate_temporary_betas(
        &self,
        split_ongoing: bool,
    ) -> Result<Expectations<L>, InductionError> {
        let engine = InsideOutside::new(
            &self.split_counts,
            &self.unary_betas,
            &self.binary_betas,
            &self.lexicon,
        )
        .with_split_ongoing(split_ongoing);
        let smoothing = split_ongoing.then_some(self.config.split_smoothing);
        let mut accumulator = Accumulator::new(&self.split_counts, self.lexicon.fresh(), smoothing);

        for entry in self.corpus.trainable() {
            let scores = engine.recount_tree(&entry.tree)?;
            let posteriors = engine.recount_weights(&scores)?;
            accumulator.add_tree(&posteriors, entry.weight);
        }
        Ok(accumulator.finish())
    }

    /// Commit rescaled tables, the retrained lexicon and state mass
    ///
    /// With `test_converged` the new tables are first compared against the
    /// live ones; otherwise the result is always `false`.
    pub fn use_new_betas(
        &mut self,
        test_converged: bool,
        expectations: Expectations<L>,
    ) -> Result<bool, InductionError> {
        let converged = if test_converged {
            self.test_convergence(&expectations.unary, &expectations.binary)?
        } else {
            false
        };
        self.unary_betas = expectations.unary;
        self.binary_betas = expectations.binary;
        self.lexicon = expectations.lexicon;
        self.state_mass = expectations.state_mass;
        Ok(converged)
    }

    /// Compare candidate tables against the live ones
    pub fn test_convergence(
        &self,
        unary: &UnaryBetas,
        binary: &BinaryBetas,
    ) -> Result<bool, InductionError> {
        betas_converged(
            &self.unary_betas,
            &self.binary_betas,
            unary,
            binary,
            self.config.convergence_epsilon,
        )
    }

    /// Iterate E-step, rescale and commit until convergence or the cap
    ///
    /// Only the first iteration honours `split_ongoing`, and it never tests
    /// convergence.
    pub fn recalculate_betas(&mut self, split_ongoing: bool) -> Result<bool, InductionError> {
        let mut split_ongoing = split_ongoing;
        let mut converged = false;

        for iteration in 0..self.config.max_em_iterations {
            let mut expectations = self.recalculate_temporary_betas(split_ongoing)?;
            let rescaled_uniform =
                rescale_temporary_betas(&mut expectations.unary, &mut expectations.binary);
            let log_likelihood = expectations.log_likelihood;
            let uniform_fallbacks = expectations.uniform_fallbacks + rescaled_uniform;
            self.last_log_likelihood = log_likelihood;

            converged = self.use_new_betas(!split_ongoing, expectations)?;
            debug!(
                iteration,
                log_likelihood, converged, uniform_fallbacks, "EM iteration"
            );
            split_ongoing = false;
            if converged {
                break;
            }
        }

        if !converged {
            warn!(
                max_em_iterations = self.config.max_em_iterations,
                "EM stopped at the iteration cap without converging"
            );
        }
        Ok(converged)
    }
}
