//! Induction parameters
//!
//! All knobs of a split-merge run live in one plain struct with chained
//! `with_*` setters. `validate` runs before a session starts.

use crate::InductionError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default boundary sentinel tag
pub const DEFAULT_BOUNDARY_TAG: &str = ".$$.";

/// Default start symbol
pub const DEFAULT_START_SYMBOL: &str = "ROOT";

/// Configuration parameters for grammar induction
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InductionConfig {
    /// Number of split/merge rounds
    pub split_count: usize,

    /// Fraction of newly split substates merged back each round (0 disables merging)
    pub split_recombine_rate: f64,

    /// EM stops once every beta entry moves less than this (log space)
    pub convergence_epsilon: f64,

    /// Hard cap on EM iterations per re-estimation
    pub max_em_iterations: usize,

    /// Rules at or below this probability are dropped from the final grammar
    pub rule_pruning_epsilon: f64,

    /// Labels that are never split
    pub start_symbols: Vec<String>,

    /// Boundary sentinel tag, never split and never merged
    pub boundary_tag: String,

    /// Amplitude of the symmetric perturbation between split siblings
    pub split_noise: f64,

    /// Laplace weight on preterminal posteriors right after a split
    pub split_smoothing: f64,

    /// Seed for split perturbation
    pub seed: u64,
}

impl Default for InductionConfig {
    fn default() -> Self {
        Self {
            split_count: 2,
            split_recombine_rate: 0.0,
            convergence_epsilon: 1e-4,
            max_em_iterations: 20,
            rule_pruning_epsilon: 1e-6,
            start_symbols: vec![DEFAULT_START_SYMBOL.to_string()],
            boundary_tag: DEFAULT_BOUNDARY_TAG.to_string(),
            split_noise: 0.01,
            split_smoothing: 0.01,
            seed: 0x5eed_1a7e_9c0f_u64,
        }
    }
}

impl InductionConfig {
    /// Set number of split/merge rounds
    pub fn with_split_count(mut self, split_count: usize) -> Self {
        self.split_count = split_count;
        self
    }

    /// Set merge-back fraction
    pub fn with_split_recombine_rate(mut self, rate: f64) -> Self {
        self.split_recombine_rate = rate;
        self
    }

    /// Set EM convergence epsilon
    pub fn with_convergence_epsilon(mut self, epsilon: f64) -> Self {
        self.convergence_epsilon = epsilon;
        self
    }

    /// Set EM iteration cap
    pub fn with_max_em_iterations(mut self, iterations: usize) -> Self {
        self.max_em_iterations = iterations;
        self
    }

    /// Set rule pruning epsilon
    pub fn with_rule_pruning_epsilon(mut self, epsilon: f64) -> Self {
        self.rule_pruning_epsilon = epsilon;
        self
    }

    /// Replace the start symbol set
    pub fn with_start_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.start_symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// Set boundary tag
    pub fn with_boundary_tag(mut self, tag: impl Into<String>) -> Self {
        self.boundary_tag = tag.into();
        self
    }

    /// Set split perturbation amplitude
    pub fn with_split_noise(mut self, noise: f64) -> Self {
        self.split_noise = noise;
        self
    }

    /// Set post-split Laplace weight
    pub fn with_split_smoothing(mut self, smoothing: f64) -> Self {
        self.split_smoothing = smoothing;
        self
    }

    /// Set perturbation seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject parameter combinations the trainer cannot run with
    pub fn validate(&self) -> Result<(), InductionError> {
        if !(0.0..=1.0).contains(&self.split_recombine_rate) {
            return Err(InductionError::InvalidConfiguration(format!(
                "split recombine rate must be in [0, 1], got {}",
                self.split_recombine_rate
            )));
        }
        if self.max_em_iterations == 0 {
            return Err(InductionError::InvalidConfiguration(
                "max EM iterations must be > 0".to_string(),
            ));
        }
        if !self.convergence_epsilon.is_finite() || self.convergence_epsilon <= 0.0 {
            return Err(InductionError::InvalidConfiguration(format!(
                "convergence epsilon must be positive and finite, got {}",
                self.convergence_epsilon
            )));
        }
        if !self.rule_pruning_epsilon.is_finite() || self.rule_pruning_epsilon < 0.0 {
            return Err(InductionError::InvalidConfiguration(format!(
                "rule pruning epsilon must be non-negative and finite, got {}",
                self.rule_pruning_epsilon
            )));
        }
        // Noise of 1 or more could drive a split sibling to zero or negative mass
        if !(0.0..1.0).contains(&self.split_noise) {
            return Err(InductionError::InvalidConfiguration(format!(
                "split noise must be in [0, 1), got {}",
                self.split_noise
            )));
        }
        if !self.split_smoothing.is_finite() || self.split_smoothing < 0.0 {
            return Err(InductionError::InvalidConfiguration(format!(
                "split smoothing must be non-negative and finite, got {}",
                self.split_smoothing
            )));
        }
        if self.boundary_tag.is_empty() {
            return Err(InductionError::InvalidConfiguration(
                "boundary tag must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
