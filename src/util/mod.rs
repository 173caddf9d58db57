//! Utility functions
//!
//! Log-space arithmetic shared by the inside-outside engine, the EM
//! trainer and the merge scorer.

mod logspace;

pub use logspace::{log_add, log_sum_exp, log_uniform, LOG_ONE, LOG_ZERO};
