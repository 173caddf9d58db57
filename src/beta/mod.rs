//! Beta tables
//!
//! A beta is the log-probability of a substate assignment given the
//! labels of a production: `P(child substate | parent substate)` for a
//! unary production and `P(left, right substates | parent substate)` for a
//! binary one. Tables are keyed by label tuples and hold one dense array
//! per production, shaped by the current split counts of its labels.

mod matrix;
mod split;
mod tables;

pub use matrix::{BinaryBeta, UnaryBeta};
pub use split::{split_betas, split_binary_beta, split_unary_beta};
pub use tables::{BinaryBetas, UnaryBetas};
