//! # Latent-variable PCFG induction
//!
//! This library refines a treebank grammar by splitting every nonterminal
//! into latent substates and fitting them with EM, in the split-merge
//! style of Petrov and Klein.
//!
//! ## Core Algorithm
//!
//! 1. **Seed**: every observed label starts with one substate, every
//!    observed production with a `log 1` beta
//! 2. **Split**: double every substate count except start symbols and the
//!    boundary tag; perturb the duplicated betas apart
//! 3. **Train**: EM with log-space inside-outside over the observed trees
//! 4. **Merge**: fold back the split siblings whose loss of corpus
//!    likelihood is smallest, then re-train
//! 5. **Build**: turn the final expected counts into pruned unary and
//!    binary rules over substate names
//!
//! ## Usage Example
//!
//! ```
//! use latent_pcfg::{induce, parse_tree, Corpus, InductionConfig};
//!
//! let tree = parse_tree("(ROOT (NP (NN dog)))")?;
//! let corpus = Corpus::from_trees([tree], 1.0)?;
//! let grammar = induce(corpus, InductionConfig::default().with_split_count(1))?;
//! assert!(grammar.state_index.len() > 0);
//! # Ok::<(), latent_pcfg::InductionError>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod beta; // Unary and binary parameter tables
pub mod config; // Run parameters
pub mod corpus; // Weighted training trees
pub mod em; // E-step, rescaling, convergence
pub mod grammar; // Final rule sets
pub mod inside_outside; // Per-tree dynamic programs
pub mod lexicon; // Word emission model
pub mod session; // Owned run state
pub mod split_merge; // Substate splitting and merging
pub mod state; // Split counts and state index
pub mod tree; // Tree values, reader, arena
pub mod util; // Log-space helpers

// Re-exports for convenience
pub use beta::{BinaryBeta, BinaryBetas, UnaryBeta, UnaryBetas};
pub use config::InductionConfig;
pub use corpus::{Corpus, WeightedTree};
pub use em::{Expectations, StateMass};
pub use grammar::{BinaryGrammar, BinaryRule, InducedGrammar, UnaryGrammar, UnaryRule};
pub use inside_outside::{InsideOutside, TreeScores};
pub use lexicon::{Lexicon, SmoothedLexicon};
pub use session::InductionSession;
pub use split_merge::{MergeCandidate, MergeCorrespondence};
pub use state::{state_name, SplitCounts, StateIndex};
pub use tree::{parse_tree, parse_treebank, Tree, TreeParseError};

use thiserror::Error;

/// Errors that can abort an induction run
#[derive(Error, Debug)]
pub enum InductionError {
    /// A tree is not binarized where the engine requires it
    #[error("structural violation: {message} at {tree}")]
    StructuralViolation {
        /// Which expectation was violated
        message: String,
        /// Bracketed rendering of the offending subtree
        tree: String,
    },

    /// Table dimensions disagree with each other or with split counts
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Table or mapping being checked
        context: String,
        /// Size implied by the invariant
        expected: usize,
        /// Size found
        actual: usize,
    },

    /// A tree label was never registered with the split counts
    #[error("label {label:?} has no substates; count original states first")]
    UnknownLabel {
        /// The unregistered label
        label: String,
    },

    /// Rejected configuration
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Negative or non-finite tree weight
    #[error("invalid tree weight {weight}: weights must be finite and non-negative")]
    InvalidWeight {
        /// Offending weight
        weight: f64,
    },

    /// Nothing to train on
    #[error("corpus has no trainable trees with positive weight")]
    EmptyCorpus,

    /// Bracketed tree reader failure
    #[error("tree parse error: {0}")]
    TreeParse(#[from] TreeParseError),
}

impl InductionError {
    pub(crate) fn structural(message: impl Into<String>, tree: &Tree) -> Self {
        Self::StructuralViolation {
            message: message.into(),
            tree: tree.to_string(),
        }
    }

    /// Prefix the context of a shape mismatch; other variants pass through
    pub fn in_context(self, outer: impl std::fmt::Display) -> Self {
        match self {
            Self::ShapeMismatch {
                context,
                expected,
                actual,
            } => Self::ShapeMismatch {
                context: format!("{outer}: {context}"),
                expected,
                actual,
            },
            other => other,
        }
    }
}

/// Induce a grammar with the default lexicon
///
/// Shorthand for [`InductionSession::new`] followed by
/// [`InductionSession::extract`].
pub fn induce(
    corpus: Corpus,
    config: InductionConfig,
) -> Result<InducedGrammar<SmoothedLexicon>, InductionError> {
    InductionSession::new(config, corpus)?.extract()
}
