//! The induction session aggregate
//!
//! One session owns the corpus and every mutable table of a run: split
//! counts, betas, lexicon, state mass and the seeded RNG. Each phase is a
//! method on the session; the EM, split-merge and grammar phases live in
//! their own modules.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, info_span};

use crate::beta::{BinaryBeta, BinaryBetas, UnaryBeta, UnaryBetas};
use crate::config::InductionConfig;
use crate::corpus::Corpus;
use crate::em::StateMass;
use crate::grammar::InducedGrammar;
use crate::lexicon::{Lexicon, SmoothedLexicon};
use crate::state::SplitCounts;
use crate::tree::Tree;
use crate::util::LOG_ONE;
use crate::InductionError;

/// Message for trees that are not binarized
pub const NOT_BINARIZED_MESSAGE: &str = "trees should have been binarized";

/// Owned state of one split-merge induction run
#[derive(Debug)]
pub struct InductionSession<L: Lexicon = SmoothedLexicon> {
    pub(crate) config: InductionConfig,
    pub(crate) corpus: Corpus,
    pub(crate) split_counts: SplitCounts,
    pub(crate) unary_betas: UnaryBetas,
    pub(crate) binary_betas: BinaryBetas,
    pub(crate) lexicon: L,
    pub(crate) state_mass: StateMass,
    pub(crate) last_log_likelihood: f64,
    pub(crate) rng: StdRng,
}

impl InductionSession<SmoothedLexicon> {
    /// Session with the default smoothed lexicon
    pub fn new(config: InductionConfig, corpus: Corpus) -> Result<Self, InductionError> {
        Self::with_lexicon(config, corpus, SmoothedLexicon::default())
    }
}

impl<L: Lexicon> InductionSession<L> {
    /// Session with a caller-supplied lexicon
    ///
    /// The lexicon is only used as a template: training always starts from
    /// [`Lexicon::fresh`].
    pub fn with_lexicon(
        config: InductionConfig,
        corpus: Corpus,
        lexicon: L,
    ) -> Result<Self, InductionError> {
        config.validate()?;
        if corpus.training_size() <= 0.0 || corpus.trainable().next().is_none() {
            return Err(InductionError::EmptyCorpus);
        }
        Ok(Self {
            split_counts: SplitCounts::from_config(&config),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            corpus,
            unary_betas: UnaryBetas::new(),
            binary_betas: BinaryBetas::new(),
            lexicon,
            state_mass: StateMass::new(),
            last_log_likelihood: f64::NEG_INFINITY,
        })
    }

    /// Run configuration
    pub fn config(&self) -> &InductionConfig {
        &self.config
    }

    /// Training corpus
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Current split counts
    pub fn split_counts(&self) -> &SplitCounts {
        &self.split_counts
    }

    /// Live unary betas
    pub fn unary_betas(&self) -> &UnaryBetas {
        &self.unary_betas
    }

    /// Live binary betas
    pub fn binary_betas(&self) -> &BinaryBetas {
        &self.binary_betas
    }

    /// Committed lexicon
    pub fn lexicon(&self) -> &L {
        &self.lexicon
    }

    /// State mass of the last committed E-step
    pub fn state_mass(&self) -> &StateMass {
        &self.state_mass
    }

    /// Corpus log-likelihood of the last E-step
    pub fn log_likelihood(&self) -> f64 {
        self.last_log_likelihood
    }

    /// Seed split counts from every label in the corpus
    pub fn count_original_states(&mut self) {
        self.split_counts.count_original_states(&self.corpus);
    }

    /// Double every splittable label's count
    pub fn split_state_counts(&mut self) {
        self.split_counts.split_state_counts();
    }

    /// Allocate `log 1` betas for every production and train the lexicon
    /// on unsplit tags
    pub fn initial_betas_and_lexicon(&mut self) -> Result<(), InductionError> {
        let mut unary = UnaryBetas::new();
        let mut binary = BinaryBetas::new();
        let mut lexicon = self.lexicon.fresh();
        for entry in self.corpus.trainable() {
            seed_tree(
                &entry.tree,
                entry.weight,
                &self.split_counts,
                &mut unary,
                &mut binary,
                &mut lexicon,
            )?;
        }
        lexicon.finish_training();

        self.unary_betas = unary;
        self.binary_betas = binary;
        self.lexicon = lexicon;
        Ok(())
    }

    /// One split round: split, re-fit, then optionally merge and re-fit
    pub fn split_round(&mut self, round: usize) -> Result<(), InductionError> {
        let span = info_span!("split_round", round);
        let _guard = span.enter();

        self.split_state_counts();
        self.split_betas()?;
        self.recalculate_betas(true)?;
        if self.config.split_recombine_rate > 0.0 {
            self.merge_states()?;
            self.recalculate_betas(false)?;
        }

        info!(
            total_substates = self.split_counts.total_substates(),
            log_likelihood = self.last_log_likelihood,
            "split round finished"
        );
        Ok(())
    }

    /// Run every phase and hand back the grammar
    pub fn extract(mut self) -> Result<InducedGrammar<L>, InductionError> {
        self.count_original_states();
        self.initial_betas_and_lexicon()?;
        for round in 1..=self.config.split_count {
            self.split_round(round)?;
        }

        let state_index = self.split_counts.build_state_index();
        let (unary, binary) = self.build_grammars()?;
        info!(
            states = state_index.len(),
            unary_rules = unary.num_rules(),
            binary_rules = binary.num_rules(),
            "grammar built"
        );

        Ok(InducedGrammar {
            unary,
            binary,
            lexicon: self.lexicon,
            state_index,
            split_counts: self.split_counts,
            log_likelihood: self.last_log_likelihood,
        })
    }
}

fn substates(counts: &SplitCounts, label: &str) -> Result<usize, InductionError> {
    match counts.split_count(label) {
        0 => Err(InductionError::UnknownLabel {
            label: label.to_string(),
        }),
        n => Ok(n),
    }
}

fn seed_tree<L: Lexicon>(
    tree: &Tree,
    weight: f64,
    counts: &SplitCounts,
    unary: &mut UnaryBetas,
    binary: &mut BinaryBetas,
    lexicon: &mut L,
) -> Result<(), InductionError> {
    if tree.is_leaf() {
        return Err(InductionError::structural(NOT_BINARIZED_MESSAGE, tree));
    }
    let label = tree.label();
    if tree.is_preterminal() {
        substates(counts, label)?;
        let word = tree.children()[0].label();
        lexicon.train(word, &counts.state_name(label, 0), weight);
        return Ok(());
    }

    if tree.children().iter().any(Tree::is_leaf) {
        return Err(InductionError::structural(NOT_BINARIZED_MESSAGE, tree));
    }
    match tree.children() {
        [child] => {
            let shape = (substates(counts, label)?, substates(counts, child.label())?);
            unary.get_or_insert_with(label, child.label(), || {
                UnaryBeta::filled(shape.0, shape.1, LOG_ONE)
            });
            seed_tree(child, weight, counts, unary, binary, lexicon)
        }
        [left, right] => {
            let shape = (
                substates(counts, label)?,
                substates(counts, left.label())?,
                substates(counts, right.label())?,
            );
            binary.get_or_insert_with(label, left.label(), right.label(), || {
                BinaryBeta::filled(shape.0, shape.1, shape.2, LOG_ONE)
            });
            seed_tree(left, weight, counts, unary, binary, lexicon)?;
            seed_tree(right, weight, counts, unary, binary, lexicon)
        }
        _ => Err(InductionError::structural(NOT_BINARIZED_MESSAGE, tree)),
    }
}
