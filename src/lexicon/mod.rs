//! Word emission model
//!
//! The induction engine only needs four things from a lexicon: a fresh
//! copy to retrain into, weighted `(word, tagged substate)` observations,
//! an end-of-training hook, and a log emission score that never fails.
//! Unseen words and unseen substates are the lexicon's own business:
//! `score` must return a finite log probability for them.

use std::collections::HashMap;
use std::fmt;

/// Pluggable emission model keyed by `(word, tag substate name)`
pub trait Lexicon: fmt::Debug {
    /// Untrained lexicon with the same parameters
    fn fresh(&self) -> Self
    where
        Self: Sized;

    /// Observe `word` emitted by `tag` with (possibly fractional) weight
    fn train(&mut self, word: &str, tag: &str, weight: f64);

    /// Called once after the last `train` of a training pass
    fn finish_training(&mut self);

    /// `log P(word | tag)`
    fn score(&self, word: &str, tag: &str) -> f64;
}

/// Relative-frequency lexicon interpolated with an add-one word unigram
///
/// `P(w | t) = (c(t, w) + λ P(w)) / (c(t) + λ)` with
/// `P(w) = (c(w) + 1) / (N + V + 1)`. A tag never trained backs off to
/// `P(w)` alone.
#[derive(Debug, Clone)]
pub struct SmoothedLexicon {
    unseen_weight: f64,
    tag_words: HashMap<String, HashMap<String, f64>>,
    tag_totals: HashMap<String, f64>,
    word_totals: HashMap<String, f64>,
    total: f64,
}

impl SmoothedLexicon {
    /// Default interpolation weight λ
    pub const DEFAULT_UNSEEN_WEIGHT: f64 = 1.0;

    /// Empty lexicon with interpolation weight `unseen_weight`
    pub fn new(unseen_weight: f64) -> Self {
        Self {
            unseen_weight: unseen_weight.max(f64::MIN_POSITIVE),
            tag_words: HashMap::new(),
            tag_totals: HashMap::new(),
            word_totals: HashMap::new(),
            total: 0.0,
        }
    }

    /// Expected count of `tag` seen so far
    pub fn tag_count(&self, tag: &str) -> f64 {
        self.tag_totals.get(tag).copied().unwrap_or(0.0)
    }

    /// Number of distinct tags trained
    pub fn num_tags(&self) -> usize {
        self.tag_totals.len()
    }

    /// Number of distinct words trained
    pub fn vocabulary_size(&self) -> usize {
        self.word_totals.len()
    }

    fn word_probability(&self, word: &str) -> f64 {
        let count = self.word_totals.get(word).copied().unwrap_or(0.0);
        (count + 1.0) / (self.total + self.word_totals.len() as f64 + 1.0)
    }
}

impl Default for SmoothedLexicon {
    fn default() -> Self {
        Self::new(Self::DEFAULT_UNSEEN_WEIGHT)
    }
}

impl Lexicon for SmoothedLexicon {
    fn fresh(&self) -> Self {
        Self::new(self.unseen_weight)
    }

    fn train(&mut self, word: &str, tag: &str, weight: f64) {
        if !(weight.is_finite() && weight > 0.0) {
            return;
        }
        *self
            .tag_words
            .entry(tag.to_string())
            .or_default()
            .entry(word.to_string())
            .or_insert(0.0) += weight;
        *self.tag_totals.entry(tag.to_string()).or_insert(0.0) += weight;
        *self.word_totals.entry(word.to_string()).or_insert(0.0) += weight;
        self.total += weight;
    }

    fn finish_training(&mut self) {
        // Drop tags whose entire mass underflowed to zero
        self.tag_totals.retain(|_, total| *total > 0.0);
    }

    fn score(&self, word: &str, tag: &str) -> f64 {
        let p_word = self.word_probability(word);
        let tag_total = self.tag_count(tag);
        if tag_total <= 0.0 {
            return p_word.ln();
        }
        let joint = self
            .tag_words
            .get(tag)
            .and_then(|words| words.get(word))
            .copied()
            .unwrap_or(0.0);
        ((joint + self.unseen_weight * p_word) / (tag_total + self.unseen_weight)).ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained() -> SmoothedLexicon {
        let mut lex = SmoothedLexicon::default();
        lex.train("dog", "NN^0", 3.0);
        lex.train("cat", "NN^0", 1.0);
        lex.train("runs", "VB^0", 2.0);
        lex.finish_training();
        lex
    }

    #[test]
    fn test_seen_words_prefer_their_tag() {
        let lex = trained();
        assert!(lex.score("dog", "NN^0") > lex.score("dog", "VB^0"));
        assert!(lex.score("dog", "NN^0") > lex.score("cat", "NN^0"));
    }

    #[test]
    fn test_unseen_word_and_tag_are_finite() {
        let lex = trained();
        assert!(lex.score("zebra", "NN^0").is_finite());
        assert!(lex.score("dog", "JJ^7").is_finite());
        assert!(lex.score("zebra", "JJ^7") < 0.0);
    }

    #[test]
    fn test_fresh_is_untrained() {
        let lex = trained();
        let fresh = lex.fresh();
        assert_eq!(fresh.num_tags(), 0);
        assert_eq!(fresh.vocabulary_size(), 0);
        assert_eq!(lex.vocabulary_size(), 3);
    }

    #[test]
    fn test_ignores_non_positive_weights() {
        let mut lex = SmoothedLexicon::default();
        lex.train("dog", "NN^0", 0.0);
        lex.train("dog", "NN^0", f64::NAN);
        assert_eq!(lex.tag_count("NN^0"), 0.0);
    }
}
