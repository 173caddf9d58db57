//! Substate bookkeeping
//!
//! Tracks how many latent substates each original label currently has and
//! names them. Start symbols and the boundary tag are never split: their
//! count stays 1 and their substate name is the bare label.

mod index;

pub use index::StateIndex;

use std::collections::{HashMap, HashSet};

use crate::config::InductionConfig;
use crate::corpus::Corpus;
use crate::tree::Tree;

/// Separator between a label and its substate number
pub const SUBSTATE_SEPARATOR: char = '^';

/// Canonical substate name
///
/// `label^index` for ordinary labels, the bare `label` for unsplittable
/// ones regardless of `index`.
pub fn state_name(label: &str, index: usize, unsplittable: bool) -> String {
    if unsplittable {
        label.to_string()
    } else {
        format!("{label}{SUBSTATE_SEPARATOR}{index}")
    }
}

/// Split-count table: label → current substate count
#[derive(Debug, Clone)]
pub struct SplitCounts {
    /// Labels in first-seen order (drives state index order)
    original_states: Vec<String>,
    counts: HashMap<String, usize>,
    start_symbols: HashSet<String>,
    boundary_tag: String,
}

impl SplitCounts {
    /// Empty table with the given unsplittable labels
    pub fn new<I, S>(start_symbols: I, boundary_tag: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            original_states: Vec::new(),
            counts: HashMap::new(),
            start_symbols: start_symbols.into_iter().map(Into::into).collect(),
            boundary_tag: boundary_tag.into(),
        }
    }

    /// Empty table using the configured start symbols and boundary tag
    pub fn from_config(config: &InductionConfig) -> Self {
        Self::new(config.start_symbols.iter().cloned(), config.boundary_tag.clone())
    }

    /// Start symbol or boundary tag
    #[inline]
    pub fn is_unsplittable(&self, label: &str) -> bool {
        label == self.boundary_tag || self.start_symbols.contains(label)
    }

    /// Whether `label` is a configured start symbol
    pub fn is_start_symbol(&self, label: &str) -> bool {
        self.start_symbols.contains(label)
    }

    /// The boundary tag
    pub fn boundary_tag(&self) -> &str {
        &self.boundary_tag
    }

    /// Substate name for `(label, index)`
    pub fn state_name(&self, label: &str, index: usize) -> String {
        state_name(label, index, self.is_unsplittable(label))
    }

    /// Record every preterminal/internal label of the corpus with count 1
    ///
    /// Leaves and pure-leaf trees contribute nothing. Labels already known
    /// keep their count.
    pub fn count_original_states(&mut self, corpus: &Corpus) {
        for entry in corpus.iter() {
            self.record_tree(&entry.tree);
        }
    }

    fn record_tree(&mut self, tree: &Tree) {
        if tree.is_leaf() {
            return;
        }
        if !self.counts.contains_key(tree.label()) {
            self.original_states.push(tree.label().to_string());
            self.counts.insert(tree.label().to_string(), 1);
        }
        for child in tree.children() {
            self.record_tree(child);
        }
    }

    /// Double every count except start symbols and the boundary tag
    pub fn split_state_counts(&mut self) {
        for label in &self.original_states {
            if self.start_symbols.contains(label) || *label == self.boundary_tag {
                continue;
            }
            if let Some(count) = self.counts.get_mut(label) {
                *count *= 2;
            }
        }
    }

    /// Current count, 0 for a label never seen
    #[inline]
    pub fn split_count(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Set a label's count, registering the label if unseen
    ///
    /// Unsplittable labels are pinned to 1.
    pub fn set_split_count(&mut self, label: &str, count: usize) {
        let count = if self.is_unsplittable(label) {
            count.min(1)
        } else {
            count
        };
        match self.counts.get_mut(label) {
            Some(existing) => *existing = count,
            None => {
                self.original_states.push(label.to_string());
                self.counts.insert(label.to_string(), count);
            }
        }
    }

    /// Labels in first-seen order
    pub fn original_states(&self) -> &[String] {
        &self.original_states
    }

    /// Sum of all counts
    pub fn total_substates(&self) -> usize {
        self.original_states
            .iter()
            .map(|label| self.split_count(label))
            .sum()
    }

    /// Deterministic, contiguous index over every live substate
    ///
    /// Labels in first-seen order, substates `0..count` within a label.
    pub fn build_state_index(&self) -> StateIndex {
        let mut index = StateIndex::new();
        for label in &self.original_states {
            for i in 0..self.split_count(label) {
                index.add(self.state_name(label, i));
            }
        }
        index
    }
}
