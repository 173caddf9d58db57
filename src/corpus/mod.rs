//! Weighted training corpus
//!
//! Holds the binarized training trees for the whole session. A tree's
//! identity is its occurrence: its position in the corpus. Adding an equal
//! tree twice creates two occurrences, each with its own weight.

use crate::tree::Tree;
use crate::InductionError;

/// One training tree occurrence and its weight
#[derive(Debug, Clone)]
pub struct WeightedTree {
    /// The tree (read-only for the whole session)
    pub tree: Tree,
    /// Non-negative training weight
    pub weight: f64,
}

/// Weighted tree set with its total training mass
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    entries: Vec<WeightedTree>,
    training_size: f64,
}

impl Corpus {
    /// Empty corpus
    pub fn new() -> Self {
        Self::default()
    }

    /// Corpus where every tree has the same weight
    pub fn from_trees(
        trees: impl IntoIterator<Item = Tree>,
        weight: f64,
    ) -> Result<Self, InductionError> {
        let mut corpus = Self::new();
        corpus.extend(trees, weight)?;
        Ok(corpus)
    }

    /// Merge two weighted collections into one corpus
    ///
    /// Trees of the first collection carry `weight1`, trees of the second
    /// carry `weight2`.
    pub fn merged(
        trees1: impl IntoIterator<Item = Tree>,
        weight1: f64,
        trees2: impl IntoIterator<Item = Tree>,
        weight2: f64,
    ) -> Result<Self, InductionError> {
        let mut corpus = Self::from_trees(trees1, weight1)?;
        corpus.extend(trees2, weight2)?;
        Ok(corpus)
    }

    /// Add one tree occurrence
    pub fn push(&mut self, tree: Tree, weight: f64) -> Result<(), InductionError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(InductionError::InvalidWeight { weight });
        }
        self.training_size += weight;
        self.entries.push(WeightedTree { tree, weight });
        Ok(())
    }

    /// Add every tree of a collection with the same weight
    pub fn extend(
        &mut self,
        trees: impl IntoIterator<Item = Tree>,
        weight: f64,
    ) -> Result<(), InductionError> {
        for tree in trees {
            self.push(tree, weight)?;
        }
        Ok(())
    }

    /// Sum of all tree weights
    pub fn training_size(&self) -> f64 {
        self.training_size
    }

    /// Number of tree occurrences
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the corpus has no trees
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All occurrences in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &WeightedTree> {
        self.entries.iter()
    }

    /// Occurrences that take part in training: positive weight, not a bare leaf
    pub fn trainable(&self) -> impl Iterator<Item = &WeightedTree> {
        self.entries
            .iter()
            .filter(|entry| entry.weight > 0.0 && !entry.tree.is_leaf())
    }
}
