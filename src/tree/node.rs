//! Tree node representation
//!
//! Leaves carry a word, preterminals carry a tag over exactly one leaf,
//! internal nodes carry a nonterminal over their children. Arity is not
//! restricted here: binarization is a precondition checked by the
//! induction code, not by the data type.

use std::fmt;

/// Labeled constituency tree node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tree {
    label: String,
    children: Vec<Tree>,
}

impl Tree {
    /// Create an internal node
    pub fn new(label: impl Into<String>, children: Vec<Tree>) -> Self {
        Self {
            label: label.into(),
            children,
        }
    }

    /// Create a leaf carrying a word
    pub fn leaf(word: impl Into<String>) -> Self {
        Self {
            label: word.into(),
            children: Vec::new(),
        }
    }

    /// Create a preterminal `(tag word)`
    pub fn preterminal(tag: impl Into<String>, word: impl Into<String>) -> Self {
        Self::new(tag, vec![Self::leaf(word)])
    }

    /// Node label (the word, for leaves)
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Children in left-to-right order
    pub fn children(&self) -> &[Tree] {
        &self.children
    }

    /// Number of children
    #[inline]
    pub fn arity(&self) -> usize {
        self.children.len()
    }

    /// Check if leaf (no children)
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Check if preterminal (exactly one child, which is a leaf)
    #[inline]
    pub fn is_preterminal(&self) -> bool {
        self.children.len() == 1 && self.children[0].is_leaf()
    }

    /// Total number of nodes, leaves included
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Tree::node_count).sum::<usize>()
    }

    /// Words at the leaves, left to right
    pub fn words(&self) -> Vec<&str> {
        let mut words = Vec::new();
        self.collect_words(&mut words);
        words
    }

    fn collect_words<'a>(&'a self, out: &mut Vec<&'a str>) {
        if self.is_leaf() {
            out.push(&self.label);
        } else {
            for child in &self.children {
                child.collect_words(out);
            }
        }
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_leaf() {
            return write!(f, "{}", self.label);
        }
        write!(f, "({}", self.label)?;
        for child in &self.children {
            write!(f, " {}", child)?;
        }
        write!(f, ")")
    }
}
