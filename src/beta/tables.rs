//! Label-keyed beta tables
//!
//! Nested ordered maps keep iteration deterministic, which keeps the
//! seeded split perturbation and every accumulation order reproducible.

use std::collections::BTreeMap;

use super::{BinaryBeta, UnaryBeta};

/// `(parent, child)` → unary beta
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnaryBetas {
    entries: BTreeMap<String, BTreeMap<String, UnaryBeta>>,
}

impl UnaryBetas {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Beta of `parent -> child`
    pub fn get(&self, parent: &str, child: &str) -> Option<&UnaryBeta> {
        self.entries.get(parent)?.get(child)
    }

    /// Mutable beta of `parent -> child`
    pub fn get_mut(&mut self, parent: &str, child: &str) -> Option<&mut UnaryBeta> {
        self.entries.get_mut(parent)?.get_mut(child)
    }

    /// Insert or replace a beta
    pub fn insert(&mut self, parent: &str, child: &str, beta: UnaryBeta) {
        self.entries
            .entry(parent.to_string())
            .or_default()
            .insert(child.to_string(), beta);
    }

    /// Existing beta, or a freshly inserted `init()`
    pub fn get_or_insert_with(
        &mut self,
        parent: &str,
        child: &str,
        init: impl FnOnce() -> UnaryBeta,
    ) -> &mut UnaryBeta {
        self.entries
            .entry(parent.to_string())
            .or_default()
            .entry(child.to_string())
            .or_insert_with(init)
    }

    /// Number of productions
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// Whether the table has no productions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(parent, child, beta)` in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &UnaryBeta)> + '_ {
        self.entries.iter().flat_map(|(parent, children)| {
            children
                .iter()
                .map(move |(child, beta)| (parent.as_str(), child.as_str(), beta))
        })
    }

    /// `(parent, child, &mut beta)` in key order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &str, &mut UnaryBeta)> + '_ {
        self.entries.iter_mut().flat_map(|(parent, children)| {
            children
                .iter_mut()
                .map(move |(child, beta)| (parent.as_str(), child.as_str(), beta))
        })
    }
}

/// `(parent, left, right)` → binary beta
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinaryBetas {
    entries: BTreeMap<String, BTreeMap<String, BTreeMap<String, BinaryBeta>>>,
}

impl BinaryBetas {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Beta of `parent -> left right`
    pub fn get(&self, parent: &str, left: &str, right: &str) -> Option<&BinaryBeta> {
        self.entries.get(parent)?.get(left)?.get(right)
    }

    /// Mutable beta of `parent -> left right`
    pub fn get_mut(&mut self, parent: &str, left: &str, right: &str) -> Option<&mut BinaryBeta> {
        self.entries.get_mut(parent)?.get_mut(left)?.get_mut(right)
    }

    /// Insert or replace a beta
    pub fn insert(&mut self, parent: &str, left: &str, right: &str, beta: BinaryBeta) {
        self.entries
            .entry(parent.to_string())
            .or_default()
            .entry(left.to_string())
            .or_default()
            .insert(right.to_string(), beta);
    }

    /// Existing beta, or a freshly inserted `init()`
    pub fn get_or_insert_with(
        &mut self,
        parent: &str,
        left: &str,
        right: &str,
        init: impl FnOnce() -> BinaryBeta,
    ) -> &mut BinaryBeta {
        self.entries
            .entry(parent.to_string())
            .or_default()
            .entry(left.to_string())
            .or_default()
            .entry(right.to_string())
            .or_insert_with(init)
    }

    /// Number of productions
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeMap::len)
            .sum()
    }

    /// Whether the table has no productions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(parent, left, right, beta)` in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str, &BinaryBeta)> + '_ {
        self.entries.iter().flat_map(|(parent, lefts)| {
            lefts.iter().flat_map(move |(left, rights)| {
                rights.iter().map(move |(right, beta)| {
                    (parent.as_str(), left.as_str(), right.as_str(), beta)
                })
            })
        })
    }

    /// `(parent, left, right, &mut beta)` in key order
    pub fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (&str, &str, &str, &mut BinaryBeta)> + '_ {
        self.entries.iter_mut().flat_map(|(parent, lefts)| {
            lefts.iter_mut().flat_map(move |(left, rights)| {
                rights.iter_mut().map(move |(right, beta)| {
                    (parent.as_str(), left.as_str(), right.as_str(), beta)
                })
            })
        })
    }
}
