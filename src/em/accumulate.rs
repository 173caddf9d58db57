//! Summing tree posteriors into temporary tables

use std::collections::BTreeMap;

use super::Expectations;
use crate::beta::{BinaryBeta, BinaryBetas, UnaryBeta, UnaryBetas};
use crate::inside_outside::{Production, TreePosteriors};
use crate::lexicon::Lexicon;
use crate::split_merge::MergeCorrespondence;
use crate::state::SplitCounts;
use crate::util::LOG_ZERO;

/// Expected occupancy of each substate, summed over the weighted corpus
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateMass {
    mass: BTreeMap<String, Vec<f64>>,
}

impl StateMass {
    /// No mass recorded
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `weight * posteriors[i]` to substate `i` of `label`
    pub fn add(&mut self, label: &str, posteriors: &[f64], weight: f64) {
        let slots = self.mass.entry(label.to_string()).or_default();
        if slots.len() < posteriors.len() {
            slots.resize(posteriors.len(), 0.0);
        }
        for (slot, p) in slots.iter_mut().zip(posteriors) {
            *slot += weight * p;
        }
    }

    /// Add `mass` to substate `index` of `label`
    pub fn add_to(&mut self, label: &str, index: usize, mass: f64) {
        let slots = self.mass.entry(label.to_string()).or_default();
        if slots.len() <= index {
            slots.resize(index + 1, 0.0);
        }
        slots[index] += mass;
    }

    /// Per-substate mass of `label`
    pub fn get(&self, label: &str) -> Option<&[f64]> {
        self.mass.get(label).map(Vec::as_slice)
    }

    /// Mass of one substate, 0 if never observed
    pub fn substate(&self, label: &str, index: usize) -> f64 {
        self.get(label)
            .and_then(|slots| slots.get(index))
            .copied()
            .unwrap_or(0.0)
    }

    /// Labels in sorted order with their masses
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.mass
            .iter()
            .map(|(label, slots)| (label.as_str(), slots.as_slice()))
    }
}

/// Collects weighted posteriors, optionally folding substates through a
/// merge correspondence
pub(crate) struct Accumulator<'a, L> {
    counts: &'a SplitCounts,
    projection: Option<&'a MergeCorrespondence>,
    smoothing: Option<f64>,
    expectations: Expectations<L>,
}

impl<'a, L: Lexicon> Accumulator<'a, L> {
    pub(crate) fn new(counts: &'a SplitCounts, lexicon: L, smoothing: Option<f64>) -> Self {
        Self {
            counts,
            projection: None,
            smoothing,
            expectations: Expectations {
                unary: UnaryBetas::new(),
                binary: BinaryBetas::new(),
                state_mass: StateMass::new(),
                lexicon,
                log_likelihood: 0.0,
                uniform_fallbacks: 0,
            },
        }
    }

    /// Sum into the collapsed substate space of `correspondence`
    pub(crate) fn with_projection(mut self, correspondence: &'a MergeCorrespondence) -> Self {
        self.projection = Some(correspondence);
        self
    }

    fn project(&self, label: &str, index: usize) -> usize {
        self.projection
            .map_or(index, |correspondence| correspondence.project(label, index))
    }

    fn target_states(&self, label: &str, states: usize) -> usize {
        self.projection
            .map_or(states, |correspondence| correspondence.target_count(label, states))
    }

    pub(crate) fn add_tree(&mut self, posteriors: &TreePosteriors<'_>, weight: f64) {
        self.expectations.log_likelihood += weight * posteriors.log_likelihood;
        self.expectations.uniform_fallbacks += posteriors.uniform_fallbacks;

        for node in &posteriors.nodes {
            let label = node.label;
            let states = node.state_posteriors.len();
            for (i, p) in node.state_posteriors.iter().enumerate() {
                let target = self.project(label, i);
                self.expectations.state_mass.add_to(label, target, weight * p);
            }

            match &node.production {
                Production::Lexical { word } => {
                    let smoothing = self.smoothing.unwrap_or(0.0);
                    let norm = 1.0 + states as f64 * smoothing;
                    for (i, p) in node.state_posteriors.iter().enumerate() {
                        let tag = self.counts.state_name(label, self.project(label, i));
                        self.expectations
                            .lexicon
                            .train(word, &tag, weight * (p + smoothing) / norm);
                    }
                }
                Production::Unary {
                    child,
                    child_states,
                    joint,
                } => {
                    let shape = (
                        self.target_states(label, states),
                        self.target_states(child, *child_states),
                    );
                    let mut cells = Vec::with_capacity(joint.len());
                    for i in 0..states {
                        for j in 0..*child_states {
                            let mass = joint[i * child_states + j];
                            if mass > 0.0 {
                                cells.push((self.project(label, i), self.project(child, j), mass));
                            }
                        }
                    }
                    let beta = self.expectations.unary.get_or_insert_with(label, child, || {
                        UnaryBeta::filled(shape.0, shape.1, LOG_ZERO)
                    });
                    for (i, j, mass) in cells {
                        beta.log_accumulate(i, j, (weight * mass).ln());
                    }
                }
                Production::Binary {
                    left,
                    right,
                    left_states,
                    right_states,
                    joint,
                } => {
                    let shape = (
                        self.target_states(label, states),
                        self.target_states(left, *left_states),
                        self.target_states(right, *right_states),
                    );
                    let mut cells = Vec::with_capacity(joint.len());
                    for i in 0..states {
                        for j in 0..*left_states {
                            for k in 0..*right_states {
                                let mass = joint[(i * left_states + j) * right_states + k];
                                if mass > 0.0 {
                                    cells.push((
                                        self.project(label, i),
                                        self.project(left, j),
                                        self.project(right, k),
                                        mass,
                                    ));
                                }
                            }
                        }
                    }
                    let beta =
                        self.expectations
                            .binary
                            .get_or_insert_with(label, left, right, || {
                                BinaryBeta::filled(shape.0, shape.1, shape.2, LOG_ZERO)
                            });
                    for (i, j, k, mass) in cells {
                        beta.log_accumulate(i, j, k, (weight * mass).ln());
                    }
                }
            }
        }
    }

    pub(crate) fn finish(mut self) -> Expectations<L> {
        self.expectations.lexicon.finish_training();
        self.expectations
    }
}
