//! Final rule sets
//!
//! Rules are over substate names and carry log probabilities. A rule's
//! probability is its expected count divided by the expected count of its
//! parent substate, taken from one last E-step under the committed model.

use std::collections::BTreeMap;

use crate::beta::{BinaryBetas, UnaryBetas};
use crate::em::{Expectations, StateMass};
use crate::lexicon::Lexicon;
use crate::session::InductionSession;
use crate::state::{SplitCounts, StateIndex};
use crate::InductionError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// `parent -> child` over substate names
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UnaryRule {
    /// Parent substate
    pub parent: String,
    /// Child substate
    pub child: String,
    /// `log P(child | parent)`
    pub score: f64,
}

/// `parent -> left right` over substate names
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BinaryRule {
    /// Parent substate
    pub parent: String,
    /// Left child substate
    pub left: String,
    /// Right child substate
    pub right: String,
    /// `log P(left right | parent)`
    pub score: f64,
}

fn index_rule(index: &mut BTreeMap<String, Vec<usize>>, key: &str, position: usize) {
    index.entry(key.to_string()).or_default().push(position);
}

fn indexed<'a, R>(
    rules: &'a [R],
    index: &'a BTreeMap<String, Vec<usize>>,
    key: &str,
) -> impl Iterator<Item = &'a R> + 'a {
    index
        .get(key)
        .into_iter()
        .flatten()
        .map(move |&position| &rules[position])
}

/// Unary rules indexed by parent and by child
#[derive(Debug, Clone, Default)]
pub struct UnaryGrammar {
    rules: Vec<UnaryRule>,
    by_parent: BTreeMap<String, Vec<usize>>,
    by_child: BTreeMap<String, Vec<usize>>,
}

impl UnaryGrammar {
    /// Index a rule list
    pub fn new(rules: Vec<UnaryRule>) -> Self {
        let mut grammar = Self::default();
        for rule in rules {
            grammar.add(rule);
        }
        grammar
    }

    fn add(&mut self, rule: UnaryRule) {
        let position = self.rules.len();
        index_rule(&mut self.by_parent, &rule.parent, position);
        index_rule(&mut self.by_child, &rule.child, position);
        self.rules.push(rule);
    }

    /// Number of rules
    pub fn num_rules(&self) -> usize {
        self.rules.len()
    }

    /// Rules in creation order
    pub fn rules(&self) -> &[UnaryRule] {
        &self.rules
    }

    /// Rules rewriting `parent`
    pub fn rules_by_parent<'a>(&'a self, parent: &str) -> impl Iterator<Item = &'a UnaryRule> + 'a {
        indexed(&self.rules, &self.by_parent, parent)
    }

    /// Rules producing `child`
    pub fn rules_by_child<'a>(&'a self, child: &str) -> impl Iterator<Item = &'a UnaryRule> + 'a {
        indexed(&self.rules, &self.by_child, child)
    }

    /// Log probability of `parent -> child`, if present
    pub fn rule_score(&self, parent: &str, child: &str) -> Option<f64> {
        self.rules_by_parent(parent)
            .find(|rule| rule.child == child)
            .map(|rule| rule.score)
    }
}

/// Binary rules indexed by parent, left child and right child
#[derive(Debug, Clone, Default)]
pub struct BinaryGrammar {
    rules: Vec<BinaryRule>,
    by_parent: BTreeMap<String, Vec<usize>>,
    by_left: BTreeMap<String, Vec<usize>>,
    by_right: BTreeMap<String, Vec<usize>>,
}

impl BinaryGrammar {
    /// Index a rule list
    pub fn new(rules: Vec<BinaryRule>) -> Self {
        let mut grammar = Self::default();
        for rule in rules {
            grammar.add(rule);
        }
        grammar
    }

    fn add(&mut self, rule: BinaryRule) {
        let position = self.rules.len();
        index_rule(&mut self.by_parent, &rule.parent, position);
        index_rule(&mut self.by_left, &rule.left, position);
        index_rule(&mut self.by_right, &rule.right, position);
        self.rules.push(rule);
    }

    /// Number of rules
    pub fn num_rules(&self) -> usize {
        self.rules.len()
    }

    /// Rules in creation order
    pub fn rules(&self) -> &[BinaryRule] {
        &self.rules
    }

    /// Rules rewriting `parent`
    pub fn rules_by_parent<'a>(
        &'a self,
        parent: &str,
    ) -> impl Iterator<Item = &'a BinaryRule> + 'a {
        indexed(&self.rules, &self.by_parent, parent)
    }

    /// Rules whose left child is `left`
    pub fn rules_by_left_child<'a>(
        &'a self,
        left: &str,
    ) -> impl Iterator<Item = &'a BinaryRule> + 'a {
        indexed(&self.rules, &self.by_left, left)
    }

    /// Rules whose right child is `right`
    pub fn rules_by_right_child<'a>(
        &'a self,
        right: &str,
    ) -> impl Iterator<Item = &'a BinaryRule> + 'a {
        indexed(&self.rules, &self.by_right, right)
    }

    /// Log probability of `parent -> left right`, if present
    pub fn rule_score(&self, parent: &str, left: &str, right: &str) -> Option<f64> {
        self.rules_by_parent(parent)
            .find(|rule| rule.left == left && rule.right == right)
            .map(|rule| rule.score)
    }
}

/// Everything an induction run produces
#[derive(Debug, Clone)]
pub struct InducedGrammar<L> {
    /// Unary rules
    pub unary: UnaryGrammar,
    /// Binary rules
    pub binary: BinaryGrammar,
    /// Committed emission model
    pub lexicon: L,
    /// Every live substate name with its dense id
    pub state_index: StateIndex,
    /// Final substate count per label
    pub split_counts: SplitCounts,
    /// Weighted corpus log-likelihood of the last E-step
    pub log_likelihood: f64,
}

impl<L> InducedGrammar<L> {
    /// Hash of the state index and both rule sets
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for name in self.state_index.iter() {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
        }
        for rule in self.unary.rules() {
            hasher.update(b"U");
            hasher.update(rule.parent.as_bytes());
            hasher.update(&[0]);
            hasher.update(rule.child.as_bytes());
            hasher.update(&[0]);
            hasher.update(&rule.score.to_le_bytes());
        }
        for rule in self.binary.rules() {
            hasher.update(b"B");
            hasher.update(rule.parent.as_bytes());
            hasher.update(&[0]);
            hasher.update(rule.left.as_bytes());
            hasher.update(&[0]);
            hasher.update(rule.right.as_bytes());
            hasher.update(&[0]);
            hasher.update(&rule.score.to_le_bytes());
        }
        hasher.finalize()
    }
}

fn parent_mass(state_mass: &StateMass, label: &str, index: usize, epsilon: f64) -> Option<f64> {
    let mass = state_mass.substate(label, index);
    (mass > epsilon).then(|| mass.ln())
}

/// Turn log expected counts into pruned rules
///
/// Parent substates with no mass emit nothing; rules at or below `epsilon`
/// probability are dropped.
pub fn build_rules(
    counts: &SplitCounts,
    unary: &UnaryBetas,
    binary: &BinaryBetas,
    state_mass: &StateMass,
    epsilon: f64,
) -> (UnaryGrammar, BinaryGrammar) {
    let mut unary_rules = Vec::new();
    for (parent, child, beta) in unary.iter() {
        let (parents, children) = beta.shape();
        for i in 0..parents {
            let Some(mass) = parent_mass(state_mass, parent, i, f64::MIN_POSITIVE) else {
                continue;
            };
            for j in 0..children {
                let score = beta.get(i, j) - mass;
                if score.exp() > epsilon {
                    unary_rules.push(UnaryRule {
                        parent: counts.state_name(parent, i),
                        child: counts.state_name(child, j),
                        score,
                    });
                }
            }
        }
    }

    let mut binary_rules = Vec::new();
    for (parent, left, right, beta) in binary.iter() {
        let (parents, lefts, rights) = beta.shape();
        for i in 0..parents {
            let Some(mass) = parent_mass(state_mass, parent, i, f64::MIN_POSITIVE) else {
                continue;
            };
            for j in 0..lefts {
                for k in 0..rights {
                    let score = beta.get(i, j, k) - mass;
                    if score.exp() > epsilon {
                        binary_rules.push(BinaryRule {
                            parent: counts.state_name(parent, i),
                            left: counts.state_name(left, j),
                            right: counts.state_name(right, k),
                            score,
                        });
                    }
                }
            }
        }
    }

    (UnaryGrammar::new(unary_rules), BinaryGrammar::new(binary_rules))
}

impl<L: Lexicon> InductionSession<L> {
    /// Pruned unary and binary grammars under the committed model
    ///
    /// Runs one more E-step for expected rule counts.
    pub fn build_grammars(&mut self) -> Result<(UnaryGrammar, BinaryGrammar), InductionError> {
        let Expectations {
            unary,
            binary,
            state_mass,
            log_likelihood,
            ..
        } = self.recalculate_temporary_betas(false)?;
        self.last_log_likelihood = log_likelihood;
        Ok(build_rules(
            &self.split_counts,
            &unary,
            &binary,
            &state_mass,
            self.config.rule_pruning_epsilon,
        ))
    }
}
