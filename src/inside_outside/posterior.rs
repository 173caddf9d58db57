//! Per-node posteriors from finished inside/outside scores

use super::{InsideOutside, TreeScores};
use crate::lexicon::Lexicon;
use crate::tree::NodeId;
use crate::util::LOG_ZERO;
use crate::InductionError;

/// What a node rewrites to, with its joint substate posterior
///
/// Joint posteriors are linear probabilities laid out row-major over the
/// parent substate first.
#[derive(Debug, Clone, PartialEq)]
pub enum Production<'t> {
    /// Preterminal emitting `word`
    Lexical {
        /// Emitted word
        word: &'t str,
    },
    /// Single child
    Unary {
        /// Child label
        child: &'t str,
        /// Child substate count
        child_states: usize,
        /// `P(parent = i, child = j | tree)` at `i * child_states + j`
        joint: Vec<f64>,
    },
    /// Two children
    Binary {
        /// Left child label
        left: &'t str,
        /// Right child label
        right: &'t str,
        /// Left substate count
        left_states: usize,
        /// Right substate count
        right_states: usize,
        /// `P(parent = i, left = j, right = k | tree)`, row-major
        joint: Vec<f64>,
    },
}

/// Posterior view of one non-leaf node
#[derive(Debug, Clone, PartialEq)]
pub struct NodePosterior<'t> {
    /// Node position in the tree's arena
    pub id: NodeId,
    /// Node label
    pub label: &'t str,
    /// `P(node substate = i | tree)`
    pub state_posteriors: Vec<f64>,
    /// Rewrite and its joint posterior
    pub production: Production<'t>,
}

/// Posteriors of every non-leaf node of one tree, in pre-order
#[derive(Debug, Clone)]
pub struct TreePosteriors<'t> {
    /// One entry per preterminal or internal node
    pub nodes: Vec<NodePosterior<'t>>,
    /// Tree log-likelihood, `-inf` when the tree is impossible
    pub log_likelihood: f64,
    /// Nodes whose marginal was `-inf` and fell back to uniform
    pub uniform_fallbacks: usize,
}

fn normalized(log_scores: impl Iterator<Item = f64>, total: f64) -> Vec<f64> {
    log_scores.map(|score| (score - total).exp()).collect()
}

pub(super) fn recount_weights<'t, L: Lexicon>(
    engine: &InsideOutside<'_, L>,
    scores: &TreeScores<'t>,
) -> Result<TreePosteriors<'t>, InductionError> {
    let arena = &scores.arena;
    let mut nodes = Vec::new();
    let mut uniform_fallbacks = 0;

    for id in arena.ids() {
        let node = arena.node(id);
        if node.is_leaf() {
            continue;
        }
        let inside = scores.inside.get(id);
        let outside = scores.outside.get(id);
        let states = inside.len();
        let total = scores.node_marginal(id);
        let degenerate = total == LOG_ZERO || total.is_nan();
        if degenerate {
            uniform_fallbacks += 1;
        }

        let state_posteriors = if degenerate {
            vec![1.0 / states as f64; states]
        } else {
            normalized(inside.iter().zip(outside).map(|(i, o)| i + o), total)
        };

        let production = if node.is_preterminal() {
            Production::Lexical {
                word: node.children()[0].label(),
            }
        } else {
            match *arena.children(id) {
                [child] => {
                    let child_label = arena.node(child).label();
                    let child_in = scores.inside.get(child);
                    let child_states = child_in.len();
                    let shape = (states, child_states);
                    let joint = match engine.unary_beta(node.label(), child_label, shape)? {
                        Some(beta) if !degenerate => {
                            let logs = (0..states).flat_map(move |i| {
                                child_in
                                    .iter()
                                    .enumerate()
                                    .map(move |(j, c)| outside[i] + beta.get(i, j) + c)
                            });
                            normalized(logs, total)
                        }
                        _ => vec![1.0 / (states * child_states) as f64; states * child_states],
                    };
                    Production::Unary {
                        child: child_label,
                        child_states,
                        joint,
                    }
                }
                [left, right] => {
                    let left_label = arena.node(left).label();
                    let right_label = arena.node(right).label();
                    let left_in = scores.inside.get(left);
                    let right_in = scores.inside.get(right);
                    let (left_states, right_states) = (left_in.len(), right_in.len());
                    let size = states * left_states * right_states;
                    let shape = (states, left_states, right_states);
                    let beta = engine.binary_beta(node.label(), left_label, right_label, shape)?;
                    let joint = match beta {
                        Some(beta) if !degenerate => {
                            let mut logs = Vec::with_capacity(size);
                            for (i, out) in outside.iter().enumerate() {
                                for (j, l) in left_in.iter().enumerate() {
                                    for (k, r) in right_in.iter().enumerate() {
                                        logs.push(out + beta.get(i, j, k) + l + r);
                                    }
                                }
                            }
                            normalized(logs.into_iter(), total)
                        }
                        _ => vec![1.0 / size as f64; size],
                    };
                    Production::Binary {
                        left: left_label,
                        right: right_label,
                        left_states,
                        right_states,
                        joint,
                    }
                }
                ref children => {
                    return Err(InductionError::structural(
                        format!("expected 1 or 2 children, got {}", children.len()),
                        node,
                    ));
                }
            }
        };

        nodes.push(NodePosterior {
            id,
            label: node.label(),
            state_posteriors,
            production,
        });
    }

    Ok(TreePosteriors {
        nodes,
        log_likelihood: scores.log_likelihood(),
        uniform_fallbacks,
    })
}
