//! Likelihood loss of collapsing split siblings
//!
//! For a node with substates `0..n` and a sibling pair `(2p, 2p + 1)`, the
//! merged node keeps every other substate and replaces the pair with one
//! substate whose inside score mixes the two by their share of the pair's
//! state mass and whose outside score is the sum of theirs. The loss is
//! the node marginal before minus the marginal after.

use std::collections::BTreeMap;

use crate::em::StateMass;
use crate::inside_outside::TreeScores;
use crate::state::SplitCounts;
use crate::util::{log_add, LOG_ZERO};

/// Accumulated loss per label, one slot per sibling pair
pub type MergeDeltas = BTreeMap<String, Vec<f64>>;

/// Add `weight * loss` of every sibling pair of every node to `deltas`
///
/// Boundary-tag nodes, start symbols and nodes whose marginal is `-inf`
/// contribute nothing.
pub fn count_merge_effects(
    scores: &TreeScores<'_>,
    counts: &SplitCounts,
    state_mass: &StateMass,
    weight: f64,
    deltas: &mut MergeDeltas,
) {
    for id in scores.arena.ids() {
        let node = scores.arena.node(id);
        if node.is_leaf() || counts.is_unsplittable(node.label()) {
            continue;
        }
        let inside = scores.inside.get(id);
        let outside = scores.outside.get(id);
        let pairs = inside.len() / 2;
        if pairs == 0 {
            continue;
        }
        let total = scores.node_marginal(id);
        if !total.is_finite() {
            continue;
        }

        let slots = deltas
            .entry(node.label().to_string())
            .or_insert_with(|| vec![0.0; pairs]);
        if slots.len() < pairs {
            slots.resize(pairs, 0.0);
        }

        for (p, slot) in slots.iter_mut().enumerate().take(pairs) {
            let (a, b) = (2 * p, 2 * p + 1);
            let mass_a = state_mass.substate(node.label(), a);
            let mass_b = state_mass.substate(node.label(), b);
            let (share_a, share_b) = if mass_a + mass_b > 0.0 {
                let sum = mass_a + mass_b;
                (mass_a / sum, mass_b / sum)
            } else {
                (0.5, 0.5)
            };

            let merged_inside = log_add(share_a.ln() + inside[a], share_b.ln() + inside[b]);
            let merged_outside = log_add(outside[a], outside[b]);
            let rest = inside
                .iter()
                .zip(outside)
                .enumerate()
                .filter(|(i, _)| *i != a && *i != b)
                .fold(LOG_ZERO, |acc, (_, (x, y))| log_add(acc, x + y));
            let merged_total = log_add(rest, merged_inside + merged_outside);

            *slot += weight * (total - merged_total);
        }
    }
}
