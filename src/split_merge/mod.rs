//! Split and merge rounds
//!
//! A split doubles every splittable label and expands the betas to match.
//! A merge scores each newly created substate by the likelihood the corpus
//! would lose if it were folded back into its sibling, collapses the
//! cheapest fraction, and re-estimates the betas in the reduced space.

mod effects;

pub use effects::{count_merge_effects, MergeDeltas};

use std::collections::BTreeMap;

use bitvec::prelude::*;
use tracing::debug;

use crate::beta::split_betas;
use crate::em::{rescale_temporary_betas, Accumulator};
use crate::inside_outside::InsideOutside;
use crate::lexicon::Lexicon;
use crate::session::InductionSession;
use crate::state::SplitCounts;
use crate::InductionError;

/// A substate that could be folded into its lower sibling
#[derive(Debug, Clone, PartialEq)]
pub struct MergeCandidate {
    /// Original label
    pub label: String,
    /// Substate index; merging folds it into `index - 1`
    pub index: usize,
    /// Weighted corpus log-likelihood lost by the merge
    pub loss: f64,
}

/// Per-label mapping from old substate index to collapsed index
///
/// Each mapping is monotone, starts at 0 and never skips a value. Labels
/// without an entry keep their substates unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeCorrespondence {
    mapping: BTreeMap<String, Vec<usize>>,
}

impl MergeCorrespondence {
    /// Mapping of one label
    pub fn get(&self, label: &str) -> Option<&[usize]> {
        self.mapping.get(label).map(Vec::as_slice)
    }

    /// Collapsed index of `index`; identity for unmapped labels
    pub fn project(&self, label: &str, index: usize) -> usize {
        self.mapping
            .get(label)
            .and_then(|map| map.get(index))
            .copied()
            .unwrap_or(index)
    }

    /// Substate count after the merge, if `label` is mapped
    pub fn new_count(&self, label: &str) -> Option<usize> {
        self.mapping
            .get(label)
            .and_then(|map| map.last())
            .map(|last| last + 1)
    }

    /// Count after the merge, `current` for unmapped labels
    pub fn target_count(&self, label: &str, current: usize) -> usize {
        self.new_count(label).unwrap_or(current)
    }

    /// Substates removed across all labels
    pub fn merged_substates(&self) -> usize {
        self.mapping
            .values()
            .map(|map| map.len() - map.last().map_or(0, |last| last + 1))
            .sum()
    }

    /// Whether no label is mapped
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// `(label, mapping)` in label order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.mapping
            .iter()
            .map(|(label, map)| (label.as_str(), map.as_slice()))
    }
}

/// Turn selected candidates into per-label correspondences
///
/// Candidate `(label, k)` folds `k` into `k - 1` and shifts every later
/// index down by one. A substate joins at most one merge: candidates
/// touching a substate already merged are skipped, as are out-of-range
/// indices.
pub fn build_merge_correspondence(
    counts: &SplitCounts,
    candidates: &[MergeCandidate],
) -> MergeCorrespondence {
    let mut mapping: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut used: BTreeMap<String, BitVec> = BTreeMap::new();

    for candidate in candidates {
        let states = counts.split_count(&candidate.label);
        let k = candidate.index;
        if k == 0 || k >= states {
            continue;
        }
        let map = mapping
            .entry(candidate.label.clone())
            .or_insert_with(|| (0..states).collect());
        let taken = used
            .entry(candidate.label.clone())
            .or_insert_with(|| bitvec![0; states]);
        if taken[k] || taken[k - 1] {
            continue;
        }
        taken.set(k, true);
        taken.set(k - 1, true);
        for target in &mut map[k..] {
            *target -= 1;
        }
    }

    MergeCorrespondence { mapping }
}

impl<L: Lexicon> InductionSession<L> {
    /// Expand every beta to the freshly doubled split counts
    pub fn split_betas(&mut self) -> Result<(), InductionError> {
        split_betas(
            &mut self.unary_betas,
            &mut self.binary_betas,
            &self.split_counts,
            self.config.split_noise,
            &mut self.rng,
        )
    }

    /// Score every sibling pair over the corpus, cheapest first
    pub fn score_merge_candidates(&self) -> Result<Vec<MergeCandidate>, InductionError> {
        let engine = InsideOutside::new(
            &self.split_counts,
            &self.unary_betas,
            &self.binary_betas,
            &self.lexicon,
        );
        let mut deltas = MergeDeltas::new();
        for entry in self.corpus.trainable() {
            let scores = engine.recount_tree(&entry.tree)?;
            count_merge_effects(
                &scores,
                &self.split_counts,
                &self.state_mass,
                entry.weight,
                &mut deltas,
            );
        }

        let mut candidates: Vec<MergeCandidate> = deltas
            .into_iter()
            .flat_map(|(label, losses)| {
                losses
                    .into_iter()
                    .enumerate()
                    .map(move |(p, loss)| MergeCandidate {
                        label: label.clone(),
                        index: 2 * p + 1,
                        loss,
                    })
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.loss
                .total_cmp(&b.loss)
                .then_with(|| a.label.cmp(&b.label))
                .then_with(|| a.index.cmp(&b.index))
        });
        Ok(candidates)
    }

    /// Merge back the cheapest fraction of new substates
    ///
    /// A no-op returning no candidates when the recombine rate is 0.
    pub fn merge_states(&mut self) -> Result<Vec<MergeCandidate>, InductionError> {
        let rate = self.config.split_recombine_rate;
        if rate <= 0.0 {
            return Ok(Vec::new());
        }
        let mut candidates = self.score_merge_candidates()?;
        let selected = ((candidates.len() as f64 * rate).floor() as usize).min(candidates.len());
        candidates.truncate(selected);
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let correspondence = self.build_merge_correspondence(&candidates);
        let merged = correspondence.merged_substates();
        self.recalculate_merged_betas(&correspondence)?;
        debug!(
            candidates = candidates.len(),
            merged,
            total_substates = self.split_counts.total_substates(),
            "merged substates"
        );
        Ok(candidates)
    }

    /// Correspondence against the session's current split counts
    pub fn build_merge_correspondence(&self, candidates: &[MergeCandidate]) -> MergeCorrespondence {
        build_merge_correspondence(&self.split_counts, candidates)
    }

    /// Re-estimate betas and lexicon in the collapsed substate space
    ///
    /// Posteriors come from the pre-merge model and are summed through the
    /// correspondence; the new tables are committed with the reduced split
    /// counts.
    pub fn recalculate_merged_betas(
        &mut self,
        correspondence: &MergeCorrespondence,
    ) -> Result<(), InductionError> {
        for (label, map) in correspondence.iter() {
            let states = self.split_counts.split_count(label);
            if map.len() != states {
                return Err(InductionError::ShapeMismatch {
                    context: format!("merge correspondence for {label} vs split count"),
                    expected: states,
                    actual: map.len(),
                });
            }
        }

        let mut expectations = {
            let engine = InsideOutside::new(
                &self.split_counts,
                &self.unary_betas,
                &self.binary_betas,
                &self.lexicon,
            );
            let mut accumulator =
                Accumulator::new(&self.split_counts, self.lexicon.fresh(), None)
                    .with_projection(correspondence);
            for entry in self.corpus.trainable() {
                let scores = engine.recount_tree(&entry.tree)?;
                let posteriors = engine.recount_weights(&scores)?;
                accumulator.add_tree(&posteriors, entry.weight);
            }
            accumulator.finish()
        };
        rescale_temporary_betas(&mut expectations.unary, &mut expectations.binary);

        for (label, _) in correspondence.iter() {
            let count = correspondence.target_count(label, self.split_counts.split_count(label));
            self.split_counts.set_split_count(label, count);
        }
        self.use_new_betas(false, expectations)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(label: &str, index: usize) -> MergeCandidate {
        MergeCandidate {
            label: label.to_string(),
            index,
            loss: 0.0,
        }
    }

    fn counts() -> SplitCounts {
        let mut counts = SplitCounts::new(["ROOT"], ".$$.");
        counts.set_split_count("NP", 4);
        counts.set_split_count("VP", 4);
        counts
    }

    #[test]
    fn test_adjacent_candidates_share_one_slot() {
        let correspondence =
            build_merge_correspondence(&counts(), &[candidate("NP", 1), candidate("NP", 2)]);
        assert_eq!(correspondence.get("NP"), Some(&[0, 0, 1, 2][..]));
        assert_eq!(correspondence.new_count("NP"), Some(3));
        assert_eq!(correspondence.get("VP"), None);
        assert_eq!(correspondence.merged_substates(), 1);
    }

    #[test]
    fn test_disjoint_pairs_both_merge() {
        let correspondence =
            build_merge_correspondence(&counts(), &[candidate("VP", 3), candidate("VP", 1)]);
        assert_eq!(correspondence.get("VP"), Some(&[0, 0, 1, 1][..]));
        assert_eq!(correspondence.target_count("VP", 4), 2);
        assert_eq!(correspondence.target_count("NP", 4), 4);
    }

    #[test]
    fn test_out_of_range_candidates_are_ignored() {
        let correspondence = build_merge_correspondence(
            &counts(),
            &[candidate("NP", 0), candidate("NP", 9), candidate("XX", 1)],
        );
        assert_eq!(correspondence.get("NP"), None);
        assert!(correspondence.is_empty());
        assert_eq!(correspondence.project("NP", 3), 3);
    }
}
