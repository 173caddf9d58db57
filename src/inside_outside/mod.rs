//! Log-space inside-outside over observed trees
//!
//! The tree's labels are observed, so the only hidden variables are the
//! substates of each node. Inside runs post-order, outside pre-order from
//! the root, both over a [`NodeArena`] so that score arrays are addressed
//! by node occurrence.
//!
//! Missing betas contribute `-inf`; they never raise. Arity outside
//! `{1, 2}` and leaves reached directly are structural violations.

mod posterior;

pub use posterior::{NodePosterior, Production, TreePosteriors};

use crate::beta::{BinaryBeta, BinaryBetas, UnaryBeta, UnaryBetas};
use crate::lexicon::Lexicon;
use crate::state::SplitCounts;
use crate::tree::{NodeArena, NodeId, NodeScores, Tree};
use crate::util::{log_add, log_uniform, LOG_ZERO};
use crate::InductionError;

/// Message for a leaf reaching the inside pass
pub const LEAF_INSIDE_MESSAGE: &str = "inside is only defined for preterminal and internal nodes";

/// Inside and outside scores of one tree
#[derive(Debug)]
pub struct TreeScores<'t> {
    /// Pre-order numbering of the tree
    pub arena: NodeArena<'t>,
    /// Inside log-scores per node substate
    pub inside: NodeScores,
    /// Outside log-scores per node substate
    pub outside: NodeScores,
}

impl TreeScores<'_> {
    /// `log Σ_i inside(n, i) + outside(n, i)` at node `id`
    pub fn node_marginal(&self, id: NodeId) -> f64 {
        let inside = self.inside.get(id);
        let outside = self.outside.get(id);
        inside
            .iter()
            .zip(outside)
            .fold(LOG_ZERO, |acc, (i, o)| log_add(acc, i + o))
    }

    /// Log-likelihood of the tree under the current model
    pub fn log_likelihood(&self) -> f64 {
        self.node_marginal(self.arena.root())
    }
}

/// Inside-outside engine over the session's current parameters
#[derive(Debug)]
pub struct InsideOutside<'a, L: Lexicon> {
    counts: &'a SplitCounts,
    unary: &'a UnaryBetas,
    binary: &'a BinaryBetas,
    lexicon: &'a L,
    split_ongoing: bool,
}

impl<'a, L: Lexicon> InsideOutside<'a, L> {
    /// Engine reading the given parameters
    pub fn new(
        counts: &'a SplitCounts,
        unary: &'a UnaryBetas,
        binary: &'a BinaryBetas,
        lexicon: &'a L,
    ) -> Self {
        Self {
            counts,
            unary,
            binary,
            lexicon,
            split_ongoing: false,
        }
    }

    /// Score preterminal substate `i` with the lexicon entry of `i / 2`
    ///
    /// Used for the first pass after a split, when the lexicon only knows
    /// the pre-split substates.
    pub fn with_split_ongoing(mut self, split_ongoing: bool) -> Self {
        self.split_ongoing = split_ongoing;
        self
    }

    fn substates(&self, label: &str) -> Result<usize, InductionError> {
        match self.counts.split_count(label) {
            0 => Err(InductionError::UnknownLabel {
                label: label.to_string(),
            }),
            n => Ok(n),
        }
    }

    fn unary_beta(
        &self,
        parent: &str,
        child: &str,
        shape: (usize, usize),
    ) -> Result<Option<&'a UnaryBeta>, InductionError> {
        match self.unary.get(parent, child) {
            Some(beta) if beta.shape() != shape => Err(InductionError::ShapeMismatch {
                context: format!("unary beta {parent} -> {child} vs split counts"),
                expected: shape.0 * shape.1,
                actual: beta.shape().0 * beta.shape().1,
            }),
            found => Ok(found),
        }
    }

    fn binary_beta(
        &self,
        parent: &str,
        left: &str,
        right: &str,
        shape: (usize, usize, usize),
    ) -> Result<Option<&'a BinaryBeta>, InductionError> {
        match self.binary.get(parent, left, right) {
            Some(beta) if beta.shape() != shape => {
                let (p, l, r) = beta.shape();
                Err(InductionError::ShapeMismatch {
                    context: format!("binary beta {parent} -> {left} {right} vs split counts"),
                    expected: shape.0 * shape.1 * shape.2,
                    actual: p * l * r,
                })
            }
            found => Ok(found),
        }
    }

    /// Inside scores for every non-leaf node of `tree`
    pub fn recount_inside<'t>(
        &self,
        tree: &'t Tree,
    ) -> Result<(NodeArena<'t>, NodeScores), InductionError> {
        let arena = NodeArena::build(tree);
        let mut inside = NodeScores::new(arena.len());
        self.inside_at(&arena, arena.root(), &mut inside)?;
        Ok((arena, inside))
    }

    fn inside_at(
        &self,
        arena: &NodeArena<'_>,
        id: NodeId,
        inside: &mut NodeScores,
    ) -> Result<(), InductionError> {
        let node = arena.node(id);
        if node.is_leaf() {
            return Err(InductionError::structural(LEAF_INSIDE_MESSAGE, node));
        }

        let label = node.label();
        if node.is_preterminal() {
            let states = self.substates(label)?;
            let word = node.children()[0].label();
            let scores = (0..states)
                .map(|i| {
                    let lexical = if self.split_ongoing { i / 2 } else { i };
                    self.lexicon
                        .score(word, &self.counts.state_name(label, lexical))
                })
                .collect();
            inside.set(id, scores);
            return Ok(());
        }

        match *arena.children(id) {
            [child] => {
                self.inside_at(arena, child, inside)?;
                let states = self.substates(label)?;
                let child_label = arena.node(child).label();
                let child_states = self.substates(child_label)?;
                let beta = self.unary_beta(label, child_label, (states, child_states))?;

                let child_in = inside.get(child);
                let scores = match beta {
                    None => vec![LOG_ZERO; states],
                    Some(beta) => (0..states)
                        .map(|i| {
                            child_in
                                .iter()
                                .enumerate()
                                .fold(LOG_ZERO, |acc, (j, c)| log_add(acc, c + beta.get(i, j)))
                        })
                        .collect(),
                };
                inside.set(id, scores);
            }
            [left, right] => {
                self.inside_at(arena, left, inside)?;
                self.inside_at(arena, right, inside)?;
                let states = self.substates(label)?;
                let left_label = arena.node(left).label();
                let right_label = arena.node(right).label();
                let shape = (
                    states,
                    self.substates(left_label)?,
                    self.substates(right_label)?,
                );
                let beta = self.binary_beta(label, left_label, right_label, shape)?;

                let left_in = inside.get(left);
                let right_in = inside.get(right);
                let scores = match beta {
                    None => vec![LOG_ZERO; states],
                    Some(beta) => (0..states)
                        .map(|i| {
                            let mut acc = LOG_ZERO;
                            for (j, l) in left_in.iter().enumerate() {
                                for (k, r) in right_in.iter().enumerate() {
                                    acc = log_add(acc, l + r + beta.get(i, j, k));
                                }
                            }
                            acc
                        })
                        .collect(),
                };
                inside.set(id, scores);
            }
            ref children => {
                return Err(InductionError::structural(
                    format!("expected 1 or 2 children, got {}", children.len()),
                    node,
                ));
            }
        }
        Ok(())
    }

    /// Outside scores given finished inside scores
    ///
    /// Root substates share a uniform prior of `-ln n`, which is `log 1`
    /// for a start symbol that never splits.
    pub fn recount_outside(
        &self,
        arena: &NodeArena<'_>,
        inside: &NodeScores,
    ) -> Result<NodeScores, InductionError> {
        let mut outside = NodeScores::new(arena.len());
        let root = arena.root();
        let root_states = self.substates(arena.node(root).label())?;
        outside.set(root, vec![log_uniform(root_states); root_states]);
        self.outside_at(arena, root, inside, &mut outside)?;
        Ok(outside)
    }

    fn outside_at(
        &self,
        arena: &NodeArena<'_>,
        id: NodeId,
        inside: &NodeScores,
        outside: &mut NodeScores,
    ) -> Result<(), InductionError> {
        let node = arena.node(id);
        if node.is_leaf() || node.is_preterminal() {
            return Ok(());
        }
        let label = node.label();
        let states = self.substates(label)?;

        match *arena.children(id) {
            [child] => {
                let child_label = arena.node(child).label();
                let child_states = self.substates(child_label)?;
                let beta = self.unary_beta(label, child_label, (states, child_states))?;
                let parent_out = outside.get(id);

                let scores = match beta {
                    None => vec![LOG_ZERO; child_states],
                    Some(beta) => (0..child_states)
                        .map(|j| {
                            parent_out
                                .iter()
                                .enumerate()
                                .fold(LOG_ZERO, |acc, (i, p)| log_add(acc, p + beta.get(i, j)))
                        })
                        .collect(),
                };
                outside.set(child, scores);
                self.outside_at(arena, child, inside, outside)
            }
            [left, right] => {
                let left_label = arena.node(left).label();
                let right_label = arena.node(right).label();
                let left_states = self.substates(left_label)?;
                let right_states = self.substates(right_label)?;
                let beta = self.binary_beta(
                    label,
                    left_label,
                    right_label,
                    (states, left_states, right_states),
                )?;
                let parent_out = outside.get(id);
                let left_in = inside.get(left);
                let right_in = inside.get(right);

                let (left_scores, right_scores) = match beta {
                    None => (vec![LOG_ZERO; left_states], vec![LOG_ZERO; right_states]),
                    Some(beta) => {
                        let mut left_scores = vec![LOG_ZERO; left_states];
                        let mut right_scores = vec![LOG_ZERO; right_states];
                        for (i, p) in parent_out.iter().enumerate() {
                            for j in 0..left_states {
                                for k in 0..right_states {
                                    let rule = p + beta.get(i, j, k);
                                    left_scores[j] = log_add(left_scores[j], rule + right_in[k]);
                                    right_scores[k] = log_add(right_scores[k], rule + left_in[j]);
                                }
                            }
                        }
                        (left_scores, right_scores)
                    }
                };
                outside.set(left, left_scores);
                outside.set(right, right_scores);
                self.outside_at(arena, left, inside, outside)?;
                self.outside_at(arena, right, inside, outside)
            }
            ref children => Err(InductionError::structural(
                format!("expected 1 or 2 children, got {}", children.len()),
                node,
            )),
        }
    }

    /// Inside then outside over one tree
    pub fn recount_tree<'t>(&self, tree: &'t Tree) -> Result<TreeScores<'t>, InductionError> {
        let (arena, inside) = self.recount_inside(tree)?;
        let outside = self.recount_outside(&arena, &inside)?;
        Ok(TreeScores {
            arena,
            inside,
            outside,
        })
    }

    /// Posterior substate and transition distributions for every non-leaf node
    pub fn recount_weights<'t>(
        &self,
        scores: &TreeScores<'t>,
    ) -> Result<TreePosteriors<'t>, InductionError> {
        posterior::recount_weights(self, scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::SmoothedLexicon;
    use crate::tree::parse_tree;
    use crate::util::LOG_ONE;

    struct Fixture {
        counts: SplitCounts,
        unary: UnaryBetas,
        binary: BinaryBetas,
        lexicon: SmoothedLexicon,
    }

    fn fixture() -> Fixture {
        let mut counts = SplitCounts::new(["ROOT"], ".$$.");
        for (label, n) in [("ROOT", 1), ("S", 2), ("NP", 2), ("VP", 1), ("NN", 1), ("VB", 1)] {
            counts.set_split_count(label, n);
        }
        let mut unary = UnaryBetas::new();
        let mut root = UnaryBeta::filled(1, 2, LOG_ZERO);
        root.set(0, 0, 0.3_f64.ln());
        root.set(0, 1, 0.7_f64.ln());
        unary.insert("ROOT", "S", root);
        unary.insert("NP", "NN", UnaryBeta::filled(2, 1, LOG_ONE));
        unary.insert("VP", "VB", UnaryBeta::filled(1, 1, LOG_ONE));

        let mut binary = BinaryBetas::new();
        let mut s = BinaryBeta::filled(2, 2, 1, LOG_ZERO);
        s.set(0, 0, 0, 0.9_f64.ln());
        s.set(0, 1, 0, 0.1_f64.ln());
        s.set(1, 0, 0, 0.2_f64.ln());
        s.set(1, 1, 0, 0.8_f64.ln());
        binary.insert("S", "NP", "VP", s);

        let mut lexicon = SmoothedLexicon::default();
        lexicon.train("dog", "NN^0", 1.0);
        lexicon.train("barks", "VB^0", 1.0);
        lexicon.finish_training();

        Fixture {
            counts,
            unary,
            binary,
            lexicon,
        }
    }

    fn tree() -> Tree {
        parse_tree("(ROOT (S (NP (NN dog)) (VP (VB barks))))").unwrap()
    }

    #[test]
    fn test_marginal_is_constant_across_nodes() {
        let f = fixture();
        let engine = InsideOutside::new(&f.counts, &f.unary, &f.binary, &f.lexicon);
        let tree = tree();
        let scores = engine.recount_tree(&tree).unwrap();
        let total = scores.log_likelihood();
        assert!(total.is_finite());
        for id in scores.arena.ids() {
            if scores.arena.node(id).is_leaf() {
                continue;
            }
            assert!((scores.node_marginal(id) - total).abs() < 1e-9);
        }
    }

    #[test]
    fn test_inside_matches_hand_computation() {
        let f = fixture();
        let engine = InsideOutside::new(&f.counts, &f.unary, &f.binary, &f.lexicon);
        let tree = tree();
        let (arena, inside) = engine.recount_inside(&tree).unwrap();

        let nn = f.lexicon.score("dog", "NN^0").exp();
        let vb = f.lexicon.score("barks", "VB^0").exp();
        // NP^x and VP carry their child's score unchanged; S mixes them
        let s0 = 0.9 * nn * vb + 0.1 * nn * vb;
        let s1 = 0.2 * nn * vb + 0.8 * nn * vb;
        let root = 0.3 * s0 + 0.7 * s1;
        assert!((inside.get(arena.root())[0] - root.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_three_children_is_structural_violation() {
        let f = fixture();
        let engine = InsideOutside::new(&f.counts, &f.unary, &f.binary, &f.lexicon);
        let tree = parse_tree("(S (NN a) (NN b) (NN c))").unwrap();
        let err = engine.recount_inside(&tree).unwrap_err();
        assert!(err.to_string().contains("1 or 2 children"));
    }

    #[test]
    fn test_bare_leaf_is_structural_violation() {
        let f = fixture();
        let engine = InsideOutside::new(&f.counts, &f.unary, &f.binary, &f.lexicon);
        let err = engine.recount_inside(&Tree::leaf("dog")).unwrap_err();
        assert!(matches!(err, InductionError::StructuralViolation { .. }));
    }

    #[test]
    fn test_missing_beta_propagates_negative_infinity() {
        let f = fixture();
        let engine = InsideOutside::new(&f.counts, &f.unary, &f.binary, &f.lexicon);
        let tree = parse_tree("(ROOT (NP (NN dog)))").unwrap();
        let scores = engine.recount_tree(&tree).unwrap();
        assert_eq!(scores.log_likelihood(), LOG_ZERO);
    }

    #[test]
    fn test_split_root_likelihood_is_a_mixture() {
        let f = fixture();
        let engine = InsideOutside::new(&f.counts, &f.unary, &f.binary, &f.lexicon);
        let tree = parse_tree("(S (NP (NN dog)) (VP (VB barks)))").unwrap();
        let scores = engine.recount_tree(&tree).unwrap();

        let root = scores.arena.root();
        assert_eq!(scores.outside.get(root), &[-(2.0_f64.ln()); 2]);

        let nn = f.lexicon.score("dog", "NN^0").exp();
        let vb = f.lexicon.score("barks", "VB^0").exp();
        // each S row sums to 1 over NP, so the mixture is nn * vb
        let expected = (nn * vb).ln();
        assert!((scores.log_likelihood() - expected).abs() < 1e-9);
        assert!(scores.log_likelihood() <= 0.0);
        for id in scores.arena.ids() {
            if !scores.arena.node(id).is_leaf() {
                assert!((scores.node_marginal(id) - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_split_ongoing_scores_siblings_through_parent_entry() {
        let mut counts = SplitCounts::new(["ROOT"], ".$$.");
        counts.set_split_count("NN", 2);
        let mut lexicon = SmoothedLexicon::default();
        lexicon.train("dog", "NN^0", 3.0);
        lexicon.train("cat", "NN^0", 1.0);
        lexicon.finish_training();
        let (unary, binary) = (UnaryBetas::new(), BinaryBetas::new());
        let tree = parse_tree("(NN dog)").unwrap();

        let engine =
            InsideOutside::new(&counts, &unary, &binary, &lexicon).with_split_ongoing(true);
        let (arena, inside) = engine.recount_inside(&tree).unwrap();
        let scores = inside.get(arena.root());
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0], scores[1]);
        assert_eq!(scores[0], lexicon.score("dog", "NN^0"));

        let engine = InsideOutside::new(&counts, &unary, &binary, &lexicon);
        let (arena, inside) = engine.recount_inside(&tree).unwrap();
        let scores = inside.get(arena.root());
        assert!(scores[0] > scores[1]);
        assert_eq!(scores[1], lexicon.score("dog", "NN^1"));
    }

    #[test]
    fn test_shape_mismatch_is_fatal() {
        let mut f = fixture();
        f.counts.set_split_count("NP", 4);
        let engine = InsideOutside::new(&f.counts, &f.unary, &f.binary, &f.lexicon);
        let err = engine.recount_tree(&tree()).unwrap_err();
        assert!(matches!(err, InductionError::ShapeMismatch { .. }));
    }
}
