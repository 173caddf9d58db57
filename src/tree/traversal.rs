//! Pre-order node numbering
//!
//! Each node of a single tree gets a stable integer id: the root is 0 and
//! every child id is larger than its parent's. Score arrays live in a
//! vector indexed by that id and are discarded with the pass.

use super::Tree;

/// Position of a node within one tree's pre-order numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug)]
struct ArenaNode<'t> {
    tree: &'t Tree,
    children: Vec<NodeId>,
}

/// Borrowed view of a tree with nodes addressable by [`NodeId`]
#[derive(Debug)]
pub struct NodeArena<'t> {
    nodes: Vec<ArenaNode<'t>>,
}

impl<'t> NodeArena<'t> {
    /// Number every node of `tree` in pre-order
    pub fn build(tree: &'t Tree) -> Self {
        let mut nodes = Vec::with_capacity(tree.node_count());
        Self::visit(tree, &mut nodes);
        Self { nodes }
    }

    fn visit(tree: &'t Tree, nodes: &mut Vec<ArenaNode<'t>>) -> NodeId {
        let id = NodeId(nodes.len());
        nodes.push(ArenaNode {
            tree,
            children: Vec::new(),
        });
        let children = tree
            .children()
            .iter()
            .map(|child| Self::visit(child, nodes))
            .collect();
        nodes[id.0].children = children;
        id
    }

    /// Root id (always 0)
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, leaves included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds no nodes (never true for a built tree)
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Tree node behind an id
    #[inline]
    pub fn node(&self, id: NodeId) -> &'t Tree {
        self.nodes[id.0].tree
    }

    /// Child ids in left-to-right order
    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// All ids in pre-order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }
}

/// Per-node log-score arrays for one pass over one tree
#[derive(Debug, Clone)]
pub struct NodeScores {
    scores: Vec<Vec<f64>>,
}

impl NodeScores {
    /// Empty arrays for `len` nodes
    pub fn new(len: usize) -> Self {
        Self {
            scores: vec![Vec::new(); len],
        }
    }

    /// Scores of a node (empty if never set, e.g. leaves)
    #[inline]
    pub fn get(&self, id: NodeId) -> &[f64] {
        &self.scores[id.0]
    }

    /// Replace the scores of a node
    #[inline]
    pub fn set(&mut self, id: NodeId, scores: Vec<f64>) {
        self.scores[id.0] = scores;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pre_order_numbering() {
        // (S (NP (NN a)) (VP (VB b)))
        let tree = Tree::new(
            "S",
            vec![
                Tree::new("NP", vec![Tree::preterminal("NN", "a")]),
                Tree::new("VP", vec![Tree::preterminal("VB", "b")]),
            ],
        );
        let arena = NodeArena::build(&tree);
        let labels: Vec<&str> = arena.ids().map(|id| arena.node(id).label()).collect();
        assert_eq!(labels, vec!["S", "NP", "NN", "a", "VP", "VB", "b"]);
        assert_eq!(arena.children(arena.root()), &[NodeId(1), NodeId(4)]);
    }

    #[test]
    fn test_equal_subtrees_get_distinct_ids() {
        let np = Tree::new("NP", vec![Tree::preterminal("NN", "a")]);
        let tree = Tree::new("S", vec![np.clone(), np]);
        let arena = NodeArena::build(&tree);
        let kids = arena.children(arena.root());
        assert_ne!(kids[0], kids[1]);
        assert_eq!(arena.node(kids[0]), arena.node(kids[1]));

        let mut scores = NodeScores::new(arena.len());
        scores.set(kids[0], vec![-1.0]);
        assert_eq!(scores.get(kids[0]), &[-1.0]);
        assert!(scores.get(kids[1]).is_empty());
    }
}
