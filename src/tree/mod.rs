//! Constituency trees
//!
//! Trees are immutable once built. The inside-outside engine never keys
//! scores by node reference: it numbers the nodes of one tree in pre-order
//! ([`NodeArena`]) and stores per-node arrays by that number
//! ([`NodeScores`]), so two nodes that share a label stay distinct.

mod bracketed;
mod node;
mod traversal;

pub use bracketed::{parse_tree, parse_treebank, TreeParseError};
pub use node::Tree;
pub use traversal::{NodeArena, NodeId, NodeScores};
