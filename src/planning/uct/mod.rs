//! Upper Confidence bounds applied to Trees (UCT).

pub mod planner;
pub mod tree;
pub mod tree_walk;

pub use planner::{Uct, UctTree};
pub use tree::{ActionNode, NodeId, SearchTree, StateNode};
pub use tree_walk::UctTreeWalkPolicy;
