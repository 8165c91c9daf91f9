//! Arena-backed UCT search tree.
//!
//! State nodes live in one `Vec` and refer to each other by [`NodeId`]. A
//! node is *connected* once it has been indexed by (state key, depth); only
//! connected nodes can be reached again by later rollouts. At most one
//! connected node exists per (state key, depth) pair.

use std::collections::{HashMap, HashSet};

use crate::{hashing::HashableState, ports::TreeStats};

/// Index of a state node in the arena; ids grow in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

/// Statistics for one action taken from a state node.
#[derive(Debug, Clone)]
pub struct ActionNode<A, K> {
    action: A,
    visits: usize,
    total_return: f64,
    // composite actions can reach the same state at several depths
    successors: HashMap<K, Vec<NodeId>>,
}

impl<A, K: Eq + std::hash::Hash> ActionNode<A, K> {
    fn new(action: A) -> Self {
        ActionNode {
            action,
            visits: 0,
            total_return: 0.0,
            successors: HashMap::new(),
        }
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    pub fn visits(&self) -> usize {
        self.visits
    }

    /// Mean sampled return; zero before the first visit.
    pub fn average_return(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.total_return / self.visits as f64
        }
    }

    pub(crate) fn update(&mut self, sampled_return: f64) {
        self.visits += 1;
        self.total_return += sampled_return;
    }

    pub fn references_successor(&self, key: &K, node: NodeId) -> bool {
        self.successors
            .get(key)
            .is_some_and(|nodes| nodes.contains(&node))
    }

    pub(crate) fn add_successor(&mut self, key: K, node: NodeId) {
        let nodes = self.successors.entry(key).or_default();
        if !nodes.contains(&node) {
            nodes.push(node);
        }
    }

    /// Every successor node, in creation order.
    pub fn successors(&self) -> Vec<NodeId> {
        let mut all: Vec<NodeId> = self.successors.values().flatten().copied().collect();
        all.sort_unstable();
        all
    }
}

/// A state at a given depth from the root.
#[derive(Debug, Clone)]
pub struct StateNode<S, K, A> {
    state: HashableState<S, K>,
    depth: usize,
    visits: usize,
    actions: Vec<ActionNode<A, K>>,
}

impl<S, K: Eq + std::hash::Hash, A> StateNode<S, K, A> {
    pub fn state(&self) -> &HashableState<S, K> {
        &self.state
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn visits(&self) -> usize {
        self.visits
    }

    pub fn actions(&self) -> &[ActionNode<A, K>] {
        &self.actions
    }

    /// Visited action with the highest average return; the first wins ties.
    pub fn best_return_action(&self) -> Option<&ActionNode<A, K>> {
        let mut best: Option<&ActionNode<A, K>> = None;
        for node in self.actions.iter().filter(|an| an.visits > 0) {
            if best.is_none_or(|b| node.average_return() > b.average_return()) {
                best = Some(node);
            }
        }
        best
    }

    /// Whether the visited actions single out a preferred one.
    ///
    /// False only when several actions were visited and all have the same
    /// average return; zero or one visited action counts as a preference.
    pub fn contains_action_preference(&self) -> bool {
        let mut visited = self.actions.iter().filter(|an| an.visits > 0);
        let Some(first) = visited.next() else {
            return true;
        };
        let mut multiple = false;
        for other in visited {
            if other.average_return() != first.average_return() {
                return true;
            }
            multiple = true;
        }
        !multiple
    }
}

/// Search tree for one planning call.
#[derive(Debug, Clone)]
pub struct SearchTree<S, K, A> {
    nodes: Vec<StateNode<S, K, A>>,
    depth_index: Vec<HashMap<K, NodeId>>,
    states_to_nodes: HashMap<K, Vec<NodeId>>,
    unique_states: HashSet<K>,
    connected: usize,
    total_visits: usize,
}

impl<S, K, A> SearchTree<S, K, A>
where
    K: Clone + Eq + std::hash::Hash,
{
    /// Tree holding only the connected root.
    pub fn new(root: HashableState<S, K>, actions: Vec<A>) -> Self {
        let mut tree = SearchTree {
            nodes: Vec::new(),
            depth_index: Vec::new(),
            states_to_nodes: HashMap::new(),
            unique_states: HashSet::new(),
            connected: 0,
            total_visits: 0,
        };
        let root = tree.create(root, 0, actions);
        tree.connect(root);
        tree
    }

    pub fn root(&self) -> &StateNode<S, K, A> {
        &self.nodes[NodeId::ROOT.0]
    }

    pub fn node(&self, id: NodeId) -> &StateNode<S, K, A> {
        &self.nodes[id.0]
    }

    /// Add an unconnected node to the arena.
    pub(crate) fn create(
        &mut self,
        state: HashableState<S, K>,
        depth: usize,
        actions: Vec<A>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(StateNode {
            state,
            depth,
            visits: 0,
            actions: actions.into_iter().map(ActionNode::new).collect(),
        });
        id
    }

    /// Index a node by (state key, depth) so later rollouts can reach it.
    pub(crate) fn connect(&mut self, id: NodeId) {
        let node = &self.nodes[id.0];
        let key = node.state.key().clone();
        while self.depth_index.len() <= node.depth {
            self.depth_index.push(HashMap::new());
        }
        self.depth_index[node.depth].insert(key.clone(), id);
        self.states_to_nodes.entry(key.clone()).or_default().push(id);
        self.unique_states.insert(key);
        self.connected += 1;
    }

    /// Connected node for `key` at `depth`, if any.
    pub fn lookup(&self, key: &K, depth: usize) -> Option<NodeId> {
        self.depth_index.get(depth)?.get(key).copied()
    }

    /// Every connected node for a state, one per depth it was reached at.
    pub fn nodes_for(&self, key: &K) -> &[NodeId] {
        self.states_to_nodes.get(key).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn record_visit(&mut self) {
        self.total_visits += 1;
    }

    pub(crate) fn action_node_mut(&mut self, id: NodeId, action: usize) -> &mut ActionNode<A, K> {
        &mut self.nodes[id.0].actions[action]
    }

    /// Close out one pass through a node: bump its count and record the
    /// return of the action taken.
    pub(crate) fn backup(&mut self, id: NodeId, action: usize, sampled_return: f64) {
        let node = &mut self.nodes[id.0];
        node.visits += 1;
        node.actions[action].update(sampled_return);
    }

    pub fn tree_size(&self) -> usize {
        self.connected
    }

    pub fn unique_states(&self) -> usize {
        self.unique_states.len()
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            unique_states: self.unique_states.len(),
            tree_size: self.connected,
            total_visits: self.total_visits,
        }
    }
}
