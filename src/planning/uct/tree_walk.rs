//! Greedy policy read off a UCT tree.

use std::collections::{HashMap, HashSet, VecDeque};

use log::warn;

use crate::{
    Error, Result,
    hashing::{HashingFactory, StateKey},
    model::WorldModel,
    policy::Policy,
    types::ActionProb,
};

use super::{planner::Uct, tree::NodeId};

/// Deterministic policy defined on the greedy path of the last UCT search.
///
/// Starting at the root, every node maps to its visited action with the best
/// average return, and the walk continues breadth-first through every
/// successor of that action. The walk stops early at the first node whose
/// visited actions all tie, since the tree gives no preference there.
/// States off the walked path have no action.
pub struct UctTreeWalkPolicy<'a, M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    planner: &'a Uct<M, H>,
    policy: HashMap<StateKey<M, H>, M::Action>,
}

impl<'a, M, H> UctTreeWalkPolicy<'a, M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    pub fn new(planner: &'a Uct<M, H>) -> Self {
        let mut walk = UctTreeWalkPolicy {
            planner,
            policy: HashMap::new(),
        };
        walk.compute_policy_from_tree();
        walk
    }

    fn compute_policy_from_tree(&mut self) {
        self.policy.clear();
        let Some(tree) = self.planner.tree() else {
            return;
        };

        let mut queue = VecDeque::from([NodeId::ROOT]);
        let mut seen = HashSet::from([NodeId::ROOT]);
        while let Some(id) = queue.pop_front() {
            let node = tree.node(id);
            if !node.contains_action_preference() {
                warn!(
                    "UCT tree shows no action preference at {:?}; consider replanning",
                    node.state()
                );
                break;
            }
            if let Some(choice) = node.best_return_action() {
                self.policy
                    .entry(node.state().key().clone())
                    .or_insert_with(|| choice.action().clone());
                for successor in choice.successors() {
                    if seen.insert(successor) {
                        queue.push_back(successor);
                    }
                }
            }
        }
    }

    /// Number of states the policy is defined for.
    pub fn len(&self) -> usize {
        self.policy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policy.is_empty()
    }

    fn lookup(&self, state: &M::State) -> Result<&M::Action> {
        let key = self.planner.hashing().canonical_key(state);
        self.policy.get(&key).ok_or_else(|| Error::PolicyUndefined {
            state: format!("{state:?}"),
        })
    }
}

impl<M, H> Policy for UctTreeWalkPolicy<'_, M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    type State = M::State;
    type Action = M::Action;

    fn action(&mut self, state: &M::State) -> Result<M::Action> {
        self.lookup(state).cloned()
    }

    fn policy_distribution(&mut self, state: &M::State) -> Result<Vec<ActionProb<M::Action>>> {
        Ok(vec![ActionProb::new(self.lookup(state)?.clone(), 1.0)])
    }

    fn is_defined_for(&mut self, state: &M::State) -> bool {
        self.lookup(state).is_ok()
    }
}
