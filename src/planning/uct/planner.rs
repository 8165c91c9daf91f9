//! UCT planner.

use log::{debug, info};
use rand::rngs::StdRng;

use crate::{
    Error, Result,
    config::UctConfig,
    hashing::{HashingFactory, StateKey},
    model::WorldModel,
    observers::NoopObserver,
    ports::PlanningObserver,
    types::{Discount, QValue},
    utils::{argmax_random_tie, build_rng},
    value::{QProvider, optimal_value},
};

use super::tree::{NodeId, SearchTree};

/// Search tree type grown by [`Uct`] over model `M` with factory `H`.
pub type UctTree<M, H> =
    SearchTree<<M as WorldModel>::State, StateKey<M, H>, <M as WorldModel>::Action>;

type GoalTest<S> = Box<dyn Fn(&S) -> bool>;

/// Monte Carlo tree search with UCB1 action selection.
///
/// Each planning call grows a fresh tree from the query state through a
/// fixed number of rollouts. A rollout walks down the tree, picking untried
/// actions first and otherwise maximizing
/// `average_return + c · sqrt(ln N(s) / N(s,a))` (ties broken uniformly at
/// random), samples the model, and backs the discounted return up through
/// every action it took. Rollouts end at the horizon, at a terminal state,
/// or in a state without actions. Recursion depth is bounded by the horizon.
pub struct Uct<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    model: M,
    hashing: H,
    discount: Discount,
    horizon: usize,
    max_rollouts: usize,
    exploration_bias: f64,
    seed: Option<u64>,
    rng: StdRng,
    goal: Option<GoalTest<M::State>>,
    found_goal: bool,
    found_goal_on_rollout: bool,
    rollouts: usize,
    tree: Option<UctTree<M, H>>,
    observer: Box<dyn PlanningObserver>,
}

impl<M, H> Uct<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    pub fn new(model: M, hashing: H, config: UctConfig) -> Result<Self> {
        config.validate()?;
        Ok(Uct {
            model,
            hashing,
            discount: Discount::new(config.discount)?,
            horizon: config.horizon,
            max_rollouts: config.rollouts,
            exploration_bias: config.exploration_bias,
            seed: config.seed,
            rng: build_rng(config.seed),
            goal: None,
            found_goal: false,
            found_goal_on_rollout: false,
            rollouts: 0,
            tree: None,
            observer: Box::new(NoopObserver),
        })
    }

    /// Stop planning as soon as a rollout reaches a terminal state satisfying `goal`.
    pub fn with_goal_condition(mut self, goal: impl Fn(&M::State) -> bool + 'static) -> Self {
        self.goal = Some(Box::new(goal));
        self
    }

    pub fn with_observer(mut self, observer: impl PlanningObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Grow a new tree rooted at `state`.
    pub fn plan_from(&mut self, state: &M::State) -> Result<()> {
        let root = self.hashing.hash_state(state);
        let actions = self.model.applicable_actions(state);
        self.tree = Some(SearchTree::new(root, actions));
        self.found_goal = false;
        self.rollouts = 0;

        self.observer.on_planning_start("uct", self.max_rollouts)?;
        let mut last_unique = 0;
        while !self.found_goal && self.rollouts < self.max_rollouts {
            self.found_goal_on_rollout = false;
            self.rollout(NodeId::ROOT, 0, self.horizon as isize)?;
            self.rollouts += 1;

            let stats = self.tree_ref()?.stats();
            if stats.unique_states > last_unique {
                debug!(
                    "{}; unique states: {}; tree size: {}; total visits: {}",
                    self.rollouts, stats.unique_states, stats.tree_size, stats.total_visits
                );
                last_unique = stats.unique_states;
            }
            self.observer.on_rollout(self.rollouts, &stats)?;
        }
        if self.found_goal {
            self.observer.on_goal_found(self.rollouts)?;
        }
        if let Some(best) = self.tree_ref()?.root().best_return_action() {
            info!(
                "rollouts: {}; best action expected return: {}",
                self.rollouts,
                best.average_return()
            );
        }
        self.observer.on_planning_end()
    }

    fn tree_ref(&self) -> Result<&UctTree<M, H>> {
        self.tree
            .as_ref()
            .ok_or_else(|| Error::invalid_config("UCT has not planned yet"))
    }

    fn tree_mut(&mut self) -> Result<&mut UctTree<M, H>> {
        self.tree
            .as_mut()
            .ok_or_else(|| Error::invalid_config("UCT has not planned yet"))
    }

    /// One pass down from `node`; returns the sampled discounted return.
    ///
    /// New nodes are connected while `children_left` stays positive, or
    /// whenever the rollout has reached the goal.
    fn rollout(&mut self, node: NodeId, depth: usize, children_left: isize) -> Result<f64> {
        self.tree_mut()?.record_visit();
        if depth >= self.horizon {
            return Ok(0.0);
        }

        let state = self.tree_ref()?.node(node).state().clone();
        if self.model.is_terminal(state.state()) {
            if self.goal.as_ref().is_some_and(|goal| goal(state.state())) {
                self.found_goal = true;
                self.found_goal_on_rollout = true;
            }
            debug!("{} hit terminal at depth {depth}", self.rollouts);
            return Ok(0.0);
        }

        let Some(choice) = self.select_action(node)? else {
            return Ok(0.0);
        };
        let action = self.tree_ref()?.node(node).actions()[choice].action().clone();
        let outcome = self.model.sample(state.state(), &action, &mut self.rng)?;
        let steps = outcome.elapsed_steps();
        let next_depth = depth + steps;
        let next = self.hashing.hash_state(&outcome.next_state);
        let discount = self.discount.after_steps(steps);

        let existing = self.tree_ref()?.lookup(next.key(), next_depth);
        let (sampled_return, pending) = match existing {
            Some(child) => {
                self.tree_mut()?
                    .action_node_mut(node, choice)
                    .add_successor(next.key().clone(), child);
                let future = self.rollout(child, next_depth, children_left)?;
                (outcome.reward + discount * future, None)
            }
            None => {
                let key = next.key().clone();
                let actions = self.model.applicable_actions(next.state());
                let child = self.tree_mut()?.create(next, next_depth, actions);
                let future = self.rollout(child, next_depth, children_left - 1)?;
                (outcome.reward + discount * future, Some((key, child, children_left > 0)))
            }
        };

        let found_goal_on_rollout = self.found_goal_on_rollout;
        let tree = self.tree_mut()?;
        tree.backup(node, choice, sampled_return);
        if let Some((key, child, connect)) = pending {
            if connect || found_goal_on_rollout {
                tree.connect(child);
                tree.action_node_mut(node, choice).add_successor(key, child);
            }
        }
        Ok(sampled_return)
    }

    /// Untried actions first, then the best UCB score; ties uniformly at random.
    fn select_action(&mut self, node: NodeId) -> Result<Option<usize>> {
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| Error::invalid_config("UCT has not planned yet"))?;
        let state_node = tree.node(node);
        let actions = state_node.actions();
        if actions.is_empty() {
            return Ok(None);
        }

        let untried: Vec<usize> = (0..actions.len())
            .filter(|&i| actions[i].visits() == 0)
            .collect();
        if !untried.is_empty() {
            let scores = vec![0.0; untried.len()];
            return Ok(argmax_random_tie(&mut self.rng, &scores).map(|i| untried[i]));
        }

        let ln_visits = (state_node.visits() as f64).ln();
        let scores: Vec<f64> = actions
            .iter()
            .map(|an| {
                let bonus = (ln_visits / an.visits() as f64).sqrt();
                an.average_return() + self.exploration_bias * bonus
            })
            .collect();
        Ok(argmax_random_tie(&mut self.rng, &scores))
    }

    /// Tree from the last planning call.
    pub fn tree(&self) -> Option<&UctTree<M, H>> {
        self.tree.as_ref()
    }

    pub fn hashing(&self) -> &H {
        &self.hashing
    }

    /// Rollouts performed by the last planning call.
    pub fn rollouts(&self) -> usize {
        self.rollouts
    }

    pub fn tree_size(&self) -> usize {
        self.tree.as_ref().map_or(0, SearchTree::tree_size)
    }

    pub fn unique_states(&self) -> usize {
        self.tree.as_ref().map_or(0, SearchTree::unique_states)
    }

    /// States passed through by every rollout of the last planning call.
    pub fn total_visits(&self) -> usize {
        self.tree.as_ref().map_or(0, |tree| tree.stats().total_visits)
    }

    /// Whether the goal condition ended the last planning call early.
    pub fn found_goal(&self) -> bool {
        self.found_goal
    }

    /// Drop the tree and reseed.
    pub fn reset(&mut self) {
        self.tree = None;
        self.rollouts = 0;
        self.found_goal = false;
        self.found_goal_on_rollout = false;
        self.rng = build_rng(self.seed);
    }

    /// Plan from `state` unless the current tree is already rooted there.
    fn ensure_rooted_at(&mut self, state: &M::State) -> Result<()> {
        let key = self.hashing.canonical_key(state);
        let rooted_here = self
            .tree
            .as_ref()
            .is_some_and(|tree| tree.root().state().key() == &key);
        if !rooted_here {
            self.reset();
            self.plan_from(state)?;
        }
        Ok(())
    }
}

impl<M, H> QProvider for Uct<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    type State = M::State;
    type Action = M::Action;

    /// Average returns at the root, replanning if `state` is not the root.
    fn q_values(&mut self, state: &M::State) -> Result<Vec<QValue<M::Action>>> {
        self.ensure_rooted_at(state)?;
        Ok(self
            .tree_ref()?
            .root()
            .actions()
            .iter()
            .map(|an| QValue::new(an.action().clone(), an.average_return()))
            .collect())
    }

    fn value(&mut self, state: &M::State) -> Result<f64> {
        if self.model.is_terminal(state) {
            return Ok(0.0);
        }
        Ok(optimal_value(&self.q_values(state)?))
    }
}
