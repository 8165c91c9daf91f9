//! Bellman dynamic programming core.
//!
//! [`DynamicProgramming`] owns a value table keyed by canonical state key and
//! computes Q-values from either the transition cache or the model directly.
//! Value Iteration, Policy Evaluation and Policy Iteration are thin drivers
//! around its sweeps.
//!
//! Backups:
//!
//! * primitive action: `Q(s,a) = Σ p · (r + γ·V(s'))`
//! * composite action: `Q(s,a) = R + Σ p · V(s')`, where the model has already
//!   folded the discount into `p` and `R`
//! * optimal: `V(s) = max_a Q(s,a)`
//! * fixed policy: `V(s) = Σ_a π(a|s) · Q(s,a)`, skipping zero-probability actions
//!
//! Terminal states are worth zero whatever the value initialization says, and
//! a non-terminal state without applicable actions backs up to zero.

use std::collections::{HashMap, HashSet, VecDeque};

use log::debug;
use rand::rngs::StdRng;

use crate::{
    Error, Result,
    config::{DynamicProgrammingConfig, TransitionMode, TransitionSource},
    hashing::{HashableState, HashedState, HashingFactory, StateKey},
    model::{Action, WorldModel},
    observers::NoopObserver,
    policy::Policy,
    ports::PlanningObserver,
    types::{ActionProb, Discount, QValue, max_q},
    utils::build_rng,
    value::{ConstantValueFunction, QProvider, ValueFunction},
};

use super::transitions::{TransitionCache, TransitionOutcome, action_outcomes};

/// Value estimates keyed by canonical state key.
pub type ValueTable<K> = HashMap<K, f64>;

/// Q-value of one action given its outcome records.
pub(crate) fn bellman_q<A, S, K>(
    action: &A,
    outcomes: &[TransitionOutcome<S, K>],
    discount: Discount,
    value: impl Fn(&HashableState<S, K>) -> f64,
) -> f64
where
    A: Action,
{
    if action.is_primitive() {
        outcomes
            .iter()
            .map(|o| o.probability * (o.reward + discount.value() * value(&o.next_state)))
            .sum()
    } else {
        // every record of a composite action carries the same expected reward
        let reward = outcomes.first().map_or(0.0, |o| o.reward);
        reward
            + outcomes
                .iter()
                .map(|o| o.probability * value(&o.next_state))
                .sum::<f64>()
    }
}

fn stored_value<M, K>(
    model: &M,
    values: &ValueTable<K>,
    init: &dyn ValueFunction<M::State>,
    state: &HashableState<M::State, K>,
) -> f64
where
    M: WorldModel,
    K: Eq + std::hash::Hash,
{
    if model.is_terminal(state.state()) {
        return 0.0;
    }
    values
        .get(state.key())
        .copied()
        .unwrap_or_else(|| init.value(state.state()))
}

/// Generic Bellman backup engine over a world model.
pub struct DynamicProgramming<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    model: M,
    hashing: H,
    discount: Discount,
    source: TransitionSource,
    mode: TransitionMode,
    seed: Option<u64>,
    values: ValueTable<StateKey<M, H>>,
    value_init: Box<dyn ValueFunction<M::State>>,
    cache: TransitionCache<M::Action, M::State, StateKey<M, H>>,
    rng: StdRng,
    discovered: Vec<HashedState<M, H>>,
    known: HashSet<StateKey<M, H>>,
    observer: Box<dyn PlanningObserver>,
}

impl<M, H> DynamicProgramming<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    /// # Errors
    ///
    /// Returns the first validation failure of `config`.
    pub fn new(model: M, hashing: H, config: DynamicProgrammingConfig) -> Result<Self> {
        config.validate()?;
        Ok(DynamicProgramming {
            model,
            hashing,
            discount: config.discount()?,
            source: config.transition_source,
            mode: config.transition_mode,
            seed: config.seed,
            values: ValueTable::new(),
            value_init: Box::new(ConstantValueFunction::default()),
            cache: TransitionCache::new(
                config.transition_mode,
                config.cache_transitions,
                config.seed,
            ),
            rng: build_rng(config.seed),
            discovered: Vec::new(),
            known: HashSet::new(),
            observer: Box::new(NoopObserver),
        })
    }

    /// Value assumed for states that have never been backed up.
    pub fn with_value_initialization(
        mut self,
        init: impl ValueFunction<M::State> + 'static,
    ) -> Self {
        self.value_init = Box::new(init);
        self
    }

    pub fn with_observer(mut self, observer: impl PlanningObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn set_value_initialization(&mut self, init: impl ValueFunction<M::State> + 'static) {
        self.value_init = Box::new(init);
    }

    pub fn set_observer(&mut self, observer: impl PlanningObserver + 'static) {
        self.observer = Box::new(observer);
    }

    pub(crate) fn observer(&mut self) -> &mut dyn PlanningObserver {
        self.observer.as_mut()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn hashing(&self) -> &H {
        &self.hashing
    }

    pub fn discount(&self) -> Discount {
        self.discount
    }

    pub fn hash(&self, state: &M::State) -> HashedState<M, H> {
        self.hashing.hash_state(state)
    }

    /// Current estimate for `state`: zero if terminal, the stored value if
    /// one exists, the value initialization otherwise.
    pub fn value(&self, state: &M::State) -> f64 {
        self.value_of(&self.hash(state))
    }

    pub fn value_of(&self, state: &HashedState<M, H>) -> f64 {
        stored_value(&self.model, &self.values, self.value_init.as_ref(), state)
    }

    pub fn has_computed_value_for(&self, state: &M::State) -> bool {
        self.values.contains_key(&self.hashing.canonical_key(state))
    }

    /// States discovered by reachability, in discovery order.
    pub fn all_states(&self) -> &[HashedState<M, H>] {
        &self.discovered
    }

    pub fn value_table(&self) -> &ValueTable<StateKey<M, H>> {
        &self.values
    }

    /// Number of states with a cached transition entry.
    pub fn cached_states(&self) -> usize {
        self.cache.len()
    }

    /// Q-values of every action applicable in `state`, in the model's order.
    pub fn q_values(&mut self, state: &M::State) -> Result<Vec<QValue<M::Action>>> {
        let hashed = self.hash(state);
        self.q_values_of(&hashed)
    }

    pub fn q_values_of(&mut self, state: &HashedState<M, H>) -> Result<Vec<QValue<M::Action>>> {
        let discount = self.discount;
        match self.source {
            TransitionSource::Cached => {
                let transitions = self.cache.transitions_for(&self.model, &self.hashing, state)?;
                let lookup = |s: &HashedState<M, H>| {
                    stored_value(&self.model, &self.values, self.value_init.as_ref(), s)
                };
                Ok(transitions
                    .iter()
                    .map(|ao| {
                        QValue::new(
                            ao.action.clone(),
                            bellman_q(&ao.action, &ao.outcomes, discount, lookup),
                        )
                    })
                    .collect())
            }
            TransitionSource::OnDemand => self
                .model
                .applicable_actions(state.state())
                .into_iter()
                .map(|action| {
                    let q = self.on_demand_q(state, &action)?;
                    Ok(QValue::new(action, q))
                })
                .collect(),
        }
    }

    /// Q-value of one action.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QValueNotFound`] if `action` is not applicable in `state`.
    pub fn q_value(&mut self, state: &M::State, action: &M::Action) -> Result<f64> {
        let hashed = self.hash(state);
        self.q_value_of(&hashed, action)
    }

    fn q_value_of(&mut self, state: &HashedState<M, H>, action: &M::Action) -> Result<f64> {
        let not_found = || Error::QValueNotFound {
            action: format!("{action:?}"),
        };
        match self.source {
            TransitionSource::Cached => {
                let discount = self.discount;
                let transitions = self.cache.transitions_for(&self.model, &self.hashing, state)?;
                let ao = transitions.get(action).ok_or_else(not_found)?;
                Ok(bellman_q(&ao.action, &ao.outcomes, discount, |s| {
                    stored_value(&self.model, &self.values, self.value_init.as_ref(), s)
                }))
            }
            TransitionSource::OnDemand => {
                if !self.model.applicable_actions(state.state()).contains(action) {
                    return Err(not_found());
                }
                self.on_demand_q(state, action)
            }
        }
    }

    fn on_demand_q(&mut self, state: &HashedState<M, H>, action: &M::Action) -> Result<f64> {
        let outcomes = action_outcomes(
            &self.model,
            &self.hashing,
            state.state(),
            action,
            self.mode,
            &mut self.rng,
        )?;
        Ok(bellman_q(action, &outcomes, self.discount, |s| self.value_of(s)))
    }

    /// Optimal backup of one state; stores and returns the new value.
    pub fn perform_bellman_update(&mut self, state: &HashedState<M, H>) -> Result<f64> {
        let value = if self.model.is_terminal(state.state()) {
            0.0
        } else {
            let qs = self.q_values_of(state)?;
            max_q(qs.iter().map(|qv| qv.q))
        };
        self.values.insert(state.key().clone(), value);
        Ok(value)
    }

    /// Fixed-policy backup of one state; stores and returns the new value.
    pub fn perform_fixed_policy_update<P>(
        &mut self,
        state: &HashedState<M, H>,
        policy: &mut P,
    ) -> Result<f64>
    where
        P: Policy<State = M::State, Action = M::Action> + ?Sized,
    {
        if self.model.is_terminal(state.state()) {
            self.values.insert(state.key().clone(), 0.0);
            return Ok(0.0);
        }
        let distribution = policy.policy_distribution(state.state())?;
        self.fixed_policy_backup(state, &distribution)
    }

    pub(crate) fn fixed_policy_backup(
        &mut self,
        state: &HashedState<M, H>,
        distribution: &[ActionProb<M::Action>],
    ) -> Result<f64> {
        let value = if self.model.is_terminal(state.state()) {
            0.0
        } else {
            let mut weighted = 0.0;
            for ap in distribution.iter().filter(|ap| ap.probability != 0.0) {
                weighted += ap.probability * self.q_value_of(state, &ap.action)?;
            }
            weighted
        };
        self.values.insert(state.key().clone(), value);
        Ok(value)
    }

    /// Breadth-first discovery of every state reachable from `from`.
    ///
    /// Terminal states are recorded but not expanded. Returns `false` if
    /// `from` had already been discovered, in which case nothing is expanded.
    pub fn perform_reachability_from(&mut self, from: &M::State) -> Result<bool> {
        let root = self.hash(from);
        if self.known.contains(root.key()) {
            return Ok(false);
        }
        self.known.insert(root.key().clone());
        self.discovered.push(root.clone());

        let mut frontier = VecDeque::from([root]);
        while let Some(state) = frontier.pop_front() {
            if self.model.is_terminal(state.state()) {
                continue;
            }
            let transitions = self.cache.transitions_for(&self.model, &self.hashing, &state)?;
            for outcome in transitions.iter().flat_map(|ao| ao.outcomes.iter()) {
                if self.known.insert(outcome.next_state.key().clone()) {
                    self.discovered.push(outcome.next_state.clone());
                    frontier.push_back(outcome.next_state.clone());
                }
            }
        }
        debug!("reachability discovered {} states", self.discovered.len());
        self.observer.on_reachability(self.discovered.len())?;
        Ok(true)
    }

    /// One in-place optimal sweep over every discovered state; returns max |ΔV|.
    pub fn sweep(&mut self) -> Result<f64> {
        let mut delta: f64 = 0.0;
        for index in 0..self.discovered.len() {
            let state = self.discovered[index].clone();
            let before = self.value_of(&state);
            let after = self.perform_bellman_update(&state)?;
            delta = delta.max((after - before).abs());
        }
        Ok(delta)
    }

    /// One in-place fixed-policy sweep; `distribution` supplies π(·|s) for
    /// non-terminal states. Returns max |ΔV|.
    pub fn fixed_policy_sweep<F>(&mut self, mut distribution: F) -> Result<f64>
    where
        F: FnMut(&HashedState<M, H>) -> Result<Vec<ActionProb<M::Action>>>,
    {
        let mut delta: f64 = 0.0;
        for index in 0..self.discovered.len() {
            let state = self.discovered[index].clone();
            let before = self.value_of(&state);
            let after = if self.model.is_terminal(state.state()) {
                self.values.insert(state.key().clone(), 0.0);
                0.0
            } else {
                let dist = distribution(&state)?;
                self.fixed_policy_backup(&state, &dist)?
            };
            delta = delta.max((after - before).abs());
        }
        Ok(delta)
    }

    /// Forget every value, cached transition and discovered state.
    pub fn reset(&mut self) {
        self.values.clear();
        self.cache.clear();
        self.discovered.clear();
        self.known.clear();
        self.rng = build_rng(self.seed);
    }
}

impl<M, H> QProvider for DynamicProgramming<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    type State = M::State;
    type Action = M::Action;

    fn q_values(&mut self, state: &M::State) -> Result<Vec<QValue<M::Action>>> {
        DynamicProgramming::q_values(self, state)
    }

    fn q_value(&mut self, state: &M::State, action: &M::Action) -> Result<f64> {
        DynamicProgramming::q_value(self, state, action)
    }

    fn value(&mut self, state: &M::State) -> Result<f64> {
        Ok(DynamicProgramming::value(self, state))
    }
}
