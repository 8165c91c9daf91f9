//! Policy Evaluation and Policy Iteration.

use std::collections::HashMap;

use log::{debug, info};
use rand::rngs::StdRng;

use crate::{
    Error, Result,
    config::PolicyIterationConfig,
    hashing::{HashingFactory, StateKey},
    model::WorldModel,
    policy::Policy,
    ports::PlanningObserver,
    types::{ActionProb, QValue},
    utils::{argmax_indices, build_rng, weighted_sample},
    value::{QProvider, ValueFunction},
};

use super::dynamic_programming::DynamicProgramming;

/// Action distributions stored per canonical state key.
#[derive(Debug, Clone)]
pub struct TabularPolicy<K, A> {
    entries: HashMap<K, Vec<ActionProb<A>>>,
}

impl<K: Eq + std::hash::Hash, A> TabularPolicy<K, A> {
    pub fn new() -> Self {
        TabularPolicy {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&[ActionProb<A>]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn set(&mut self, key: K, distribution: Vec<ActionProb<A>>) {
        self.entries.insert(key, distribution);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Eq + std::hash::Hash, A> Default for TabularPolicy<K, A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluates a fixed policy over the states reachable from a seed state.
pub struct PolicyEvaluation<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    dp: DynamicProgramming<M, H>,
    max_eval_delta: f64,
    max_eval_iterations: usize,
}

impl<M, H> PolicyEvaluation<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    /// Uses the evaluation thresholds of `config`; the improvement settings are ignored.
    pub fn new(model: M, hashing: H, config: PolicyIterationConfig) -> Result<Self> {
        config.validate()?;
        Ok(PolicyEvaluation {
            dp: DynamicProgramming::new(model, hashing, config.dynamic_programming)?,
            max_eval_delta: config.max_eval_delta,
            max_eval_iterations: config.max_eval_iterations,
        })
    }

    pub fn with_value_initialization(
        mut self,
        init: impl ValueFunction<M::State> + 'static,
    ) -> Self {
        self.dp.set_value_initialization(init);
        self
    }

    pub fn with_observer(mut self, observer: impl PlanningObserver + 'static) -> Self {
        self.dp.set_observer(observer);
        self
    }

    pub fn perform_reachability_from(&mut self, state: &M::State) -> Result<bool> {
        self.dp.perform_reachability_from(state)
    }

    /// Discover the states reachable from `state`, then evaluate `policy` on them.
    pub fn evaluate_policy_from<P>(&mut self, policy: &mut P, state: &M::State) -> Result<f64>
    where
        P: Policy<State = M::State, Action = M::Action> + ?Sized,
    {
        self.dp.perform_reachability_from(state)?;
        self.evaluate_policy(policy)
    }

    /// Sweep fixed-policy backups over every discovered state until
    /// convergence; returns the last sweep's largest change.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoStatesDiscovered`] if reachability has not run.
    pub fn evaluate_policy<P>(&mut self, policy: &mut P) -> Result<f64>
    where
        P: Policy<State = M::State, Action = M::Action> + ?Sized,
    {
        if self.dp.all_states().is_empty() {
            return Err(Error::NoStatesDiscovered);
        }
        self.dp
            .observer()
            .on_planning_start("policy evaluation", self.max_eval_iterations)?;
        let mut delta = 0.0;
        for iteration in 1..=self.max_eval_iterations {
            delta = self
                .dp
                .fixed_policy_sweep(|state| policy.policy_distribution(state.state()))?;
            self.dp.observer().on_sweep(iteration, delta)?;
            if delta < self.max_eval_delta {
                break;
            }
        }
        self.dp.observer().on_planning_end()?;
        Ok(delta)
    }

    pub fn value(&self, state: &M::State) -> f64 {
        self.dp.value(state)
    }

    pub fn dynamic_programming(&self) -> &DynamicProgramming<M, H> {
        &self.dp
    }

    pub fn reset(&mut self) {
        self.dp.reset();
    }
}

impl<M, H> QProvider for PolicyEvaluation<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    type State = M::State;
    type Action = M::Action;

    fn q_values(&mut self, state: &M::State) -> Result<Vec<QValue<M::Action>>> {
        self.dp.q_values(state)
    }

    fn q_value(&mut self, state: &M::State, action: &M::Action) -> Result<f64> {
        self.dp.q_value(state, action)
    }

    fn value(&mut self, state: &M::State) -> Result<f64> {
        Ok(self.dp.value(state))
    }
}

/// Alternates policy evaluation and greedy improvement.
///
/// The first policy is greedy with respect to the value initialization.
/// Each round evaluates the current policy with bounded inner sweeps, then
/// replaces it with the greedy policy of the new values (uniform over ties).
/// Rounds stop once an evaluation changed no value by more than
/// `max_policy_delta`, or after `max_policy_iterations` rounds.
pub struct PolicyIteration<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    dp: DynamicProgramming<M, H>,
    policy: TabularPolicy<StateKey<M, H>, M::Action>,
    max_eval_delta: f64,
    max_policy_delta: f64,
    max_eval_iterations: usize,
    max_policy_iterations: usize,
    total_policy_iterations: usize,
    total_value_iterations: usize,
    has_run: bool,
    seed: Option<u64>,
    rng: StdRng,
}

impl<M, H> PolicyIteration<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    pub fn new(model: M, hashing: H, config: PolicyIterationConfig) -> Result<Self> {
        config.validate()?;
        let seed = config.dynamic_programming.seed;
        Ok(PolicyIteration {
            dp: DynamicProgramming::new(model, hashing, config.dynamic_programming)?,
            policy: TabularPolicy::new(),
            max_eval_delta: config.max_eval_delta,
            max_policy_delta: config.max_policy_delta,
            max_eval_iterations: config.max_eval_iterations,
            max_policy_iterations: config.max_policy_iterations,
            total_policy_iterations: 0,
            total_value_iterations: 0,
            has_run: false,
            seed,
            rng: build_rng(seed),
        })
    }

    pub fn with_value_initialization(
        mut self,
        init: impl ValueFunction<M::State> + 'static,
    ) -> Self {
        self.dp.set_value_initialization(init);
        self
    }

    pub fn with_observer(mut self, observer: impl PlanningObserver + 'static) -> Self {
        self.dp.set_observer(observer);
        self
    }

    pub fn plan_from(&mut self, state: &M::State) -> Result<()> {
        self.dp
            .observer()
            .on_planning_start("policy iteration", self.max_policy_iterations)?;
        if self.dp.perform_reachability_from(state)? || !self.has_run {
            self.improve_policy()?;
            let mut rounds = 0;
            loop {
                let delta = self.evaluate_current_policy()?;
                rounds += 1;
                self.total_policy_iterations += 1;
                self.improve_policy()?;
                if delta <= self.max_policy_delta || rounds >= self.max_policy_iterations {
                    break;
                }
            }
            info!(
                "policy iteration finished after {rounds} rounds ({} value sweeps in total)",
                self.total_value_iterations
            );
            self.has_run = true;
        }
        self.dp.observer().on_planning_end()
    }

    /// Evaluate the current policy; returns the largest value change over
    /// every sweep of the evaluation.
    fn evaluate_current_policy(&mut self) -> Result<f64> {
        let mut max_change: f64 = 0.0;
        for _ in 0..self.max_eval_iterations {
            let policy = &self.policy;
            let delta = self.dp.fixed_policy_sweep(|state| {
                Ok(policy.get(state.key()).map(<[_]>::to_vec).unwrap_or_default())
            })?;
            max_change = max_change.max(delta);
            self.total_value_iterations += 1;
            self.dp
                .observer()
                .on_sweep(self.total_value_iterations, delta)?;
            if delta < self.max_eval_delta {
                break;
            }
        }
        debug!("policy evaluation changed values by at most {max_change}");
        Ok(max_change)
    }

    /// Greedy policy of the current values for every discovered non-terminal state.
    fn improve_policy(&mut self) -> Result<()> {
        let states = self.dp.all_states().to_vec();
        for state in states {
            if self.dp.model().is_terminal(state.state()) {
                continue;
            }
            let qs = self.dp.q_values_of(&state)?;
            let values: Vec<f64> = qs.iter().map(|qv| qv.q).collect();
            let best = argmax_indices(&values);
            let share = 1.0 / best.len() as f64;
            let distribution = best
                .into_iter()
                .map(|index| ActionProb::new(qs[index].action.clone(), share))
                .collect();
            self.policy.set(state.key().clone(), distribution);
        }
        Ok(())
    }

    /// Policy computed by the last planning call.
    pub fn computed_policy(&self) -> &TabularPolicy<StateKey<M, H>, M::Action> {
        &self.policy
    }

    pub fn total_policy_iterations(&self) -> usize {
        self.total_policy_iterations
    }

    pub fn total_value_iterations(&self) -> usize {
        self.total_value_iterations
    }

    pub fn value(&self, state: &M::State) -> f64 {
        self.dp.value(state)
    }

    pub fn dynamic_programming(&self) -> &DynamicProgramming<M, H> {
        &self.dp
    }

    pub fn reset(&mut self) {
        self.dp.reset();
        self.policy.clear();
        self.total_policy_iterations = 0;
        self.total_value_iterations = 0;
        self.has_run = false;
        self.rng = build_rng(self.seed);
    }
}

impl<M, H> QProvider for PolicyIteration<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    type State = M::State;
    type Action = M::Action;

    fn q_values(&mut self, state: &M::State) -> Result<Vec<QValue<M::Action>>> {
        self.dp.q_values(state)
    }

    fn q_value(&mut self, state: &M::State, action: &M::Action) -> Result<f64> {
        self.dp.q_value(state, action)
    }

    fn value(&mut self, state: &M::State) -> Result<f64> {
        Ok(self.dp.value(state))
    }
}

/// Acts with the computed policy; undefined outside the planned states.
impl<M, H> Policy for PolicyIteration<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    type State = M::State;
    type Action = M::Action;

    fn action(&mut self, state: &M::State) -> Result<M::Action> {
        let distribution = self.policy_distribution(state)?;
        let weighted: Vec<(M::Action, f64)> = distribution
            .into_iter()
            .map(|ap| (ap.action, ap.probability))
            .collect();
        weighted_sample(&mut self.rng, &weighted).ok_or_else(|| Error::PolicyUndefined {
            state: format!("{state:?}"),
        })
    }

    fn policy_distribution(&mut self, state: &M::State) -> Result<Vec<ActionProb<M::Action>>> {
        let key = self.dp.hashing().canonical_key(state);
        match self.policy.get(&key) {
            Some(distribution) if !distribution.is_empty() => Ok(distribution.to_vec()),
            _ => Err(Error::PolicyUndefined {
                state: format!("{state:?}"),
            }),
        }
    }

    fn is_defined_for(&mut self, state: &M::State) -> bool {
        let key = self.dp.hashing().canonical_key(state);
        self.policy.get(&key).is_some_and(|d| !d.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hashing::SimpleHashingFactory,
        policy::RandomPolicy,
        test_support::{Chain, Step, approx_eq_tol},
    };

    fn config() -> PolicyIterationConfig {
        PolicyIterationConfig::new(0.9, 1e-10, 200, 50)
    }

    #[test]
    fn evaluation_requires_discovered_states() {
        let mut pe = PolicyEvaluation::new(Chain::new(3), SimpleHashingFactory, config()).unwrap();
        let mut policy = RandomPolicy::new(Chain::new(3)).with_seed(1);
        let err = pe.evaluate_policy(&mut policy).unwrap_err();
        assert!(matches!(err, Error::NoStatesDiscovered));
    }

    #[test]
    fn evaluates_the_uniform_random_policy() {
        let mut pe = PolicyEvaluation::new(Chain::new(1), SimpleHashingFactory, config()).unwrap();
        let mut policy = RandomPolicy::new(Chain::new(1)).with_seed(1);
        pe.evaluate_policy_from(&mut policy, &0).unwrap();
        // V = 0.5 * 1 + 0.5 * 0.9 * V  =>  V = 0.5 / 0.55
        assert!(approx_eq_tol(pe.value(&0), 0.5 / 0.55, 1e-8));
    }

    #[test]
    fn policy_iteration_finds_the_forward_policy() {
        let mut pi = PolicyIteration::new(Chain::new(3), SimpleHashingFactory, config()).unwrap();
        pi.plan_from(&0).unwrap();
        for state in 0..3 {
            let dist = pi.policy_distribution(&state).unwrap();
            assert_eq!(dist.len(), 1);
            assert_eq!(dist[0].action, Step::Forward);
            assert_eq!(pi.action(&state).unwrap(), Step::Forward);
        }
        assert!(approx_eq_tol(pi.value(&0), 0.81, 1e-8));
        assert!(pi.total_policy_iterations() >= 1);
        assert!(pi.total_value_iterations() >= pi.total_policy_iterations());
    }

    #[test]
    fn keeps_improving_until_values_settle() {
        let loose = PolicyIterationConfig::new(0.9, 1e-6, 1_000, 50);
        let mut pi = PolicyIteration::new(Chain::new(4), SimpleHashingFactory, loose).unwrap();
        pi.plan_from(&0).unwrap();
        assert!(pi.total_policy_iterations() > 1);
        // V(s) = 0.9^(3 - s) on the way to the terminal state 4
        for (state, expected) in [(0, 0.729), (1, 0.81), (2, 0.9), (3, 1.0)] {
            assert!(
                approx_eq_tol(pi.value(&state), expected, 1e-4),
                "state {state}: {}",
                pi.value(&state)
            );
        }
    }

    #[test]
    fn policy_is_undefined_for_terminal_states() {
        let mut pi = PolicyIteration::new(Chain::new(3), SimpleHashingFactory, config()).unwrap();
        pi.plan_from(&0).unwrap();
        assert!(!pi.is_defined_for(&3));
        assert!(matches!(pi.action(&3), Err(Error::PolicyUndefined { .. })));
    }
}
