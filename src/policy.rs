//! Policies derived from Q-value sources.
//!
//! A [`Policy`] maps states to actions. The planners in this crate produce
//! [`QProvider`]s; wrapping one in [`GreedyQPolicy`] or [`EpsilonGreedy`]
//! turns it into something an agent can act with. Stochastic policies own
//! their RNG so results are reproducible under a fixed seed.

use std::fmt;

use rand::{Rng, rngs::StdRng, seq::IndexedRandom};

use crate::{
    Error, Result,
    model::WorldModel,
    types::{ActionProb, QValue},
    utils::{argmax_indices, argmax_random_tie, build_rng},
    value::QProvider,
};

/// A mapping from states to (distributions over) actions.
pub trait Policy {
    type State;
    type Action;

    /// Select an action for `state`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PolicyUndefined`] if the policy has no action for `state`.
    fn action(&mut self, state: &Self::State) -> Result<Self::Action>;

    /// Probability of every action the policy may take in `state`.
    fn policy_distribution(&mut self, state: &Self::State) -> Result<Vec<ActionProb<Self::Action>>>;

    fn is_defined_for(&mut self, state: &Self::State) -> bool;
}

impl<P: Policy + ?Sized> Policy for &mut P {
    type State = P::State;
    type Action = P::Action;

    fn action(&mut self, state: &Self::State) -> Result<Self::Action> {
        (**self).action(state)
    }

    fn policy_distribution(
        &mut self,
        state: &Self::State,
    ) -> Result<Vec<ActionProb<Self::Action>>> {
        (**self).policy_distribution(state)
    }

    fn is_defined_for(&mut self, state: &Self::State) -> bool {
        (**self).is_defined_for(state)
    }
}

/// Probability `distribution` assigns to `action`; zero when absent.
pub fn action_prob_in<A: PartialEq>(distribution: &[ActionProb<A>], action: &A) -> f64 {
    distribution
        .iter()
        .filter(|ap| &ap.action == action)
        .map(|ap| ap.probability)
        .sum()
}

fn undefined<S: fmt::Debug>(state: &S) -> Error {
    Error::PolicyUndefined {
        state: format!("{state:?}"),
    }
}

/// Uniform distribution over the maximal Q-values.
fn greedy_distribution<A: Clone>(qs: &[QValue<A>]) -> Vec<ActionProb<A>> {
    let values: Vec<f64> = qs.iter().map(|qv| qv.q).collect();
    let best = argmax_indices(&values);
    let share = 1.0 / best.len() as f64;
    best.into_iter()
        .map(|index| ActionProb::new(qs[index].action.clone(), share))
        .collect()
}

/// Acts greedily with respect to a Q-source, breaking ties uniformly at random.
pub struct GreedyQPolicy<Q> {
    source: Q,
    rng: StdRng,
}

impl<Q: QProvider> GreedyQPolicy<Q> {
    pub fn new(source: Q) -> Self {
        GreedyQPolicy {
            source,
            rng: build_rng(None),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = build_rng(Some(seed));
        self
    }

    pub fn source(&self) -> &Q {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut Q {
        &mut self.source
    }

    pub fn into_inner(self) -> Q {
        self.source
    }
}

impl<Q> Policy for GreedyQPolicy<Q>
where
    Q: QProvider,
    Q::State: fmt::Debug,
    Q::Action: Clone,
{
    type State = Q::State;
    type Action = Q::Action;

    fn action(&mut self, state: &Self::State) -> Result<Self::Action> {
        let qs = self.source.q_values(state)?;
        let values: Vec<f64> = qs.iter().map(|qv| qv.q).collect();
        argmax_random_tie(&mut self.rng, &values)
            .map(|index| qs[index].action.clone())
            .ok_or_else(|| undefined(state))
    }

    fn policy_distribution(
        &mut self,
        state: &Self::State,
    ) -> Result<Vec<ActionProb<Self::Action>>> {
        let qs = self.source.q_values(state)?;
        if qs.is_empty() {
            return Err(undefined(state));
        }
        Ok(greedy_distribution(&qs))
    }

    fn is_defined_for(&mut self, state: &Self::State) -> bool {
        matches!(self.source.q_values(state), Ok(qs) if !qs.is_empty())
    }
}

/// Greedy with probability `1 - epsilon`, uniform over all actions otherwise.
pub struct EpsilonGreedy<Q> {
    source: Q,
    epsilon: f64,
    rng: StdRng,
}

impl<Q: QProvider> EpsilonGreedy<Q> {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `epsilon` is outside `[0, 1]`.
    pub fn new(source: Q, epsilon: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&epsilon) {
            return Err(Error::invalid_config(format!(
                "epsilon {epsilon} must lie within [0, 1]"
            )));
        }
        Ok(EpsilonGreedy {
            source,
            epsilon,
            rng: build_rng(None),
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = build_rng(Some(seed));
        self
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn source_mut(&mut self) -> &mut Q {
        &mut self.source
    }
}

impl<Q> Policy for EpsilonGreedy<Q>
where
    Q: QProvider,
    Q::State: fmt::Debug,
    Q::Action: Clone,
{
    type State = Q::State;
    type Action = Q::Action;

    fn action(&mut self, state: &Self::State) -> Result<Self::Action> {
        let qs = self.source.q_values(state)?;
        if qs.is_empty() {
            return Err(undefined(state));
        }
        let explore = self.rng.random::<f64>() < self.epsilon;
        let chosen = if explore {
            qs.choose(&mut self.rng).map(|qv| qv.action.clone())
        } else {
            let values: Vec<f64> = qs.iter().map(|qv| qv.q).collect();
            argmax_random_tie(&mut self.rng, &values).map(|index| qs[index].action.clone())
        };
        chosen.ok_or_else(|| undefined(state))
    }

    fn policy_distribution(
        &mut self,
        state: &Self::State,
    ) -> Result<Vec<ActionProb<Self::Action>>> {
        let qs = self.source.q_values(state)?;
        if qs.is_empty() {
            return Err(undefined(state));
        }
        let greedy = greedy_distribution(&qs);
        let uniform = self.epsilon / qs.len() as f64;
        Ok(qs
            .iter()
            .map(|qv| {
                let exploit = action_prob_in(&greedy, &qv.action) * (1.0 - self.epsilon);
                ActionProb::new(qv.action.clone(), uniform + exploit)
            })
            .collect())
    }

    fn is_defined_for(&mut self, state: &Self::State) -> bool {
        matches!(self.source.q_values(state), Ok(qs) if !qs.is_empty())
    }
}

/// Uniform over the model's applicable actions.
pub struct RandomPolicy<M> {
    model: M,
    rng: StdRng,
}

impl<M: WorldModel> RandomPolicy<M> {
    pub fn new(model: M) -> Self {
        RandomPolicy {
            model,
            rng: build_rng(None),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = build_rng(Some(seed));
        self
    }
}

impl<M: WorldModel> Policy for RandomPolicy<M> {
    type State = M::State;
    type Action = M::Action;

    fn action(&mut self, state: &M::State) -> Result<M::Action> {
        self.model
            .applicable_actions(state)
            .choose(&mut self.rng)
            .cloned()
            .ok_or_else(|| undefined(state))
    }

    fn policy_distribution(&mut self, state: &M::State) -> Result<Vec<ActionProb<M::Action>>> {
        let actions = self.model.applicable_actions(state);
        if actions.is_empty() {
            return Err(undefined(state));
        }
        let share = 1.0 / actions.len() as f64;
        Ok(actions
            .into_iter()
            .map(|action| ActionProb::new(action, share))
            .collect())
    }

    fn is_defined_for(&mut self, state: &M::State) -> bool {
        !self.model.applicable_actions(state).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::optimal_value;

    /// Fixed Q-values regardless of state; state 99 has no actions.
    struct TableQ(Vec<QValue<char>>);

    impl QProvider for TableQ {
        type State = u8;
        type Action = char;

        fn q_values(&mut self, state: &u8) -> Result<Vec<QValue<char>>> {
            if *state == 99 {
                Ok(Vec::new())
            } else {
                Ok(self.0.clone())
            }
        }

        fn value(&mut self, state: &u8) -> Result<f64> {
            Ok(optimal_value(&self.q_values(state)?))
        }
    }

    fn tied() -> TableQ {
        TableQ(vec![
            QValue::new('a', 1.0),
            QValue::new('b', 2.0),
            QValue::new('c', 2.0),
        ])
    }

    #[test]
    fn greedy_breaks_ties_uniformly() {
        let mut policy = GreedyQPolicy::new(tied()).with_seed(11);
        let dist = policy.policy_distribution(&0).unwrap();
        assert_eq!(action_prob_in(&dist, &'a'), 0.0);
        assert_eq!(action_prob_in(&dist, &'b'), 0.5);
        assert_eq!(action_prob_in(&dist, &'c'), 0.5);

        let mut seen_b = false;
        let mut seen_c = false;
        for _ in 0..100 {
            match policy.action(&0).unwrap() {
                'b' => seen_b = true,
                'c' => seen_c = true,
                other => panic!("non-greedy action {other}"),
            }
        }
        assert!(seen_b && seen_c);
    }

    #[test]
    fn greedy_is_undefined_without_actions() {
        let mut policy = GreedyQPolicy::new(tied());
        assert!(!policy.is_defined_for(&99));
        assert!(matches!(policy.action(&99), Err(Error::PolicyUndefined { .. })));
    }

    #[test]
    fn epsilon_greedy_distribution_sums_to_one() {
        let mut policy = EpsilonGreedy::new(tied(), 0.3).unwrap().with_seed(5);
        let dist = policy.policy_distribution(&0).unwrap();
        let total: f64 = dist.iter().map(|ap| ap.probability).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((action_prob_in(&dist, &'a') - 0.1).abs() < 1e-12);
        assert!((action_prob_in(&dist, &'b') - 0.45).abs() < 1e-12);
    }

    #[test]
    fn epsilon_must_be_a_probability() {
        assert!(EpsilonGreedy::new(tied(), 1.5).is_err());
        assert!(EpsilonGreedy::new(tied(), -0.1).is_err());
    }

    #[test]
    fn zero_epsilon_is_greedy() {
        let mut policy = EpsilonGreedy::new(tied(), 0.0).unwrap().with_seed(9);
        for _ in 0..50 {
            assert_ne!(policy.action(&0).unwrap(), 'a');
        }
    }
}
