//! World model port: the planner's only view of the environment.
//!
//! Planners never mutate a state in place. They ask the model which actions
//! apply, then either sample one outcome or (for enumerable models) request
//! the full transition distribution.
//!
//! ## Composite actions
//!
//! A composite (temporally-extended) action runs for a variable number of
//! primitive steps. Its sampled [`EnvironmentOutcome`] reports the elapsed step
//! count and the *cumulative discounted* reward. When enumerated, its
//! [`TransitionProb`] records carry the discounted probability of reaching each
//! successor and the expected cumulative reward, so planners must not apply
//! another discount to them.

use std::fmt;

use rand::rngs::StdRng;

use crate::{Error, Result};

/// Whether an action is a single model step or spans several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Primitive,
    Composite,
}

/// Capability interface every planner branches on.
pub trait Action: Clone + PartialEq + fmt::Debug {
    fn kind(&self) -> ActionKind {
        ActionKind::Primitive
    }

    fn is_primitive(&self) -> bool {
        self.kind() == ActionKind::Primitive
    }
}

/// A single simulated outcome of applying an action.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentOutcome<S> {
    pub next_state: S,
    /// Immediate reward, or the cumulative discounted reward for composite actions.
    pub reward: f64,
    pub terminal: bool,
    elapsed_steps: usize,
}

impl<S> EnvironmentOutcome<S> {
    /// Outcome of a primitive action (one elapsed step).
    pub fn primitive(next_state: S, reward: f64, terminal: bool) -> Self {
        EnvironmentOutcome {
            next_state,
            reward,
            terminal,
            elapsed_steps: 1,
        }
    }

    /// Outcome of a composite action that ran for `elapsed_steps` primitive steps.
    pub fn composite(
        next_state: S,
        cumulative_reward: f64,
        terminal: bool,
        elapsed_steps: usize,
    ) -> Self {
        EnvironmentOutcome {
            next_state,
            reward: cumulative_reward,
            terminal,
            elapsed_steps: elapsed_steps.max(1),
        }
    }

    pub fn elapsed_steps(&self) -> usize {
        self.elapsed_steps
    }

    pub fn cumulative_reward(&self) -> f64 {
        self.reward
    }
}

/// One entry of an enumerated transition distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionProb<S> {
    pub probability: f64,
    pub next_state: S,
    pub reward: f64,
}

impl<S> TransitionProb<S> {
    pub fn new(probability: f64, next_state: S, reward: f64) -> Self {
        TransitionProb {
            probability,
            next_state,
            reward,
        }
    }
}

/// The external MDP consumed by every planner.
///
/// Calls are synchronous and carry no timeout; a model that wraps a live
/// simulator must enforce its own cancellation.
pub trait WorldModel {
    type State: Clone + fmt::Debug;
    type Action: Action;

    /// Actions applicable in `state`, in a stable order.
    fn applicable_actions(&self, state: &Self::State) -> Vec<Self::Action>;

    /// Sample one outcome of applying `action` in `state`.
    fn sample(
        &self,
        state: &Self::State,
        action: &Self::Action,
        rng: &mut StdRng,
    ) -> Result<EnvironmentOutcome<Self::State>>;

    /// Enumerate every outcome of applying `action` in `state`.
    ///
    /// Sample-only models keep the default, which reports
    /// [`Error::TransitionsUnavailable`].
    fn transitions(
        &self,
        _state: &Self::State,
        action: &Self::Action,
    ) -> Result<Vec<TransitionProb<Self::State>>> {
        Err(Error::TransitionsUnavailable {
            action: format!("{action:?}"),
        })
    }

    fn is_terminal(&self, state: &Self::State) -> bool;
}

impl<M: WorldModel + ?Sized> WorldModel for &M {
    type State = M::State;
    type Action = M::Action;

    fn applicable_actions(&self, state: &Self::State) -> Vec<Self::Action> {
        (**self).applicable_actions(state)
    }

    fn sample(
        &self,
        state: &Self::State,
        action: &Self::Action,
        rng: &mut StdRng,
    ) -> Result<EnvironmentOutcome<Self::State>> {
        (**self).sample(state, action, rng)
    }

    fn transitions(
        &self,
        state: &Self::State,
        action: &Self::Action,
    ) -> Result<Vec<TransitionProb<Self::State>>> {
        (**self).transitions(state, action)
    }

    fn is_terminal(&self, state: &Self::State) -> bool {
        (**self).is_terminal(state)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Step;
    impl Action for Step {}

    struct SampleOnly;

    impl WorldModel for SampleOnly {
        type State = u8;
        type Action = Step;

        fn applicable_actions(&self, _state: &u8) -> Vec<Step> {
            vec![Step]
        }

        fn sample(
            &self,
            state: &u8,
            _action: &Step,
            _rng: &mut StdRng,
        ) -> Result<EnvironmentOutcome<u8>> {
            Ok(EnvironmentOutcome::primitive(state + 1, 1.0, false))
        }

        fn is_terminal(&self, _state: &u8) -> bool {
            false
        }
    }

    #[test]
    fn sample_only_models_report_missing_transitions() {
        let err = SampleOnly.transitions(&0, &Step).unwrap_err();
        assert!(matches!(err, Error::TransitionsUnavailable { .. }));
    }

    #[test]
    fn references_forward_to_the_model() {
        let model = SampleOnly;
        let by_ref = &model;
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = by_ref.sample(&3, &Step, &mut rng).unwrap();
        assert_eq!(outcome.next_state, 4);
        assert_eq!(outcome.elapsed_steps(), 1);
    }

    #[test]
    fn composite_outcomes_never_report_zero_steps() {
        let outcome = EnvironmentOutcome::composite(0u8, 2.5, false, 0);
        assert_eq!(outcome.elapsed_steps(), 1);
        assert_eq!(outcome.cumulative_reward(), 2.5);
    }
}
