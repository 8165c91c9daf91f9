//! Small models shared by the unit tests.
//!
//! Integration tests keep their own fixtures in `tests/common.rs`; only the
//! models the unit tests need live here.

use rand::{Rng, rngs::StdRng};

use crate::{
    Result,
    model::{Action, ActionKind, EnvironmentOutcome, TransitionProb, WorldModel},
};

pub fn approx_eq_tol(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Forward,
    Stay,
}

impl Action for Step {}

/// States `0..=n`; stepping forward into `n` pays 1 and ends the episode.
#[derive(Debug, Clone, Copy)]
pub struct Chain {
    last: u32,
}

impl Chain {
    pub fn new(last: u32) -> Self {
        Chain { last }
    }

    fn step(&self, state: u32, action: Step) -> (u32, f64) {
        match action {
            Step::Forward => {
                let next = (state + 1).min(self.last);
                let reward = if next == self.last { 1.0 } else { 0.0 };
                (next, reward)
            }
            Step::Stay => (state, 0.0),
        }
    }
}

impl WorldModel for Chain {
    type State = u32;
    type Action = Step;

    fn applicable_actions(&self, state: &u32) -> Vec<Step> {
        if self.is_terminal(state) {
            Vec::new()
        } else {
            vec![Step::Forward, Step::Stay]
        }
    }

    fn sample(
        &self,
        state: &u32,
        action: &Step,
        _rng: &mut StdRng,
    ) -> Result<EnvironmentOutcome<u32>> {
        let (next, reward) = self.step(*state, *action);
        Ok(EnvironmentOutcome::primitive(next, reward, self.is_terminal(&next)))
    }

    fn transitions(&self, state: &u32, action: &Step) -> Result<Vec<TransitionProb<u32>>> {
        let (next, reward) = self.step(*state, *action);
        Ok(vec![TransitionProb::new(1.0, next, reward)])
    }

    fn is_terminal(&self, state: &u32) -> bool {
        *state >= self.last
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Macro;

impl Action for Macro {
    fn kind(&self) -> ActionKind {
        ActionKind::Composite
    }
}

/// State 0 runs a three-step macro into state 1, which has no actions.
#[derive(Debug, Clone, Copy)]
pub struct CompositeLine {
    discounted_probability: f64,
    reward: f64,
}

impl CompositeLine {
    pub fn new(discounted_probability: f64, reward: f64) -> Self {
        CompositeLine {
            discounted_probability,
            reward,
        }
    }
}

impl WorldModel for CompositeLine {
    type State = u8;
    type Action = Macro;

    fn applicable_actions(&self, state: &u8) -> Vec<Macro> {
        if *state == 0 { vec![Macro] } else { Vec::new() }
    }

    fn sample(
        &self,
        _state: &u8,
        _action: &Macro,
        _rng: &mut StdRng,
    ) -> Result<EnvironmentOutcome<u8>> {
        Ok(EnvironmentOutcome::composite(1, self.reward, false, 3))
    }

    fn transitions(&self, _state: &u8, _action: &Macro) -> Result<Vec<TransitionProb<u8>>> {
        Ok(vec![TransitionProb::new(self.discounted_probability, 1, self.reward)])
    }

    fn is_terminal(&self, state: &u8) -> bool {
        *state == 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lever {
    Good,
    Bad,
}

impl Action for Lever {}

/// One-shot two-armed bandit; every state other than 0 is terminal.
#[derive(Debug, Clone, Copy)]
pub struct Bandit {
    p_good: f64,
    p_bad: f64,
}

impl Bandit {
    pub fn new(p_good: f64, p_bad: f64) -> Self {
        Bandit { p_good, p_bad }
    }

    fn payout(&self, lever: Lever) -> f64 {
        match lever {
            Lever::Good => self.p_good,
            Lever::Bad => self.p_bad,
        }
    }
}

impl WorldModel for Bandit {
    type State = u8;
    type Action = Lever;

    fn applicable_actions(&self, state: &u8) -> Vec<Lever> {
        if *state == 0 {
            vec![Lever::Good, Lever::Bad]
        } else {
            Vec::new()
        }
    }

    fn sample(
        &self,
        _state: &u8,
        action: &Lever,
        rng: &mut StdRng,
    ) -> Result<EnvironmentOutcome<u8>> {
        let reward = if rng.random_bool(self.payout(*action)) { 1.0 } else { 0.0 };
        Ok(EnvironmentOutcome::primitive(1, reward, true))
    }

    fn transitions(&self, _state: &u8, action: &Lever) -> Result<Vec<TransitionProb<u8>>> {
        let p = self.payout(*action);
        Ok(vec![TransitionProb::new(p, 1, 1.0), TransitionProb::new(1.0 - p, 1, 0.0)])
    }

    fn is_terminal(&self, state: &u8) -> bool {
        *state != 0
    }
}
