//! Toy MDPs shared by the integration tests.
//!
//! Every file under `tests/` compiles this module separately, so each one only
//! uses a subset of it.
#![allow(dead_code)]

use mdp_planning::{
    Action, ActionKind, EnvironmentOutcome, Result, TransitionProb, WorldModel,
    hashing::{ObjectState, VariableState},
};
use rand::{Rng, rngs::StdRng};

pub fn approx_eq_tol(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Forward,
    Stay,
}

impl Action for Step {}

/// States `0..=last`; the only reward is 1 for stepping into `last`, which is terminal.
#[derive(Debug, Clone, Copy)]
pub struct Chain {
    pub last: u32,
}

impl Chain {
    pub fn new(last: u32) -> Self {
        Chain { last }
    }

    fn step(&self, state: u32, action: Step) -> (u32, f64) {
        match action {
            Step::Forward => {
                let next = (state + 1).min(self.last);
                (next, if next == self.last { 1.0 } else { 0.0 })
            }
            Step::Stay => (state, 0.0),
        }
    }

    /// Optimal value under discount `gamma`.
    pub fn optimal_value(&self, state: u32, gamma: f64) -> f64 {
        if state >= self.last {
            0.0
        } else {
            gamma.powi((self.last - state - 1) as i32)
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
pub struct Move;

impl Action for Move {}

/// Two states: `'A'` moves to terminal `'B'` for 10.
#[derive(Debug, Clone, Copy)]
pub struct Line;

impl WorldModel for Line {
    type State = char;
    type Action = Move;

    fn applicable_actions(&self, state: &char) -> Vec<Move> {
        if *state == 'A' { vec![Move] } else { Vec::new() }
    }

    fn sample(
        &self,
        _state: &char,
        _action: &Move,
        _rng: &mut StdRng,
    ) -> Result<EnvironmentOutcome<char>> {
        Ok(EnvironmentOutcome::primitive('B', 10.0, true))
    }

    fn transitions(&self, _state: &char, _action: &Move) -> Result<Vec<TransitionProb<char>>> {
        Ok(vec![TransitionProb::new(1.0, 'B', 10.0)])
    }

    fn is_terminal(&self, state: &char) -> bool {
        *state == 'B'
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Macro;

impl Action for Macro {
    fn kind(&self) -> ActionKind {
        ActionKind::Composite
    }
}

/// State 0 runs a three-step macro into terminal state 1.
///
/// The enumerated distribution already carries the discount: probability
/// `gamma^3` of reaching 1 and the expected cumulative reward.
#[derive(Debug, Clone, Copy)]
pub struct MacroLine {
    pub gamma: f64,
    pub reward: f64,
}

impl WorldModel for MacroLine {
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
        Ok(vec![TransitionProb::new(self.gamma.powi(3), 1, self.reward)])
    }

    fn is_terminal(&self, _state: &u8) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lever {
    Good,
    Bad,
}

impl Action for Lever {}

/// Two-state, two-action MDP: pulling a lever in state 0 ends the episode in
/// state 1, paying 1 with the lever's probability.
#[derive(Debug, Clone, Copy)]
pub struct Bandit {
    pub p_good: f64,
    pub p_bad: f64,
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

/// Labelled blocks whose listing order carries no meaning.
#[derive(Debug, Clone)]
pub struct Blocks(pub Vec<(char, u8)>);

impl ObjectState for Blocks {
    type Object = (char, u8);

    fn objects(&self) -> Vec<(char, u8)> {
        self.0.clone()
    }
}

/// Continuous 2-D position.
#[derive(Debug, Clone, Copy)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl VariableState for Position {
    fn variables(&self) -> Vec<f64> {
        vec![self.x, self.y]
    }
}
