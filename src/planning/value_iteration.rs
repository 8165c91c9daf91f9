//! Value Iteration.

use log::info;

use crate::{
    Result,
    config::ValueIterationConfig,
    hashing::HashingFactory,
    model::WorldModel,
    ports::PlanningObserver,
    types::QValue,
    value::{QProvider, ValueFunction},
};

use super::dynamic_programming::DynamicProgramming;

/// Discovers every state reachable from the planning state, then sweeps
/// optimal Bellman backups until the largest change drops below `max_delta`
/// or `max_iterations` sweeps have run.
///
/// # Examples
///
/// ```
/// use mdp_planning::{
///     config::ValueIterationConfig,
///     hashing::SimpleHashingFactory,
///     model::{Action, EnvironmentOutcome, TransitionProb, WorldModel},
///     planning::ValueIteration,
/// };
/// use rand::rngs::StdRng;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Go;
/// impl Action for Go {}
///
/// /// Walk right along 0..=3; entering 3 pays 1.
/// struct Corridor;
///
/// impl WorldModel for Corridor {
///     type State = u8;
///     type Action = Go;
///
///     fn applicable_actions(&self, _state: &u8) -> Vec<Go> {
///         vec![Go]
///     }
///
///     fn sample(
///         &self,
///         s: &u8,
///         _a: &Go,
///         _rng: &mut StdRng,
///     ) -> mdp_planning::Result<EnvironmentOutcome<u8>> {
///         Ok(EnvironmentOutcome::primitive(s + 1, if *s == 2 { 1.0 } else { 0.0 }, *s == 2))
///     }
///
///     fn transitions(&self, s: &u8, _a: &Go) -> mdp_planning::Result<Vec<TransitionProb<u8>>> {
///         Ok(vec![TransitionProb::new(1.0, s + 1, if *s == 2 { 1.0 } else { 0.0 })])
///     }
///
///     fn is_terminal(&self, s: &u8) -> bool {
///         *s == 3
///     }
/// }
///
/// let config = ValueIterationConfig::new(0.5, 1e-9, 100);
/// let mut vi = ValueIteration::new(Corridor, SimpleHashingFactory, config)?;
/// vi.plan_from(&0)?;
/// assert_eq!(vi.value(&0), 0.25);
/// # Ok::<(), mdp_planning::Error>(())
/// ```
pub struct ValueIteration<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    dp: DynamicProgramming<M, H>,
    max_delta: f64,
    max_iterations: usize,
    has_run: bool,
    last_iterations: usize,
}

impl<M, H> ValueIteration<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    pub fn new(model: M, hashing: H, config: ValueIterationConfig) -> Result<Self> {
        config.validate()?;
        Ok(ValueIteration {
            dp: DynamicProgramming::new(model, hashing, config.dynamic_programming)?,
            max_delta: config.max_delta,
            max_iterations: config.max_iterations,
            has_run: false,
            last_iterations: 0,
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

    /// Plan from `state`.
    ///
    /// Sweeps only run when reachability found new states or no sweep has
    /// run since the last reset; re-planning from an already-expanded state
    /// is free.
    pub fn plan_from(&mut self, state: &M::State) -> Result<()> {
        self.dp
            .observer()
            .on_planning_start("value iteration", self.max_iterations)?;
        if self.dp.perform_reachability_from(state)? || !self.has_run {
            self.run_sweeps()?;
        }
        self.dp.observer().on_planning_end()
    }

    fn run_sweeps(&mut self) -> Result<()> {
        let mut iterations = 0;
        for iteration in 1..=self.max_iterations {
            let delta = self.dp.sweep()?;
            iterations = iteration;
            self.dp.observer().on_sweep(iteration, delta)?;
            if delta < self.max_delta {
                break;
            }
        }
        info!("value iteration converged after {iterations} passes");
        self.has_run = true;
        self.last_iterations = iterations;
        Ok(())
    }

    /// Sweeps performed by the most recent run.
    pub fn iterations(&self) -> usize {
        self.last_iterations
    }

    pub fn value(&self, state: &M::State) -> f64 {
        self.dp.value(state)
    }

    pub fn dynamic_programming(&self) -> &DynamicProgramming<M, H> {
        &self.dp
    }

    pub fn dynamic_programming_mut(&mut self) -> &mut DynamicProgramming<M, H> {
        &mut self.dp
    }

    pub fn reset(&mut self) {
        self.dp.reset();
        self.has_run = false;
        self.last_iterations = 0;
    }
}

impl<M, H> QProvider for ValueIteration<M, H>
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
