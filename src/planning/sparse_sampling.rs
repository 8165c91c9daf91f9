//! Sparse Sampling.
//!
//! Builds a lookahead tree of height H from the query state. Nodes are keyed
//! by (canonical state key, height from the leaves), estimated once and then
//! closed, so a state reached twice at the same height is evaluated once.
//!
//! * height 0: every action's Q is the leaf value of the state
//! * sampled mode: `Q(s,a) = mean over C samples of r + γ^k · V(s', h − k)`
//! * exact mode: `Q(s,a) = Σ p · (r + γ · V(s', h − 1))`, primitive actions only
//!
//! Recursion depth is bounded by H.

use std::collections::HashMap;

use log::{debug, info};
use rand::rngs::StdRng;

use crate::{
    Error, Result,
    config::SparseSamplingConfig,
    hashing::{HashedState, HashingFactory, StateKey},
    model::{Action, WorldModel},
    observers::NoopObserver,
    ports::PlanningObserver,
    types::{Discount, QValue, max_q},
    utils::build_rng,
    value::{ConstantValueFunction, QProvider, ValueFunction, find_q, optimal_value},
};

/// Tree height and sample count pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HAndC {
    pub height: usize,
    pub samples: usize,
}

/// Height and samples per action that make Sparse Sampling ε-optimal.
///
/// Follows Kearns, Mansour and Ng, "A Sparse Sampling Algorithm for
/// Near-Optimal Planning in Large Markov Decision Processes" (2002). With
/// `λ = ε(1−γ)²/4` and `Vmax = Rmax/(1−γ)`:
///
/// ```text
/// H = ⌊log_γ(λ / Vmax)⌋ + 1
/// C = (Vmax² / λ²) · (2H · ln(|A| · H · Vmax² / λ²) + ln(Rmax / λ))
/// ```
///
/// The `ln(Rmax / λ)` term is added outside the first logarithm.
///
/// The values grow very quickly as ε shrinks and are rarely tractable; they
/// serve as a closed-form reference rather than a default.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] unless `rmax` and `epsilon` are
/// positive, `num_actions` is non-zero and the discount is below 1.
pub fn h_and_c_for_error(
    rmax: f64,
    discount: Discount,
    epsilon: f64,
    num_actions: usize,
) -> Result<HAndC> {
    let gamma = discount.value();
    if !(rmax > 0.0 && epsilon > 0.0 && num_actions > 0 && gamma > 0.0 && gamma < 1.0) {
        return Err(Error::invalid_config(format!(
            "epsilon-optimal parameters need rmax > 0, epsilon > 0, at least one action \
             and 0 < discount < 1 (got rmax {rmax}, epsilon {epsilon}, {num_actions} actions, \
             discount {gamma})"
        )));
    }
    let lambda = epsilon * (1.0 - gamma) * (1.0 - gamma) / 4.0;
    let vmax = rmax / (1.0 - gamma);
    let height = ((lambda / vmax).ln() / gamma.ln()) as usize + 1;
    let ratio = vmax * vmax / (lambda * lambda);
    let h = height as f64;
    let samples = ratio * (2.0 * h * (num_actions as f64 * h * ratio).ln() + (rmax / lambda).ln());
    let samples = samples as usize;
    Ok(HAndC { height, samples })
}

struct StateNode<S, K> {
    state: crate::hashing::HashableState<S, K>,
    height: usize,
    closed: bool,
    value: f64,
}

/// Finite-horizon lookahead planner.
///
/// Root-level Q-values are remembered per planned state, and so are closed
/// tree nodes, which later planning calls reuse unless
/// `forget_previous_results` is set.
pub struct SparseSampling<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    model: M,
    hashing: H,
    discount: Discount,
    height: usize,
    samples: usize,
    exact: bool,
    variable_samples: bool,
    forget_previous_results: bool,
    seed: Option<u64>,
    rng: StdRng,
    leaf_value: Box<dyn ValueFunction<M::State>>,
    nodes: Vec<StateNode<M::State, StateKey<M, H>>>,
    index: HashMap<(StateKey<M, H>, usize), usize>,
    root_q_values: HashMap<StateKey<M, H>, Vec<QValue<M::Action>>>,
    value_estimates: usize,
    observer: Box<dyn PlanningObserver>,
}

impl<M, H> SparseSampling<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    pub fn new(model: M, hashing: H, config: SparseSamplingConfig) -> Result<Self> {
        config.validate()?;
        Ok(SparseSampling {
            model,
            hashing,
            discount: Discount::new(config.discount)?,
            height: config.height,
            samples: config.samples,
            exact: config.exact,
            variable_samples: config.variable_samples,
            forget_previous_results: config.forget_previous_results,
            seed: config.seed,
            rng: build_rng(config.seed),
            leaf_value: Box::new(ConstantValueFunction::default()),
            nodes: Vec::new(),
            index: HashMap::new(),
            root_q_values: HashMap::new(),
            value_estimates: 0,
            observer: Box::new(NoopObserver),
        })
    }

    /// Heuristic value of states at the leaves; zero by default.
    pub fn with_leaf_value(mut self, leaf_value: impl ValueFunction<M::State> + 'static) -> Self {
        self.leaf_value = Box::new(leaf_value);
        self
    }

    pub fn with_observer(mut self, observer: impl PlanningObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Switch on forgetting; drops every stored node straight away.
    pub fn set_forget_previous_results(&mut self, forget: bool) {
        self.forget_previous_results = forget;
        if forget {
            self.clear_tree();
        }
    }

    /// Replace H and C with the ε-optimal values from [`h_and_c_for_error`].
    pub fn set_h_and_c_by_error(
        &mut self,
        rmax: f64,
        epsilon: f64,
        num_actions: usize,
    ) -> Result<HAndC> {
        let hc = h_and_c_for_error(rmax, self.discount, epsilon, num_actions)?;
        info!("epsilon-optimal sparse sampling: H = {}, C = {}", hc.height, hc.samples);
        self.height = hc.height;
        self.samples = hc.samples.max(1);
        Ok(hc)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Value estimates performed since construction or the last reset.
    pub fn value_estimates(&self) -> usize {
        self.value_estimates
    }

    /// Stored tree nodes plus remembered root states.
    pub fn state_nodes_created(&self) -> usize {
        self.nodes.len() + self.root_q_values.len()
    }

    /// Samples per action for a node at `height` from the leaves.
    ///
    /// With variable samples, C shrinks as `C · γ^(2d)` with depth
    /// `d = H − height`, never dropping below one.
    pub fn samples_at_height(&self, height: usize) -> usize {
        if !self.variable_samples {
            return self.samples;
        }
        let depth = self.height.saturating_sub(height);
        let scaled = (self.samples as f64 * self.discount.after_steps(2 * depth)) as usize;
        scaled.max(1)
    }

    /// Build the tree rooted at `state` and remember its Q-values.
    ///
    /// A state planned before is answered from memory.
    pub fn plan_from(&mut self, state: &M::State) -> Result<()> {
        if self.forget_previous_results {
            self.root_q_values.clear();
        }
        let root = self.hashing.hash_state(state);
        if self.root_q_values.contains_key(root.key()) {
            return Ok(());
        }

        self.observer.on_planning_start("sparse sampling", self.height)?;
        let before = self.value_estimates;
        let qs = self.estimate_qs(&root, self.height)?;
        self.root_q_values.insert(root.key().clone(), qs);
        debug!(
            "sparse sampling finished with {} value estimates ({} in total)",
            self.value_estimates - before,
            self.value_estimates
        );
        self.observer.on_value_estimates(self.value_estimates)?;

        if self.forget_previous_results {
            self.clear_tree();
        }
        self.observer.on_planning_end()
    }

    fn node_at(&mut self, state: &M::State, height: usize) -> usize {
        let hashed = self.hashing.hash_state(state);
        let slot = (hashed.key().clone(), height);
        if let Some(&index) = self.index.get(&slot) {
            return index;
        }
        let index = self.nodes.len();
        self.nodes.push(StateNode {
            state: hashed,
            height,
            closed: false,
            value: 0.0,
        });
        self.index.insert(slot, index);
        index
    }

    /// Value of a node, estimating and closing it on first use.
    fn estimate_value(&mut self, index: usize) -> Result<f64> {
        if self.nodes[index].closed {
            return Ok(self.nodes[index].value);
        }
        let state = self.nodes[index].state.clone();
        let height = self.nodes[index].height;
        let value = if self.model.is_terminal(state.state()) {
            0.0
        } else {
            let qs = self.estimate_qs(&state, height)?;
            self.value_estimates += 1;
            max_q(qs.iter().map(|qv| qv.q))
        };
        let node = &mut self.nodes[index];
        node.value = value;
        node.closed = true;
        Ok(value)
    }

    fn estimate_qs(
        &mut self,
        state: &HashedState<M, H>,
        height: usize,
    ) -> Result<Vec<QValue<M::Action>>> {
        let actions = self.model.applicable_actions(state.state());
        let mut qs = Vec::with_capacity(actions.len());
        for action in actions {
            let q = if height == 0 {
                self.leaf_value.value(state.state())
            } else if self.exact {
                self.exact_q(state, &action, height)?
            } else {
                self.sampled_q(state, &action, height)?
            };
            qs.push(QValue::new(action, q));
        }
        Ok(qs)
    }

    fn sampled_q(
        &mut self,
        state: &HashedState<M, H>,
        action: &M::Action,
        height: usize,
    ) -> Result<f64> {
        let samples = self.samples_at_height(height);
        let mut sum = 0.0;
        for _ in 0..samples {
            let outcome = self.model.sample(state.state(), action, &mut self.rng)?;
            let steps = outcome.elapsed_steps();
            let child = self.node_at(&outcome.next_state, height.saturating_sub(steps));
            sum += outcome.reward + self.discount.after_steps(steps) * self.estimate_value(child)?;
        }
        Ok(sum / samples as f64)
    }

    fn exact_q(
        &mut self,
        state: &HashedState<M, H>,
        action: &M::Action,
        height: usize,
    ) -> Result<f64> {
        if !action.is_primitive() {
            return Err(Error::CompositeTransitionsUnsupported {
                action: format!("{action:?}"),
                context: "exact sparse sampling needs per-step transitions; use sampling mode"
                    .to_string(),
            });
        }
        let mut sum = 0.0;
        for tp in self.model.transitions(state.state(), action)? {
            let child = self.node_at(&tp.next_state, height - 1);
            let future = self.discount.value() * self.estimate_value(child)?;
            sum += tp.probability * (tp.reward + future);
        }
        Ok(sum)
    }

    fn clear_tree(&mut self) {
        self.nodes.clear();
        self.index.clear();
    }

    /// Forget every node, remembered Q-value and counter.
    pub fn reset(&mut self) {
        self.clear_tree();
        self.root_q_values.clear();
        self.value_estimates = 0;
        self.rng = build_rng(self.seed);
    }
}

impl<M, H> QProvider for SparseSampling<M, H>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    type State = M::State;
    type Action = M::Action;

    /// Plans from `state` first if it has not been planned for.
    fn q_values(&mut self, state: &M::State) -> Result<Vec<QValue<M::Action>>> {
        let key = self.hashing.canonical_key(state);
        if !self.root_q_values.contains_key(&key) {
            self.plan_from(state)?;
        }
        Ok(self.root_q_values.get(&key).cloned().unwrap_or_default())
    }

    fn q_value(&mut self, state: &M::State, action: &M::Action) -> Result<f64> {
        let qs = self.q_values(state)?;
        find_q(&qs, action)
    }

    fn value(&mut self, state: &M::State) -> Result<f64> {
        if self.model.is_terminal(state) {
            return Ok(0.0);
        }
        Ok(optimal_value(&self.q_values(state)?))
    }
}
