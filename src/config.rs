//! Configuration types for planner creation.
//!
//! Each planner takes one of these at construction and calls `validate()`
//! before building any state, so a bad discount or a zero budget fails fast.
//!
//! # Examples
//!
//! ```
//! use mdp_planning::config::{DynamicProgrammingConfig, TransitionMode, ValueIterationConfig};
//!
//! let config = ValueIterationConfig::new(0.95, 1e-6, 500).with_dynamic_programming(
//!     DynamicProgrammingConfig::new(0.95)
//!         .with_transition_mode(TransitionMode::Sample { samples: 50 })
//!         .with_seed(42),
//! );
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::{Error, Result, types::Discount};

/// Where the dynamic programming core gets transition distributions from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransitionSource {
    /// Through the per-state transition cache.
    #[default]
    Cached,
    /// Straight from the world model on every backup.
    OnDemand,
}

/// How the transition cache builds a state's outcome distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransitionMode {
    /// Ask the model for its full enumerated distribution.
    #[default]
    Enumerate,
    /// Draw `samples` outcomes per action and bucket them.
    Sample { samples: usize },
}

fn check_discount(value: f64) -> Result<Discount> {
    Discount::new(value)
}

fn check_threshold(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_config(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

/// Settings shared by every dynamic programming planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicProgrammingConfig {
    /// Discount factor γ
    pub discount: f64,
    pub transition_source: TransitionSource,
    pub transition_mode: TransitionMode,
    /// Whether cache entries are reused; disable for non-stationary dynamics
    pub cache_transitions: bool,
    /// Random seed for sampled transitions
    pub seed: Option<u64>,
}

impl DynamicProgrammingConfig {
    /// Cached, enumerated transitions with memoization on.
    pub fn new(discount: f64) -> Self {
        Self {
            discount,
            transition_source: TransitionSource::default(),
            transition_mode: TransitionMode::default(),
            cache_transitions: true,
            seed: None,
        }
    }

    pub fn with_transition_source(mut self, source: TransitionSource) -> Self {
        self.transition_source = source;
        self
    }

    pub fn with_transition_mode(mut self, mode: TransitionMode) -> Self {
        self.transition_mode = mode;
        self
    }

    pub fn with_cache_transitions(mut self, cache: bool) -> Self {
        self.cache_transitions = cache;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// The validated discount factor.
    pub fn discount(&self) -> Result<Discount> {
        check_discount(self.discount)
    }

    pub fn validate(&self) -> Result<()> {
        check_discount(self.discount)?;
        if self.transition_mode == (TransitionMode::Sample { samples: 0 }) {
            return Err(Error::invalid_config(
                "sampled transitions need at least one sample per action",
            ));
        }
        Ok(())
    }
}

impl Default for DynamicProgrammingConfig {
    fn default() -> Self {
        Self::new(0.99)
    }
}

/// Value Iteration stopping rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueIterationConfig {
    pub dynamic_programming: DynamicProgrammingConfig,
    /// Sweeping stops once the largest value change falls below this
    pub max_delta: f64,
    /// Hard cap on the number of sweeps
    pub max_iterations: usize,
}

impl ValueIterationConfig {
    pub fn new(discount: f64, max_delta: f64, max_iterations: usize) -> Self {
        Self {
            dynamic_programming: DynamicProgrammingConfig::new(discount),
            max_delta,
            max_iterations,
        }
    }

    /// Replace the shared dynamic programming settings, discount included.
    pub fn with_dynamic_programming(mut self, config: DynamicProgrammingConfig) -> Self {
        self.dynamic_programming = config;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.dynamic_programming.validate()?;
        check_threshold("max_delta", self.max_delta)?;
        if self.max_iterations == 0 {
            return Err(Error::invalid_config("max_iterations must be at least 1"));
        }
        Ok(())
    }
}

/// Policy Iteration and Policy Evaluation stopping rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyIterationConfig {
    pub dynamic_programming: DynamicProgrammingConfig,
    /// Inner evaluation stops once the value change falls below this
    pub max_eval_delta: f64,
    /// Improvement stops once an evaluation changed values by no more than this
    pub max_policy_delta: f64,
    pub max_eval_iterations: usize,
    pub max_policy_iterations: usize,
}

impl PolicyIterationConfig {
    /// Uses `max_delta` for both the evaluation and improvement thresholds.
    pub fn new(
        discount: f64,
        max_delta: f64,
        max_eval_iterations: usize,
        max_policy_iterations: usize,
    ) -> Self {
        Self {
            dynamic_programming: DynamicProgrammingConfig::new(discount),
            max_eval_delta: max_delta,
            max_policy_delta: max_delta,
            max_eval_iterations,
            max_policy_iterations,
        }
    }

    pub fn with_dynamic_programming(mut self, config: DynamicProgrammingConfig) -> Self {
        self.dynamic_programming = config;
        self
    }

    pub fn with_max_eval_delta(mut self, delta: f64) -> Self {
        self.max_eval_delta = delta;
        self
    }

    pub fn with_max_policy_delta(mut self, delta: f64) -> Self {
        self.max_policy_delta = delta;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.dynamic_programming.validate()?;
        check_threshold("max_eval_delta", self.max_eval_delta)?;
        if !(self.max_policy_delta.is_finite() && self.max_policy_delta >= 0.0) {
            return Err(Error::invalid_config(format!(
                "max_policy_delta must be non-negative and finite, got {}",
                self.max_policy_delta
            )));
        }
        if self.max_eval_iterations == 0 || self.max_policy_iterations == 0 {
            return Err(Error::invalid_config(
                "iteration limits must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Sparse Sampling tree shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseSamplingConfig {
    pub discount: f64,
    /// Tree height H
    pub height: usize,
    /// Samples per action C; ignored in exact mode
    pub samples: usize,
    /// Full Bellman sums over enumerated transitions instead of sampling
    pub exact: bool,
    /// Shrink C geometrically with depth
    pub variable_samples: bool,
    /// Drop the tree after every planning call
    pub forget_previous_results: bool,
    pub seed: Option<u64>,
}

impl SparseSamplingConfig {
    pub fn new(discount: f64, height: usize, samples: usize) -> Self {
        Self {
            discount,
            height,
            samples,
            exact: false,
            variable_samples: false,
            forget_previous_results: false,
            seed: None,
        }
    }

    /// Exact mode with the given height; the sample count is unused.
    pub fn exact(discount: f64, height: usize) -> Self {
        Self {
            exact: true,
            ..Self::new(discount, height, 1)
        }
    }

    pub fn with_variable_samples(mut self, variable: bool) -> Self {
        self.variable_samples = variable;
        self
    }

    pub fn with_forget_previous_results(mut self, forget: bool) -> Self {
        self.forget_previous_results = forget;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_discount(self.discount)?;
        if !self.exact && self.samples == 0 {
            return Err(Error::invalid_config(
                "sparse sampling needs at least one sample per action",
            ));
        }
        Ok(())
    }
}

/// UCT search budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UctConfig {
    pub discount: f64,
    /// Maximum rollout depth in primitive steps
    pub horizon: usize,
    /// Rollouts per planning call
    pub rollouts: usize,
    /// Exploration constant c in the UCB bonus
    pub exploration_bias: f64,
    pub seed: Option<u64>,
}

impl UctConfig {
    /// Uses an exploration bias of 2.
    pub fn new(discount: f64, horizon: usize, rollouts: usize) -> Self {
        Self {
            discount,
            horizon,
            rollouts,
            exploration_bias: 2.0,
            seed: None,
        }
    }

    pub fn with_exploration_bias(mut self, bias: f64) -> Self {
        self.exploration_bias = bias;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_discount(self.discount)?;
        if self.rollouts == 0 {
            return Err(Error::invalid_config("UCT needs at least one rollout"));
        }
        if !(self.exploration_bias.is_finite() && self.exploration_bias >= 0.0) {
            return Err(Error::invalid_config(format!(
                "exploration_bias must be non-negative and finite, got {}",
                self.exploration_bias
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_discount_is_rejected() {
        let err = DynamicProgrammingConfig::new(1.5).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidDiscount { .. }));
        assert!(UctConfig::new(-0.2, 5, 10).validate().is_err());
        assert!(SparseSamplingConfig::new(2.0, 3, 2).validate().is_err());
    }

    #[test]
    fn test_zero_budgets_are_rejected() {
        assert!(UctConfig::new(0.9, 5, 0).validate().is_err());
        assert!(SparseSamplingConfig::new(0.9, 3, 0).validate().is_err());
        assert!(SparseSamplingConfig::exact(0.9, 3).validate().is_ok());
        assert!(ValueIterationConfig::new(0.9, 0.0, 10).validate().is_err());
        assert!(
            DynamicProgrammingConfig::new(0.9)
                .with_transition_mode(TransitionMode::Sample { samples: 0 })
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_builders_set_fields() {
        let config = UctConfig::new(0.9, 10, 500)
            .with_exploration_bias(1.0)
            .with_seed(3);
        assert_eq!(config.exploration_bias, 1.0);
        assert_eq!(config.seed, Some(3));

        let pi = PolicyIterationConfig::new(0.9, 1e-3, 20, 10).with_max_policy_delta(0.0);
        assert!(pi.validate().is_ok());
        assert_eq!(pi.max_eval_delta, 1e-3);
    }

    #[test]
    fn test_configs_round_trip_through_json() {
        let config = ValueIterationConfig::new(0.95, 1e-4, 100).with_dynamic_programming(
            DynamicProgrammingConfig::new(0.95)
                .with_transition_mode(TransitionMode::Sample { samples: 8 })
                .with_cache_transitions(false),
        );
        let json = serde_json::to_string(&config).unwrap();
        let back: ValueIterationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
