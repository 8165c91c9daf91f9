//! Planning engine for Markov Decision Processes
//!
//! This crate provides:
//! - Canonical state hashing so equivalent states share one cache slot
//! - A per-state transition cache for exact planners
//! - A Bellman dynamic programming core with Value Iteration, Policy
//!   Evaluation and Policy Iteration
//! - Sparse Sampling and UCT planners for state spaces too large to enumerate
//!
//! Planners consume a [`model::WorldModel`] and a [`hashing::HashingFactory`]
//! and answer Q-value queries through [`value::QProvider`], from which
//! [`policy::GreedyQPolicy`] and friends derive actions.

pub mod config;
pub mod error;
pub mod hashing;
pub mod model;
pub mod observers;
pub mod planning;
pub mod policy;
pub mod ports;
pub mod types;
pub mod utils;
pub mod value;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{
    DynamicProgrammingConfig, PolicyIterationConfig, SparseSamplingConfig, TransitionMode,
    TransitionSource, UctConfig, ValueIterationConfig,
};
pub use error::{Error, Result};
pub use hashing::{HashableState, HashingFactory, SimpleHashingFactory};
pub use model::{Action, ActionKind, EnvironmentOutcome, TransitionProb, WorldModel};
pub use planning::{
    DynamicProgramming, PolicyEvaluation, PolicyIteration, SparseSampling, Uct, UctTreeWalkPolicy,
    ValueIteration,
};
pub use policy::{EpsilonGreedy, GreedyQPolicy, Policy, RandomPolicy};
pub use types::{ActionProb, Discount, QValue};
pub use value::{ConstantValueFunction, QProvider, ValueFunction};
