//! Planners.
//!
//! Exact planners ([`ValueIteration`], [`PolicyIteration`], [`PolicyEvaluation`])
//! share the Bellman core in [`dynamic_programming`] and read transitions
//! through the [`transitions`] cache. The search planners ([`SparseSampling`],
//! [`Uct`]) build their own trees per planning call and only ever sample
//! (or, in exact Sparse Sampling, enumerate) the model directly.
//!
//! Every planner implements [`QProvider`](crate::value::QProvider), so any of
//! them can back a [`GreedyQPolicy`](crate::policy::GreedyQPolicy).

pub mod dynamic_programming;
pub mod policy_iteration;
pub mod sparse_sampling;
pub mod transitions;
pub mod uct;
pub mod value_iteration;

pub use dynamic_programming::{DynamicProgramming, ValueTable};
pub use policy_iteration::{PolicyEvaluation, PolicyIteration, TabularPolicy};
pub use sparse_sampling::{HAndC, SparseSampling, h_and_c_for_error};
pub use transitions::{ActionOutcomes, ActionTransitions, TransitionCache, TransitionOutcome};
pub use uct::{Uct, UctTreeWalkPolicy};
pub use value_iteration::ValueIteration;
