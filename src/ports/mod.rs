//! Ports (trait boundaries) for external collaborators.
//!
//! The world model and hashing factory are consumed through
//! [`crate::model::WorldModel`] and [`crate::hashing::HashingFactory`]; this
//! module holds the outbound side, the progress and debug event sink.

pub mod observer;

pub use observer::{PlanningObserver, TreeStats};
