//! Newtype wrappers for improved type safety and domain modeling.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A discount factor γ, validated to lie within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Discount(f64);

impl Discount {
    /// Create a new discount factor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidDiscount`] if the value is outside `[0, 1]` or not finite.
    pub fn new(value: f64) -> Result<Self, crate::Error> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Discount(value))
        } else {
            Err(crate::Error::InvalidDiscount { value })
        }
    }

    /// Get the inner value.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// γ^k, the discount applied after `k` primitive steps.
    pub fn after_steps(&self, steps: usize) -> f64 {
        self.0.powi(steps as i32)
    }
}

impl From<Discount> for f64 {
    fn from(discount: Discount) -> Self {
        discount.0
    }
}

impl fmt::Display for Discount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Estimated return of taking `action` in some state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QValue<A> {
    pub action: A,
    pub q: f64,
}

impl<A> QValue<A> {
    pub fn new(action: A, q: f64) -> Self {
        QValue { action, q }
    }
}

/// Probability a policy assigns to an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProb<A> {
    pub action: A,
    pub probability: f64,
}

impl<A> ActionProb<A> {
    pub fn new(action: A, probability: f64) -> Self {
        ActionProb {
            action,
            probability,
        }
    }
}

/// Max over a set of Q-values; an empty set backs up to zero.
pub fn max_q(qs: impl IntoIterator<Item = f64>) -> f64 {
    let best = qs.into_iter().fold(f64::NEG_INFINITY, f64::max);
    if best == f64::NEG_INFINITY { 0.0 } else { best }
}
