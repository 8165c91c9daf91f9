//! Value functions and Q-value sources.

use crate::{
    Error, Result,
    types::{QValue, max_q},
};

/// Scalar estimate of a state's value.
///
/// Used as the default for never-visited states in dynamic programming and
/// as the leaf heuristic in Sparse Sampling. Closures `Fn(&S) -> f64`
/// implement it directly.
pub trait ValueFunction<S> {
    fn value(&self, state: &S) -> f64;
}

impl<S, F> ValueFunction<S> for F
where
    F: Fn(&S) -> f64,
{
    fn value(&self, state: &S) -> f64 {
        self(state)
    }
}

/// The same value for every state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConstantValueFunction {
    value: f64,
}

impl ConstantValueFunction {
    pub fn new(value: f64) -> Self {
        ConstantValueFunction { value }
    }
}

impl<S> ValueFunction<S> for ConstantValueFunction {
    fn value(&self, _state: &S) -> f64 {
        self.value
    }
}

/// Anything that can report Q-values for a state.
///
/// Methods take `&mut self` because search planners plan lazily on first query.
pub trait QProvider {
    type State;
    type Action: PartialEq + std::fmt::Debug;

    /// Q-values of every applicable action, in the model's action order.
    fn q_values(&mut self, state: &Self::State) -> Result<Vec<QValue<Self::Action>>>;

    /// Q-value of a single action.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QValueNotFound`] if `action` is not among the estimates for `state`.
    fn q_value(&mut self, state: &Self::State, action: &Self::Action) -> Result<f64> {
        let qs = self.q_values(state)?;
        find_q(&qs, action)
    }

    /// Optimal value `max_a Q(s, a)`; terminal states are worth zero.
    fn value(&mut self, state: &Self::State) -> Result<f64>;
}

impl<Q: QProvider + ?Sized> QProvider for &mut Q {
    type State = Q::State;
    type Action = Q::Action;

    fn q_values(&mut self, state: &Self::State) -> Result<Vec<QValue<Self::Action>>> {
        (**self).q_values(state)
    }

    fn q_value(&mut self, state: &Self::State, action: &Self::Action) -> Result<f64> {
        (**self).q_value(state, action)
    }

    fn value(&mut self, state: &Self::State) -> Result<f64> {
        (**self).value(state)
    }
}

/// Look up `action` in a set of estimates.
pub fn find_q<A: PartialEq + std::fmt::Debug>(qs: &[QValue<A>], action: &A) -> Result<f64> {
    qs.iter()
        .find(|qv| &qv.action == action)
        .map(|qv| qv.q)
        .ok_or_else(|| Error::QValueNotFound {
            action: format!("{action:?}"),
        })
}

/// Optimal value from a set of estimates.
pub fn optimal_value<A>(qs: &[QValue<A>]) -> f64 {
    max_q(qs.iter().map(|qv| qv.q))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_value_functions() {
        let heuristic = |state: &i32| f64::from(*state) * 2.0;
        assert_eq!(heuristic.value(&4), 8.0);
        assert_eq!(ConstantValueFunction::new(1.5).value(&"anything"), 1.5);
    }

    #[test]
    fn missing_actions_are_an_error_not_zero() {
        let qs = vec![QValue::new("left", 1.0), QValue::new("right", 2.0)];
        assert_eq!(find_q(&qs, &"right").unwrap(), 2.0);
        let err = find_q(&qs, &"up").unwrap_err();
        assert!(matches!(err, Error::QValueNotFound { .. }));
    }

    #[test]
    fn optimal_value_takes_the_max() {
        let qs = vec![QValue::new(0, -1.0), QValue::new(1, 3.0)];
        assert_eq!(optimal_value(&qs), 3.0);
        assert_eq!(optimal_value::<u8>(&[]), 0.0);
    }
}
