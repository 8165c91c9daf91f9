//! Canonical state hashing.
//!
//! Every cache, value table and search tree in this crate is keyed by a
//! [`HashableState`]: a state paired with the canonical key produced by a
//! [`HashingFactory`]. Two hashable states are equal exactly when their keys
//! are equal, so structurally equivalent configurations collapse onto one
//! cache slot.
//!
//! A factory must be deterministic for the lifetime of a planning call.
//! Computing a different key for an equivalent state mid-call corrupts every
//! table that already used the first key.

pub mod factories;

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use crate::model::WorldModel;

pub use factories::{
    DiscretizingHashingFactory, FnHashingFactory, MaskedHashingFactory, ObjectState,
    SimpleHashingFactory, UnorderedObjectsFactory, VariableState,
};

/// A state together with its canonical key.
///
/// Equality and hashing look at the key only.
#[derive(Clone)]
pub struct HashableState<S, K> {
    state: S,
    key: K,
}

impl<S, K> HashableState<S, K> {
    pub fn new(state: S, key: K) -> Self {
        HashableState { state, key }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn into_state(self) -> S {
        self.state
    }
}

impl<S, K: PartialEq> PartialEq for HashableState<S, K> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<S, K: Eq> Eq for HashableState<S, K> {}

impl<S, K: Hash> Hash for HashableState<S, K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<S: fmt::Debug, K> fmt::Debug for HashableState<S, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.state)
    }
}

/// Produces canonical keys for states.
pub trait HashingFactory<S> {
    type Key: Clone + Eq + Hash + fmt::Debug;

    /// Canonical key; equal for every pair of states the factory treats as equivalent.
    fn canonical_key(&self, state: &S) -> Self::Key;

    fn hash_state(&self, state: &S) -> HashableState<S, Self::Key>
    where
        S: Clone,
    {
        HashableState::new(state.clone(), self.canonical_key(state))
    }
}

impl<S, H: HashingFactory<S> + ?Sized> HashingFactory<S> for &H {
    type Key = H::Key;

    fn canonical_key(&self, state: &S) -> Self::Key {
        (**self).canonical_key(state)
    }
}

/// Hashed state type used by planners over model `M` with factory `H`.
pub type HashedState<M, H> = HashableState<
    <M as WorldModel>::State,
    <H as HashingFactory<<M as WorldModel>::State>>::Key,
>;

/// Canonical key type used by planners over model `M` with factory `H`.
pub type StateKey<M, H> = <H as HashingFactory<<M as WorldModel>::State>>::Key;

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn equality_ignores_the_wrapped_state() {
        let a = HashableState::new("first spelling", 7u32);
        let b = HashableState::new("second spelling", 7u32);
        let c = HashableState::new("first spelling", 8u32);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn factories_work_through_references() {
        let factory = SimpleHashingFactory;
        let by_ref = &factory;
        assert_eq!(by_ref.canonical_key(&5u8), 5u8);
        assert_eq!(by_ref.hash_state(&5u8).state(), &5u8);
    }
}
