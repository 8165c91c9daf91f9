//! Concrete hashing factories

use std::{
    collections::{HashMap, HashSet},
    fmt,
    hash::Hash,
    marker::PhantomData,
};

use super::HashingFactory;

/// Uses the state's own `Eq + Hash` as its canonical key.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleHashingFactory;

impl<S> HashingFactory<S> for SimpleHashingFactory
where
    S: Clone + Eq + Hash + fmt::Debug,
{
    type Key = S;

    fn canonical_key(&self, state: &S) -> S {
        state.clone()
    }
}

/// Canonicalizes states with a caller-supplied function.
///
/// # Examples
///
/// ```
/// use mdp_planning::hashing::{FnHashingFactory, HashingFactory};
///
/// // Positions on a ring of 8 cells, where only the cell matters.
/// let factory = FnHashingFactory::new(|position: &i64| position.rem_euclid(8));
/// assert_eq!(factory.canonical_key(&3), factory.canonical_key(&11));
/// ```
pub struct FnHashingFactory<F, K> {
    canonicalize: F,
    _key: PhantomData<fn() -> K>,
}

impl<F, K> FnHashingFactory<F, K> {
    pub fn new(canonicalize: F) -> Self {
        FnHashingFactory {
            canonicalize,
            _key: PhantomData,
        }
    }
}

impl<S, F, K> HashingFactory<S> for FnHashingFactory<F, K>
where
    F: Fn(&S) -> K,
    K: Clone + Eq + Hash + fmt::Debug,
{
    type Key = K;

    fn canonical_key(&self, state: &S) -> K {
        (self.canonicalize)(state)
    }
}

/// A state made of interchangeable objects.
pub trait ObjectState {
    /// Object description without any identifier.
    type Object: Clone + Ord + Hash + fmt::Debug;

    fn objects(&self) -> Vec<Self::Object>;
}

/// Identifier-independent hashing: two states are equivalent when they hold
/// the same multiset of objects, whatever order the objects are listed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnorderedObjectsFactory;

impl<S: ObjectState> HashingFactory<S> for UnorderedObjectsFactory {
    type Key = Vec<S::Object>;

    fn canonical_key(&self, state: &S) -> Self::Key {
        let mut objects = state.objects();
        objects.sort_unstable();
        objects
    }
}

/// A state described by a fixed-length vector of numeric variables.
pub trait VariableState {
    fn variables(&self) -> Vec<f64>;
}

fn exact_bits(value: f64) -> u64 {
    // -0.0 and 0.0 compare equal, so they must share a key
    if value == 0.0 { 0.0f64.to_bits() } else { value.to_bits() }
}

/// Hashes on every variable except the masked ones, comparing the rest exactly.
#[derive(Debug, Clone, Default)]
pub struct MaskedHashingFactory {
    masked: HashSet<usize>,
}

impl MaskedHashingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore the variable at `index` when hashing.
    pub fn with_masked_variable(mut self, index: usize) -> Self {
        self.masked.insert(index);
        self
    }
}

impl<S: VariableState> HashingFactory<S> for MaskedHashingFactory {
    type Key = Vec<u64>;

    fn canonical_key(&self, state: &S) -> Self::Key {
        state
            .variables()
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !self.masked.contains(index))
            .map(|(_, value)| exact_bits(value))
            .collect()
    }
}

/// Floors each variable to a multiple before hashing, so values within the
/// same bin collapse to one key.
///
/// # Examples
///
/// ```
/// use mdp_planning::hashing::{DiscretizingHashingFactory, HashingFactory, VariableState};
///
/// struct Point(f64, f64);
/// impl VariableState for Point {
///     fn variables(&self) -> Vec<f64> {
///         vec![self.0, self.1]
///     }
/// }
///
/// let factory = DiscretizingHashingFactory::new(0.5).unwrap();
/// assert_eq!(
///     factory.canonical_key(&Point(1.1, 2.0)),
///     factory.canonical_key(&Point(1.4, 2.3)),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct DiscretizingHashingFactory {
    default_multiple: f64,
    multiples: HashMap<usize, f64>,
    masked: HashSet<usize>,
}

impl DiscretizingHashingFactory {
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfiguration`] if the multiple is not positive and finite.
    pub fn new(default_multiple: f64) -> crate::Result<Self> {
        Self::check_multiple(default_multiple)?;
        Ok(DiscretizingHashingFactory {
            default_multiple,
            multiples: HashMap::new(),
            masked: HashSet::new(),
        })
    }

    /// Use a different bin width for the variable at `index`.
    pub fn with_multiple_for(mut self, index: usize, multiple: f64) -> crate::Result<Self> {
        Self::check_multiple(multiple)?;
        self.multiples.insert(index, multiple);
        Ok(self)
    }

    /// Ignore the variable at `index` when hashing.
    pub fn with_masked_variable(mut self, index: usize) -> Self {
        self.masked.insert(index);
        self
    }

    fn check_multiple(multiple: f64) -> crate::Result<()> {
        if multiple > 0.0 && multiple.is_finite() {
            Ok(())
        } else {
            Err(crate::Error::invalid_config(format!(
                "discretization multiple {multiple} must be positive and finite"
            )))
        }
    }

    fn bin(&self, index: usize, value: f64) -> i64 {
        let multiple = self
            .multiples
            .get(&index)
            .copied()
            .unwrap_or(self.default_multiple);
        (value / multiple).floor() as i64
    }
}

impl<S: VariableState> HashingFactory<S> for DiscretizingHashingFactory {
    type Key = Vec<i64>;

    fn canonical_key(&self, state: &S) -> Self::Key {
        state
            .variables()
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !self.masked.contains(index))
            .map(|(index, value)| self.bin(index, value))
            .collect()
    }
}
