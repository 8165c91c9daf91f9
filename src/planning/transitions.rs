//! Action Transition Cache.
//!
//! For each hashed state the cache holds one [`ActionOutcomes`] record per
//! applicable action, built lazily on first query. Entries are reused until
//! [`TransitionCache::clear`] unless memoization is switched off, in which
//! case every query rebuilds the entry (needed when dynamics drift).
//!
//! Composite actions are always read from the model's enumerated distribution,
//! whose probabilities and rewards already carry the discount. A model that
//! can only sample a composite action makes the cache fail with
//! [`Error::CompositeTransitionsUnsupported`] rather than approximate.

use std::collections::{HashMap, hash_map::Entry};

use log::trace;
use rand::rngs::StdRng;

use crate::{
    Error, Result,
    config::TransitionMode,
    hashing::{HashableState, HashingFactory},
    model::{Action, WorldModel},
    utils::build_rng,
};

/// One `(probability, next state, reward)` record.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome<S, K> {
    pub probability: f64,
    pub next_state: HashableState<S, K>,
    pub reward: f64,
}

/// Every outcome of one action.
#[derive(Debug, Clone)]
pub struct ActionOutcomes<A, S, K> {
    pub action: A,
    pub outcomes: Vec<TransitionOutcome<S, K>>,
}

/// Cache entry for one state: outcomes per applicable action, in the model's order.
#[derive(Debug, Clone)]
pub struct ActionTransitions<A, S, K> {
    actions: Vec<ActionOutcomes<A, S, K>>,
}

impl<A: PartialEq, S, K> ActionTransitions<A, S, K> {
    pub fn new(actions: Vec<ActionOutcomes<A, S, K>>) -> Self {
        ActionTransitions { actions }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionOutcomes<A, S, K>> {
        self.actions.iter()
    }

    /// Outcomes recorded for `action`, if it was applicable.
    pub fn get(&self, action: &A) -> Option<&ActionOutcomes<A, S, K>> {
        self.actions.iter().find(|ao| &ao.action == action)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Outcome distribution of a single action, without touching any cache.
///
/// Used by the cache itself and by the on-demand backup path, so both produce
/// identical records for enumerated models.
pub fn action_outcomes<M, H>(
    model: &M,
    hashing: &H,
    state: &M::State,
    action: &M::Action,
    mode: TransitionMode,
    rng: &mut StdRng,
) -> Result<Vec<TransitionOutcome<M::State, H::Key>>>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    if !action.is_primitive() {
        return enumerated(model, hashing, state, action).map_err(|err| match err {
            Error::TransitionsUnavailable { action } => Error::CompositeTransitionsUnsupported {
                action,
                context: "the model can only sample this action".to_string(),
            },
            other => other,
        });
    }
    match mode {
        TransitionMode::Enumerate => enumerated(model, hashing, state, action),
        TransitionMode::Sample { samples } => sampled(model, hashing, state, action, samples, rng),
    }
}

fn enumerated<M, H>(
    model: &M,
    hashing: &H,
    state: &M::State,
    action: &M::Action,
) -> Result<Vec<TransitionOutcome<M::State, H::Key>>>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    Ok(model
        .transitions(state, action)?
        .into_iter()
        .map(|tp| TransitionOutcome {
            probability: tp.probability,
            next_state: hashing.hash_state(&tp.next_state),
            reward: tp.reward,
        })
        .collect())
}

/// Empirical distribution: identical hashed successors share a bucket whose
/// probability is its sample share and whose reward is the mean sampled reward.
fn sampled<M, H>(
    model: &M,
    hashing: &H,
    state: &M::State,
    action: &M::Action,
    samples: usize,
    rng: &mut StdRng,
) -> Result<Vec<TransitionOutcome<M::State, H::Key>>>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    let mut buckets: Vec<(HashableState<M::State, H::Key>, usize, f64)> = Vec::new();
    let mut index: HashMap<H::Key, usize> = HashMap::new();
    for _ in 0..samples {
        let outcome = model.sample(state, action, rng)?;
        let next = hashing.hash_state(&outcome.next_state);
        match index.get(next.key()) {
            Some(&slot) => {
                buckets[slot].1 += 1;
                buckets[slot].2 += outcome.reward;
            }
            None => {
                index.insert(next.key().clone(), buckets.len());
                buckets.push((next, 1, outcome.reward));
            }
        }
    }
    let total = samples as f64;
    Ok(buckets
        .into_iter()
        .map(|(next_state, count, reward_sum)| TransitionOutcome {
            probability: count as f64 / total,
            next_state,
            reward: reward_sum / count as f64,
        })
        .collect())
}

/// Per-state memo of [`ActionTransitions`], keyed by canonical state key.
pub struct TransitionCache<A, S, K> {
    entries: HashMap<K, ActionTransitions<A, S, K>>,
    mode: TransitionMode,
    memoize: bool,
    seed: Option<u64>,
    rng: StdRng,
}

impl<A, S, K> TransitionCache<A, S, K>
where
    A: Clone + PartialEq,
    S: Clone,
    K: Clone + Eq + std::hash::Hash + std::fmt::Debug,
{
    pub fn new(mode: TransitionMode, memoize: bool, seed: Option<u64>) -> Self {
        TransitionCache {
            entries: HashMap::new(),
            mode,
            memoize,
            seed,
            rng: build_rng(seed),
        }
    }

    pub fn mode(&self) -> TransitionMode {
        self.mode
    }

    /// Outcome distributions for every action applicable in `state`.
    ///
    /// Built on first call and reused afterwards while memoization is on.
    ///
    /// # Errors
    ///
    /// Propagates model failures, and returns
    /// [`Error::CompositeTransitionsUnsupported`] for composite actions the
    /// model cannot enumerate.
    pub fn transitions_for<M, H>(
        &mut self,
        model: &M,
        hashing: &H,
        state: &HashableState<S, K>,
    ) -> Result<&ActionTransitions<A, S, K>>
    where
        M: WorldModel<State = S, Action = A>,
        H: HashingFactory<S, Key = K>,
    {
        let mode = self.mode;
        let entry = match self.entries.entry(state.key().clone()) {
            Entry::Occupied(mut occupied) => {
                if !self.memoize {
                    let fresh = build_entry(model, hashing, state.state(), mode, &mut self.rng)?;
                    occupied.insert(fresh);
                }
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => {
                trace!("building transitions for {:?}", state.key());
                vacant.insert(build_entry(model, hashing, state.state(), mode, &mut self.rng)?)
            }
        };
        Ok(entry)
    }

    pub fn contains(&self, state: &HashableState<S, K>) -> bool {
        self.entries.contains_key(state.key())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and reseed the sampler.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.rng = build_rng(self.seed);
    }
}

fn build_entry<M, H>(
    model: &M,
    hashing: &H,
    state: &M::State,
    mode: TransitionMode,
    rng: &mut StdRng,
) -> Result<ActionTransitions<M::Action, M::State, H::Key>>
where
    M: WorldModel,
    H: HashingFactory<M::State>,
{
    let actions = model
        .applicable_actions(state)
        .into_iter()
        .map(|action| {
            let outcomes = action_outcomes(model, hashing, state, &action, mode, rng)?;
            Ok(ActionOutcomes { action, outcomes })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ActionTransitions::new(actions))
}
