//! Utility functions shared by the planners

use rand::{Rng, SeedableRng, distr::StandardUniform, prelude::IndexedRandom, rngs::StdRng};

/// Seeded RNG when a seed is given, otherwise one seeded from the thread RNG.
pub fn build_rng(seed: Option<u64>) -> StdRng {
    if let Some(seed) = seed {
        StdRng::seed_from_u64(seed)
    } else {
        StdRng::from_rng(&mut rand::rng())
    }
}

/// Indices of every maximal element, in order.
///
/// Values within `1e-12` of the maximum count as ties.
pub fn argmax_indices(values: &[f64]) -> Vec<usize> {
    let best = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    values
        .iter()
        .enumerate()
        .filter(|(_, value)| (best - **value).abs() <= 1e-12 || **value == best)
        .map(|(index, _)| index)
        .collect()
}

/// Index of a maximal element, ties broken uniformly at random.
///
/// Returns `None` for an empty slice.
pub fn argmax_random_tie<R: Rng>(rng: &mut R, values: &[f64]) -> Option<usize> {
    argmax_indices(values).choose(rng).copied()
}

/// Sample an item with probability proportional to its weight.
///
/// # Returns
///
/// - `Some(item)` if sampling succeeds
/// - `None` if the items slice is empty
///
/// If all weights are zero or negative, falls back to uniform random selection.
///
/// # Examples
///
/// ```
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
/// use mdp_planning::utils::weighted_sample;
///
/// let mut rng = StdRng::seed_from_u64(42);
/// let items = vec![("north", 0.0), ("south", 1.0)];
/// assert_eq!(weighted_sample(&mut rng, &items), Some("south"));
/// ```
pub fn weighted_sample<R, T, W>(rng: &mut R, items: &[(T, W)]) -> Option<T>
where
    R: Rng,
    T: Clone,
    W: Into<f64> + Copy,
{
    if items.is_empty() {
        return None;
    }

    let total: f64 = items.iter().map(|(_, w)| (*w).into()).sum();
    if total <= 0.0 {
        return items.choose(rng).map(|(item, _)| item.clone());
    }

    let mut threshold = rng.sample::<f64, _>(StandardUniform) * total;
    for (item, weight) in items {
        let w = (*weight).into();
        if threshold < w {
            return Some(item.clone());
        }
        threshold -= w;
    }

    // Rounding can leave a sliver past the last bucket
    items
        .iter()
        .rev()
        .find(|(_, w)| (*w).into() > 0.0)
        .map(|(item, _)| item.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_rngs_repeat() {
        let mut a = build_rng(Some(7));
        let mut b = build_rng(Some(7));
        let xs: Vec<u32> = (0..5).map(|_| a.random()).collect();
        let ys: Vec<u32> = (0..5).map(|_| b.random()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_argmax_indices_reports_ties() {
        assert_eq!(argmax_indices(&[1.0, 3.0, 2.0, 3.0]), vec![1, 3]);
        assert!(argmax_indices(&[]).is_empty());
    }

    #[test]
    fn test_argmax_random_tie_covers_every_tie() {
        let mut rng = StdRng::seed_from_u64(3);
        let values = [5.0, 1.0, 5.0];
        let mut seen = [false; 3];
        for _ in 0..200 {
            let index = argmax_random_tie(&mut rng, &values).unwrap();
            seen[index] = true;
        }
        assert_eq!(seen, [true, false, true]);
        assert_eq!(argmax_random_tie(&mut rng, &[]), None);
    }

    #[test]
    fn test_weighted_sample_skips_zero_weights() {
        let mut rng = StdRng::seed_from_u64(42);
        let items = vec![("a", 0.0), ("b", 2.0), ("c", 0.0)];
        for _ in 0..50 {
            assert_eq!(weighted_sample(&mut rng, &items), Some("b"));
        }
    }

    #[test]
    fn test_weighted_sample_empty_returns_none() {
        let mut rng = StdRng::seed_from_u64(42);
        let items: Vec<(u8, f64)> = Vec::new();
        assert_eq!(weighted_sample(&mut rng, &items), None);
    }
}
