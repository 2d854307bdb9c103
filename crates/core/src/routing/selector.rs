//! Weighted operator selection.
//!
//! Candidates are laid out on a cumulative weight line and a single draw in
//! `0..total` is located with a binary search, so cost does not grow with the
//! magnitude of the weights.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::operator::{Operator, OperatorId};
use crate::domain::source::OperatorSourceWeight;

/// Source of uniform draws for the selector. Injected so tests can seed it.
pub trait RandomSource: Send + Sync {
    /// Uniform integer in `0..upper`. Callers guarantee `upper > 0`.
    fn below(&self, upper: u64) -> u64;
}

/// Per-call thread-local RNG, used when no seed is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn below(&self, upper: u64) -> u64 {
        rand::thread_rng().gen_range(0..upper)
    }
}

/// Deterministic RNG shared behind a mutex.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl RandomSource for SeededRandom {
    fn below(&self, upper: u64) -> u64 {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(0..upper)
    }
}

/// Operators with positive weight laid out on a cumulative line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CumulativeWeights {
    operators: Vec<OperatorId>,
    upper_bounds: Vec<u64>,
}

impl CumulativeWeights {
    /// Zero weights are dropped; they can never win a draw.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (OperatorId, u32)>) -> Self {
        let mut operators = Vec::new();
        let mut upper_bounds = Vec::new();
        let mut running = 0u64;

        for (operator_id, weight) in pairs {
            if weight == 0 {
                continue;
            }
            running += u64::from(weight);
            operators.push(operator_id);
            upper_bounds.push(running);
        }

        Self { operators, upper_bounds }
    }

    pub fn total(&self) -> u64 {
        self.upper_bounds.last().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Operator whose interval `[previous_bound, bound)` contains `draw`.
    pub fn pick(&self, draw: u64) -> Option<OperatorId> {
        let index = self.upper_bounds.partition_point(|bound| *bound <= draw);
        self.operators.get(index).copied()
    }
}

#[derive(Clone)]
pub struct WeightedSelector {
    random: Arc<dyn RandomSource>,
}

impl Default for WeightedSelector {
    fn default() -> Self {
        Self::new(Arc::new(ThreadRandom))
    }
}

impl WeightedSelector {
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Arc::new(SeededRandom::new(seed)))
    }

    /// Picks one eligible operator with probability `weight / total weight`.
    ///
    /// Weights are restricted to the eligible operators and summed per
    /// operator. Returns `None` when nothing is eligible or the restricted
    /// total is zero.
    pub fn select(
        &self,
        eligible: &[Operator],
        weights: &[OperatorSourceWeight],
    ) -> Option<OperatorId> {
        let mut by_operator: HashMap<OperatorId, u32> = HashMap::new();
        for entry in weights {
            let slot = by_operator.entry(entry.operator_id).or_insert(0);
            *slot = slot.saturating_add(entry.weight);
        }

        let line = CumulativeWeights::from_pairs(eligible.iter().filter_map(|operator| {
            by_operator.get(&operator.id).map(|weight| (operator.id, *weight))
        }));
        if line.is_empty() {
            return None;
        }

        line.pick(self.random.below(line.total()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use chrono::Utc;

    use super::{CumulativeWeights, RandomSource, SeededRandom, WeightedSelector};
    use crate::domain::operator::{Operator, OperatorId, OperatorStatus};
    use crate::domain::source::{OperatorSourceWeight, SourceId};

    /// Replays a fixed sequence of draws.
    struct ScriptedRandom {
        draws: Vec<u64>,
        cursor: AtomicU64,
    }

    impl RandomSource for ScriptedRandom {
        fn below(&self, upper: u64) -> u64 {
            let index = self.cursor.fetch_add(1, Ordering::SeqCst) as usize;
            self.draws[index % self.draws.len()] % upper
        }
    }

    fn operator(id: i64) -> Operator {
        Operator {
            id: OperatorId(id),
            name: format!("op-{id}"),
            status: OperatorStatus::Active,
            max_active_leads: 10,
            created_at: Utc::now(),
        }
    }

    fn weight(operator_id: i64, weight: u32) -> OperatorSourceWeight {
        OperatorSourceWeight {
            operator_id: OperatorId(operator_id),
            source_id: SourceId(1),
            weight,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn cumulative_line_maps_draws_to_intervals() {
        let line = CumulativeWeights::from_pairs([
            (OperatorId(1), 2),
            (OperatorId(2), 0),
            (OperatorId(3), 3),
        ]);

        assert_eq!(line.total(), 5);
        assert_eq!(line.pick(0), Some(OperatorId(1)));
        assert_eq!(line.pick(1), Some(OperatorId(1)));
        assert_eq!(line.pick(2), Some(OperatorId(3)));
        assert_eq!(line.pick(4), Some(OperatorId(3)));
        assert_eq!(line.pick(5), None);
    }

    #[test]
    fn empty_eligible_set_selects_nobody() {
        let selector = WeightedSelector::seeded(7);
        assert_eq!(selector.select(&[], &[weight(1, 5)]), None);
    }

    #[test]
    fn zero_total_weight_selects_nobody() {
        let selector = WeightedSelector::seeded(7);
        let eligible = vec![operator(1), operator(2)];

        assert_eq!(selector.select(&eligible, &[weight(1, 0), weight(2, 0)]), None);
    }

    #[test]
    fn weights_of_ineligible_operators_are_ignored() {
        let selector = WeightedSelector::seeded(11);
        let eligible = vec![operator(2)];
        let weights = vec![weight(1, 1_000_000), weight(2, 1)];

        for _ in 0..100 {
            assert_eq!(selector.select(&eligible, &weights), Some(OperatorId(2)));
        }
    }

    #[test]
    fn zero_weight_operator_is_never_chosen() {
        let selector = WeightedSelector::seeded(3);
        let eligible = vec![operator(1), operator(2)];
        let weights = vec![weight(1, 0), weight(2, 4)];

        for _ in 0..500 {
            assert_eq!(selector.select(&eligible, &weights), Some(OperatorId(2)));
        }
    }

    #[test]
    fn scripted_draws_hit_expected_intervals() {
        let selector = WeightedSelector::new(Arc::new(ScriptedRandom {
            draws: vec![0, 2, 3],
            cursor: AtomicU64::new(0),
        }));
        let eligible = vec![operator(1), operator(2)];
        let weights = vec![weight(1, 3), weight(2, 1)];

        assert_eq!(selector.select(&eligible, &weights), Some(OperatorId(1)));
        assert_eq!(selector.select(&eligible, &weights), Some(OperatorId(1)));
        assert_eq!(selector.select(&eligible, &weights), Some(OperatorId(2)));
    }

    #[test]
    fn same_seed_reproduces_same_sequence() {
        let eligible = vec![operator(1), operator(2), operator(3)];
        let weights = vec![weight(1, 1), weight(2, 1), weight(3, 1)];

        let first = WeightedSelector::seeded(99);
        let second = WeightedSelector::seeded(99);
        let a: Vec<_> = (0..50).map(|_| first.select(&eligible, &weights)).collect();
        let b: Vec<_> = (0..50).map(|_| second.select(&eligible, &weights)).collect();

        assert_eq!(a, b);
    }

    #[test]
    fn large_weights_do_not_allocate_per_unit() {
        let selector = WeightedSelector::seeded(5);
        let eligible = vec![operator(1), operator(2)];
        let weights = vec![weight(1, u32::MAX), weight(2, u32::MAX)];

        assert!(selector.select(&eligible, &weights).is_some());
    }

    #[test]
    fn three_to_one_weights_converge_to_three_to_one_ratio() {
        const TRIALS: u32 = 10_000;
        let selector = WeightedSelector::new(Arc::new(SeededRandom::new(20_240_601)));
        let eligible = vec![operator(1), operator(2)];
        let weights = vec![weight(1, 3), weight(2, 1)];

        let mut counts: HashMap<OperatorId, u32> = HashMap::new();
        for _ in 0..TRIALS {
            let chosen = selector.select(&eligible, &weights).expect("someone is selectable");
            *counts.entry(chosen).or_insert(0) += 1;
        }

        let observed_a = f64::from(counts.get(&OperatorId(1)).copied().unwrap_or(0));
        let observed_b = f64::from(counts.get(&OperatorId(2)).copied().unwrap_or(0));
        let expected_a = f64::from(TRIALS) * 0.75;
        let expected_b = f64::from(TRIALS) * 0.25;
        let chi_squared = (observed_a - expected_a).powi(2) / expected_a
            + (observed_b - expected_b).powi(2) / expected_b;

        // 1 degree of freedom, p = 0.001
        assert!(chi_squared < 10.828, "chi-squared {chi_squared} too large");
    }

    #[test]
    fn equal_weights_are_uniform() {
        const TRIALS: u32 = 9_000;
        let selector = WeightedSelector::seeded(42);
        let eligible = vec![operator(1), operator(2), operator(3)];
        let weights = vec![weight(1, 2), weight(2, 2), weight(3, 2)];

        let mut counts: HashMap<OperatorId, u32> = HashMap::new();
        for _ in 0..TRIALS {
            let chosen = selector.select(&eligible, &weights).expect("someone is selectable");
            *counts.entry(chosen).or_insert(0) += 1;
        }

        let expected = f64::from(TRIALS) / 3.0;
        let chi_squared: f64 = (1..=3)
            .map(|id| {
                let observed = f64::from(counts.get(&OperatorId(id)).copied().unwrap_or(0));
                (observed - expected).powi(2) / expected
            })
            .sum();

        // 2 degrees of freedom, p = 0.001
        assert!(chi_squared < 13.816, "chi-squared {chi_squared} too large");
    }
}
