/// Deck draw properties: no repeats within a cycle, full coverage per cycle.

use descent_engine::core::deck::EventDeck;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;

fn pool(size: usize) -> Vec<String> {
    (0..size).map(|i| format!("event_{}", i)).collect()
}

proptest! {
    #[test]
    fn every_event_once_per_cycle(size in 1usize..24, cycles in 1usize..4, seed in any::<u64>()) {
        let mut deck = EventDeck::default();
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..cycles {
            let mut seen = HashMap::new();
            for _ in 0..size {
                let id = deck.draw_from("pool", &mut rng, || pool(size)).unwrap();
                *seen.entry(id).or_insert(0) += 1;
            }
            prop_assert_eq!(seen.len(), size);
            prop_assert!(seen.values().all(|&n| n == 1));
            prop_assert!(deck.is_empty());
        }
    }

    #[test]
    fn counts_never_differ_by_more_than_one(size in 1usize..12, draws in 0usize..60, seed in any::<u64>()) {
        let mut deck = EventDeck::default();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut counts: HashMap<String, usize> = pool(size).into_iter().map(|id| (id, 0)).collect();
        for _ in 0..draws {
            let id = deck.draw_from("pool", &mut rng, || pool(size)).unwrap();
            *counts.get_mut(&id).unwrap() += 1;
        }
        let max = counts.values().max().copied().unwrap_or(0);
        let min = counts.values().min().copied().unwrap_or(0);
        prop_assert!(max - min <= 1);
    }

    #[test]
    fn switching_pools_never_leaks_old_ids(first in 2usize..10, taken in 1usize..10, seed in any::<u64>()) {
        let taken = taken.min(first - 1);
        let mut deck = EventDeck::default();
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..taken {
            deck.draw_from("old", &mut rng, || pool(first));
        }
        let fresh = || vec!["new_a".to_string(), "new_b".to_string()];
        let id = deck.draw_from("new", &mut rng, fresh).unwrap();
        prop_assert!(id.starts_with("new_"));
        prop_assert!(deck.remaining().all(|id| id.starts_with("new_")));
    }
}

#[test]
fn same_seed_same_order() {
    let order = |seed| {
        let mut deck = EventDeck::default();
        let mut rng = StdRng::seed_from_u64(seed);
        (0..10)
            .map(|_| deck.draw_from("pool", &mut rng, || pool(10)).unwrap())
            .collect::<Vec<_>>()
    };
    assert_eq!(order(99), order(99));
}
