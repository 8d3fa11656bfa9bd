use std::collections::BTreeSet;

use alloy_primitives::{B256, U256};
use ethereum_hashing::hash_fixed;

/// Draw a number in `0..=max` from the seed, interpreting the seed bytes as
/// a big-endian integer.
pub fn random_in_range(seed: B256, max: u64) -> u64 {
    let modulus = U256::from(max) + U256::from(1u64);
    let draw = U256::from_be_slice(seed.as_slice()) % modulus;
    draw.to::<u64>()
}

fn next_seed(seed: B256) -> B256 {
    B256::from(hash_fixed(seed.as_slice()))
}

/// Fisher-Yates shuffle of the validator indices, driven by repeated hashing
/// of the seed. Pure: the same seed and input always produce the same order.
pub fn shuffle(seed: B256, mut indices: Vec<u64>) -> Vec<u64> {
    let mut seed = seed;
    if indices.is_empty() {
        return indices;
    }
    for position in 0..indices.len() - 1 {
        let remaining = (indices.len() - position - 1) as u64;
        let target = position + random_in_range(seed, remaining) as usize;
        indices.swap(position, target);
        seed = next_seed(seed);
    }
    indices
}

/// Elect one proposer per slot of the next epoch by rejection sampling over
/// the active validator set. Every validator is chosen at most once per pass;
/// once all are taken the pass resets, so small sets still fill every slot.
pub fn determine_next_proposers(seed: B256, active_validators: &[u64], slots: u64) -> Vec<u64> {
    let mut seed = seed;
    let mut proposers = Vec::with_capacity(slots as usize);
    if active_validators.is_empty() {
        return proposers;
    }
    let mut chosen: BTreeSet<usize> = BTreeSet::new();
    for _ in 0..slots {
        if chosen.len() == active_validators.len() {
            chosen.clear();
        }
        let position = loop {
            let draw = random_in_range(seed, active_validators.len() as u64 - 1) as usize;
            seed = next_seed(seed);
            if !chosen.contains(&draw) {
                break draw;
            }
        };
        chosen.insert(position);
        proposers.push(active_validators[position]);
        seed = next_seed(seed);
    }
    proposers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_in_range_is_bounded_and_deterministic() {
        let seed = B256::repeat_byte(0xab);
        for max in [0, 1, 7, 1000] {
            let draw = random_in_range(seed, max);
            assert!(draw <= max);
            assert_eq!(draw, random_in_range(seed, max));
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let indices: Vec<u64> = (0..50).collect();
        let shuffled = shuffle(B256::repeat_byte(0x01), indices.clone());
        assert_ne!(shuffled, indices);
        let mut sorted = shuffled.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, indices);
    }

    #[test]
    fn shuffle_is_pure() {
        let indices: Vec<u64> = (0..20).collect();
        let seed = B256::repeat_byte(0x42);
        assert_eq!(shuffle(seed, indices.clone()), shuffle(seed, indices));
    }

    #[test]
    fn proposers_are_drawn_from_the_active_set() {
        let active = vec![3, 9, 14, 27];
        let proposers = determine_next_proposers(B256::repeat_byte(0x07), &active, 5);
        assert_eq!(proposers.len(), 5);
        for proposer in &proposers {
            assert!(active.contains(proposer));
        }
    }

    #[test]
    fn proposers_cover_every_slot_with_a_small_set() {
        let active = vec![11, 12];
        let proposers = determine_next_proposers(B256::repeat_byte(0x3c), &active, 10);
        assert_eq!(proposers.len(), 10);
    }

    #[test]
    fn no_proposers_without_active_validators() {
        assert!(determine_next_proposers(B256::ZERO, &[], 5).is_empty());
    }
}
