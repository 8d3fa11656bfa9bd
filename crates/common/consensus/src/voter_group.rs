use std::collections::BTreeSet;

/// A set of validator indices accumulated while tallying epoch votes,
/// together with the total balance backing it.
#[derive(Debug, Default, Clone)]
pub struct VoterGroup {
    voters: BTreeSet<u64>,
    total_balance: u64,
}

impl VoterGroup {
    pub fn add(&mut self, validator: u64, balance: u64) {
        if self.voters.insert(validator) {
            self.total_balance += balance;
        }
    }

    pub fn contains(&self, validator: u64) -> bool {
        self.voters.contains(&validator)
    }

    pub fn total_balance(&self) -> u64 {
        self.total_balance
    }

    pub fn len(&self) -> usize {
        self.voters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.voters.iter().copied()
    }
}
