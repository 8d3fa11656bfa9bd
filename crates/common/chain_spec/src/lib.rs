use std::sync::{Arc, LazyLock};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Parameters that are unique for a chain. Transition functions never read
/// these from ambient state: every call takes an explicit `&ChainParams`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChainParams {
    /// Common name of the network.
    pub name: String,
    /// Number of decimal units per coin.
    pub units_per_coin: u64,

    // Epochs and slots
    /// Number of slots in an epoch.
    pub epoch_length: u64,
    /// Seconds per slot.
    pub slot_duration: u64,
    pub max_balance_churn_quotient: u64,
    pub latest_block_roots_length: u64,
    pub min_attestation_inclusion_delay: u64,
    pub base_reward_per_block: u64,

    // Validators
    /// Balance (in coins) below which an active validator is force-exited.
    pub ejection_balance: u64,
    /// Amount of coins locked by a deposit.
    pub deposit_amount: u64,
    pub inactivity_penalty_quotient: u64,
    pub includer_reward_quotient: u64,
    pub whistleblower_reward_quotient: u64,

    // Per-block operation maxima
    pub max_votes_per_block: u64,
    pub max_txs_per_block: u64,
    pub max_deposits_per_block: u64,
    pub max_exits_per_block: u64,
    pub max_vote_slashings_per_block: u64,
    pub max_randao_slashings_per_block: u64,
    pub max_proposer_slashings_per_block: u64,
    pub max_governance_votes_per_block: u64,

    // Governance
    pub governance_budget_quotient: u64,
    pub governance_percentages: Vec<u8>,
    pub initial_managers: Vec<Address>,
    pub voting_period_slots: u64,
    /// Balance (in coins) required to register a governance vote.
    pub min_voting_balance: u64,
    pub community_override_quotient: u64,
}

impl ChainParams {
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

pub static TESTNET: LazyLock<Arc<ChainParams>> = LazyLock::new(|| {
    Arc::new(ChainParams {
        name: String::from("testnet"),
        units_per_coin: 100_000_000,
        epoch_length: 5,
        slot_duration: 30,
        max_balance_churn_quotient: 32,
        latest_block_roots_length: 64,
        min_attestation_inclusion_delay: 1,
        base_reward_per_block: 180_000_000,
        ejection_balance: 95,
        deposit_amount: 100,
        inactivity_penalty_quotient: 17_179_869_184,
        includer_reward_quotient: 8,
        whistleblower_reward_quotient: 2,
        max_votes_per_block: 32,
        max_txs_per_block: 5000,
        max_deposits_per_block: 128,
        max_exits_per_block: 128,
        max_vote_slashings_per_block: 10,
        max_randao_slashings_per_block: 20,
        max_proposer_slashings_per_block: 2,
        max_governance_votes_per_block: 128,
        governance_budget_quotient: 5,
        governance_percentages: vec![30, 10, 20, 20, 20],
        initial_managers: vec![Address::ZERO; 5],
        voting_period_slots: 20_160,
        min_voting_balance: 100,
        community_override_quotient: 3,
    })
});

/// Parameters for in-process development chains and tests: identical economics
/// to the testnet but with a short voting period.
pub static DEVNET: LazyLock<Arc<ChainParams>> = LazyLock::new(|| {
    let mut params = TESTNET.as_ref().clone();
    params.name = String::from("devnet");
    params.voting_period_slots = 20;
    Arc::new(params)
});
