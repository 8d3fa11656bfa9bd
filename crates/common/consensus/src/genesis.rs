use alloy_primitives::{Address, B256};
use olympus_bls::PubKey;
use olympus_chain_spec::ChainParams;
use serde::{Deserialize, Serialize};
use ssz_types::{BitList, VariableList};
use tracing::info;

use crate::{
    coins::CoinsState,
    constants::PREMINE_COINS,
    governance::{Governance, VotingState},
    shuffle::{determine_next_proposers, shuffle},
    state::State,
    validator::{Validator, ValidatorStatus},
};

/// A validator funded directly at genesis.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ValidatorInitialization {
    pub public_key: PubKey,
    pub payee_address: Address,
}

/// Everything needed to build the genesis state, typically loaded from a
/// YAML network definition.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitializationParameters {
    pub initial_validators: Vec<ValidatorInitialization>,
    pub premine_address: Address,
    pub genesis_time: u64,
}

impl InitializationParameters {
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

impl State {
    /// Build the genesis state: the premine is credited, the initial
    /// validators start active with a full deposit, and the zero seed drives
    /// the first proposer queues and committee assignments.
    pub fn genesis(ip: &InitializationParameters, params: &ChainParams) -> anyhow::Result<Self> {
        let deposit = params.deposit_amount * params.units_per_coin;

        let mut coins_state = CoinsState::default();
        coins_state.credit(ip.premine_address, PREMINE_COINS * params.units_per_coin);

        let validator_registry: Vec<Validator> = ip
            .initial_validators
            .iter()
            .map(|init| Validator {
                pubkey: init.public_key.clone(),
                payee_address: init.payee_address,
                balance: deposit,
                status: ValidatorStatus::Active,
                first_active_epoch: 0,
                last_active_epoch: 0,
            })
            .collect();
        let active_indices: Vec<u64> = (0..validator_registry.len() as u64).collect();

        let proposer_queue =
            determine_next_proposers(B256::ZERO, &active_indices, params.epoch_length);
        let assignments = shuffle(B256::ZERO, active_indices);

        let manager_replacement = BitList::with_capacity(params.initial_managers.len())
            .map_err(|err| anyhow::anyhow!("failed to size manager replacement bitfield: {err:?}"))?;

        info!(
            validators = validator_registry.len(),
            premine_address = %ip.premine_address,
            "built genesis state"
        );

        Ok(State {
            coins_state,
            validator_registry: VariableList::from(validator_registry),
            latest_validator_registry_change: 0,
            randao: B256::ZERO,
            next_randao: B256::ZERO,
            slot: 0,
            epoch_index: 0,
            proposer_queue: VariableList::from(proposer_queue.clone()),
            next_proposer_queue: VariableList::from(proposer_queue),
            previous_epoch_vote_assignments: VariableList::from(assignments.clone()),
            current_epoch_vote_assignments: VariableList::from(assignments),
            latest_block_hashes: VariableList::from(vec![
                B256::ZERO;
                params.latest_block_roots_length as usize
            ]),
            justification_bitfield: 0,
            justified_epoch: 0,
            justified_epoch_hash: B256::ZERO,
            previous_justified_epoch: 0,
            previous_justified_epoch_hash: B256::ZERO,
            finalized_epoch: 0,
            previous_epoch_votes: VariableList::empty(),
            current_epoch_votes: VariableList::empty(),
            current_managers: VariableList::from(params.initial_managers.clone()),
            manager_replacement,
            governance: Governance::default(),
            voting_state: VotingState::Active,
            vote_epoch: 0,
            vote_epoch_start_slot: 0,
            last_paid_slot: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use olympus_chain_spec::TESTNET;

    use super::*;

    #[test]
    fn genesis_premines_and_activates_validators() {
        let params = &*TESTNET;
        let key = olympus_bls::PrivateKey::key_gen(&[7u8; 32]).unwrap();
        let ip = InitializationParameters {
            initial_validators: vec![ValidatorInitialization {
                public_key: key.public_key().unwrap(),
                payee_address: Address::repeat_byte(0x11),
            }],
            premine_address: Address::repeat_byte(0x22),
            genesis_time: 1_600_000_000,
        };
        let state = State::genesis(&ip, params).unwrap();

        assert_eq!(
            state.coins_state.get_balance(&ip.premine_address),
            PREMINE_COINS * params.units_per_coin
        );
        assert_eq!(state.validator_registry.len(), 1);
        assert_eq!(
            state.validator_registry[0].balance,
            params.deposit_amount * params.units_per_coin
        );
        assert_eq!(state.validator_registry[0].status, ValidatorStatus::Active);
        assert_eq!(
            state.proposer_queue.len(),
            params.epoch_length as usize
        );
        assert_eq!(
            state.latest_block_hashes.len(),
            params.latest_block_roots_length as usize
        );
        assert_eq!(
            state.current_managers.len(),
            params.initial_managers.len()
        );
    }

    #[test]
    fn initialization_parameters_parse_from_yaml() {
        let key = olympus_bls::PrivateKey::key_gen(&[9u8; 32]).unwrap();
        let ip = InitializationParameters {
            initial_validators: vec![ValidatorInitialization {
                public_key: key.public_key().unwrap(),
                payee_address: Address::repeat_byte(0x33),
            }],
            premine_address: Address::repeat_byte(0x44),
            genesis_time: 0,
        };
        let yaml = serde_yaml::to_string(&ip).unwrap();
        assert_eq!(InitializationParameters::from_yaml(&yaml).unwrap(), ip);
    }
}
