use alloy_primitives::{Address, B256};
use anyhow::{anyhow, bail, ensure};
use olympus_bls::PubKey;
use olympus_chain_spec::ChainParams;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{BitList, VariableList};
use tracing::info;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

use crate::{
    coins::CoinsState,
    constants::{MaxBlockRoots, MaxManagers, MaxSlotsPerEpoch, MaxValidators, MaxVotesPerEpoch},
    governance::{Governance, VotingState},
    validator::{Validator, ValidatorStatus},
    vote::AcceptedVoteInfo,
};

/// The full consensus state. Every transition consumes a state and a
/// [`ChainParams`] and produces the successor state; nothing here reads
/// global configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct State {
    pub coins_state: CoinsState,
    pub validator_registry: VariableList<Validator, MaxValidators>,
    pub latest_validator_registry_change: u64,
    pub randao: B256,
    pub next_randao: B256,
    pub slot: u64,
    pub epoch_index: u64,
    /// One proposer per slot of the current epoch.
    pub proposer_queue: VariableList<u64, MaxSlotsPerEpoch>,
    pub next_proposer_queue: VariableList<u64, MaxSlotsPerEpoch>,
    /// Shuffled committee assignments; sliced per slot by
    /// [`State::get_vote_committee`].
    pub previous_epoch_vote_assignments: VariableList<u64, MaxValidators>,
    pub current_epoch_vote_assignments: VariableList<u64, MaxValidators>,
    /// Ring buffer of recent block hashes, indexed by slot modulo its length.
    pub latest_block_hashes: VariableList<B256, MaxBlockRoots>,
    pub justification_bitfield: u64,
    pub justified_epoch: u64,
    pub justified_epoch_hash: B256,
    pub previous_justified_epoch: u64,
    pub previous_justified_epoch_hash: B256,
    pub finalized_epoch: u64,
    pub previous_epoch_votes: VariableList<AcceptedVoteInfo, MaxVotesPerEpoch>,
    pub current_epoch_votes: VariableList<AcceptedVoteInfo, MaxVotesPerEpoch>,
    pub current_managers: VariableList<Address, MaxManagers>,
    /// Bit `i` marks manager `i` as up for replacement in the open voting
    /// period.
    pub manager_replacement: BitList<MaxManagers>,
    pub governance: Governance,
    pub voting_state: VotingState,
    pub vote_epoch: u64,
    pub vote_epoch_start_slot: u64,
    pub last_paid_slot: u64,
}

impl State {
    pub fn hash(&self) -> B256 {
        self.tree_hash_root()
    }

    /// Balance counted for committee weight: capped at the deposit amount.
    pub fn get_effective_balance(&self, index: u64, params: &ChainParams) -> u64 {
        let deposit = params.deposit_amount * params.units_per_coin;
        self.validator_registry
            .get(index as usize)
            .map(|validator| validator.balance.min(deposit))
            .unwrap_or_default()
    }

    /// Sum of the balances of every active validator.
    pub fn get_active_balance(&self) -> u64 {
        self.validator_registry
            .iter()
            .filter(|validator| validator.is_active())
            .map(|validator| validator.balance)
            .sum()
    }

    /// Sum of every account balance plus every validator balance.
    pub fn get_total_balances(&self) -> u64 {
        let staked: u64 = self
            .validator_registry
            .iter()
            .map(|validator| validator.balance)
            .sum();
        staked + self.coins_state.get_total()
    }

    pub fn get_active_validator_indices(&self) -> Vec<u64> {
        self.validator_registry
            .iter()
            .enumerate()
            .filter(|(_, validator)| validator.is_active())
            .map(|(index, _)| index as u64)
            .collect()
    }

    pub fn get_validator_indices_active_at(&self, epoch: u64) -> Vec<u64> {
        self.validator_registry
            .iter()
            .enumerate()
            .filter(|(_, validator)| validator.is_active_at_epoch(epoch))
            .map(|(index, _)| index as u64)
            .collect()
    }

    pub fn get_validator_index_by_pubkey(&self, pubkey: &PubKey) -> Option<u64> {
        self.validator_registry
            .iter()
            .position(|validator| &validator.pubkey == pubkey)
            .map(|index| index as u64)
    }

    /// Hash of the block at `slot`, read from the ring buffer. Slots older
    /// than the buffer resolve to the zero hash.
    pub fn get_recent_block_hash(&self, slot: u64, params: &ChainParams) -> B256 {
        if self.slot.saturating_sub(slot) >= params.latest_block_roots_length {
            return B256::ZERO;
        }
        let index = (slot % params.latest_block_roots_length) as usize;
        self.latest_block_hashes
            .get(index)
            .copied()
            .unwrap_or_default()
    }

    /// The committee assigned to vote at `slot`: a contiguous slice of the
    /// epoch's shuffled assignments. Only the current and previous epochs are
    /// addressable.
    pub fn get_vote_committee(&self, slot: u64, params: &ChainParams) -> anyhow::Result<Vec<u64>> {
        let vote_epoch = slot.saturating_sub(1) / params.epoch_length;
        let assignments = if vote_epoch == self.epoch_index {
            &self.current_epoch_vote_assignments
        } else if self.epoch_index > 0 && vote_epoch == self.epoch_index - 1 {
            &self.previous_epoch_vote_assignments
        } else {
            bail!(
                "slot {slot} out of range of the committee assignments (current epoch: {})",
                self.epoch_index
            );
        };

        let slot_index = (slot % params.epoch_length) as usize;
        let total = assignments.len();
        let epoch_length = params.epoch_length as usize;
        let min = (slot_index * total) / epoch_length;
        let max = ((slot_index + 1) * total) / epoch_length;
        Ok(assignments[min..max].to_vec())
    }

    pub fn get_proposer_index(&self, slot: u64, params: &ChainParams) -> anyhow::Result<u64> {
        let slot_index = ((slot + params.epoch_length - 1) % params.epoch_length) as usize;
        self.proposer_queue
            .get(slot_index)
            .copied()
            .ok_or_else(|| anyhow!("no proposer scheduled for slot {slot}"))
    }

    pub fn get_proposer_public_key(
        &self,
        slot: u64,
        params: &ChainParams,
    ) -> anyhow::Result<PubKey> {
        let index = self.get_proposer_index(slot, params)?;
        self.validator_registry
            .get(index as usize)
            .map(|validator| validator.pubkey.clone())
            .ok_or_else(|| anyhow!("proposer index {index} out of registry bounds"))
    }

    /// Move a starting validator into the active set.
    pub fn activate_validator(&mut self, index: u64) -> anyhow::Result<()> {
        let validator = self.validator_mut(index)?;
        ensure!(
            validator.status == ValidatorStatus::Starting,
            "can only activate a validator in the starting state"
        );
        validator.status = ValidatorStatus::Active;
        Ok(())
    }

    /// Mark an active validator as waiting in the exit queue.
    pub fn initiate_validator_exit(&mut self, index: u64) -> anyhow::Result<()> {
        let validator = self.validator_mut(index)?;
        ensure!(
            validator.status == ValidatorStatus::Active,
            "can only initiate an exit for an active validator"
        );
        validator.status = ValidatorStatus::ActivePendingExit;
        Ok(())
    }

    /// Remove a validator from the active set. Without a penalty the stake is
    /// released to the payee; with a penalty the stake stays locked and the
    /// slot's proposer collects the whistleblower reward.
    pub fn exit_validator(
        &mut self,
        index: u64,
        status: ValidatorStatus,
        params: &ChainParams,
    ) -> anyhow::Result<()> {
        let validator = self.validator_mut(index)?;
        if validator.status == ValidatorStatus::ExitedWithPenalty {
            return Ok(());
        }
        validator.status = status;

        if status == ValidatorStatus::ExitedWithPenalty {
            let proposer_index = self.get_proposer_index(self.slot, params)?;
            let reward = self.get_effective_balance(proposer_index, params)
                / params.whistleblower_reward_quotient;
            let victim = self.validator_mut(index)?;
            victim.balance = victim.balance.saturating_sub(reward);
            self.validator_mut(proposer_index)?.balance += reward;
            info!(validator = index, whistleblower = proposer_index, reward, "validator slashed");
            return Ok(());
        }

        let validator = self.validator_mut(index)?;
        let payee = validator.payee_address;
        let stake = validator.balance;
        validator.balance = 0;
        self.coins_state.credit(payee, stake);
        Ok(())
    }

    pub fn update_validator_status(
        &mut self,
        index: u64,
        status: ValidatorStatus,
        params: &ChainParams,
    ) -> anyhow::Result<()> {
        match status {
            ValidatorStatus::Active => self.activate_validator(index),
            ValidatorStatus::ActivePendingExit => self.initiate_validator_exit(index),
            ValidatorStatus::ExitedWithPenalty | ValidatorStatus::ExitedWithoutPenalty => {
                self.exit_validator(index, status, params)
            }
            ValidatorStatus::Starting => bail!("cannot transition a validator back to starting"),
        }
    }

    pub(crate) fn validator_mut(&mut self, index: u64) -> anyhow::Result<&mut Validator> {
        let registry_len = self.validator_registry.len();
        self.validator_registry
            .get_mut(index as usize)
            .ok_or_else(|| anyhow!("validator index {index} out of bounds (registry: {registry_len})"))
    }

    pub(crate) fn clear_manager_replacement(&mut self) -> anyhow::Result<()> {
        self.manager_replacement = BitList::with_capacity(self.current_managers.len())
            .map_err(|err| anyhow!("failed to size manager replacement bitfield: {err:?}"))?;
        Ok(())
    }

    pub(crate) fn mark_all_managers_replaceable(&mut self) -> anyhow::Result<()> {
        let mut bits = BitList::with_capacity(self.current_managers.len())
            .map_err(|err| anyhow!("failed to size manager replacement bitfield: {err:?}"))?;
        for index in 0..self.current_managers.len() {
            bits.set(index, true)
                .map_err(|err| anyhow!("failed to set manager replacement bit: {err:?}"))?;
        }
        self.manager_replacement = bits;
        Ok(())
    }
}
