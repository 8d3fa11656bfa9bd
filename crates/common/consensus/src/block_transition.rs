use alloy_primitives::{Address, B256};
use anyhow::{bail, ensure};
use ethereum_hashing::hash_fixed;
use olympus_bls::{PubKey, traits::Verifiable};
use olympus_chain_spec::ChainParams;
use tracing::debug;

use crate::{
    block::Block,
    constants::ACTIVATION_DELAY_EPOCHS,
    deposit::Deposit,
    exit::Exit,
    slashing::{ProposerSlashing, RandaoSlashing, VoteSlashing},
    state::State,
    transfer::Transfer,
    validator::{Validator, ValidatorStatus},
    vote::{AcceptedVoteInfo, MultiValidatorVote, ParticipationBitfield},
};

/// The message a proposer's RANDAO key signs for a slot: the hash of the
/// slot number's decimal string.
pub fn randao_signature_message(slot: u64) -> B256 {
    B256::from(hash_fixed(slot.to_string().as_bytes()))
}

fn participating_validators(
    committee: &[u64],
    bitfield: &ParticipationBitfield,
) -> anyhow::Result<Vec<u64>> {
    ensure!(
        bitfield.len() == committee.len(),
        "participation bitfield length {} does not match committee size {}",
        bitfield.len(),
        committee.len()
    );
    let mut participants = Vec::new();
    for (position, validator) in committee.iter().enumerate() {
        let participating = bitfield
            .get(position)
            .map_err(|err| anyhow::anyhow!("bitfield read out of bounds: {err:?}"))?;
        if participating {
            participants.push(*validator);
        }
    }
    Ok(participants)
}

impl State {
    /// Verify both proposer signatures on a block: the block signature over
    /// the header hash and the RANDAO reveal for the block's slot.
    pub fn check_block_signature(&self, block: &Block, params: &ChainParams) -> anyhow::Result<()> {
        let proposer = self.get_proposer_public_key(block.header.slot, params)?;
        ensure!(
            block
                .signature
                .verify(&proposer, block.header.hash().as_slice())?,
            "block signature does not validate"
        );
        ensure!(
            block.randao_signature.verify(
                &proposer,
                randao_signature_message(block.header.slot).as_slice()
            )?,
            "block RANDAO signature does not validate"
        );
        Ok(())
    }

    /// Apply a single transfer: debit the sender for the amount and fee,
    /// credit the recipient, and pay the fee to the block's fee address.
    pub fn apply_transfer(
        &mut self,
        transfer: &Transfer,
        fee_address: Address,
        params: &ChainParams,
    ) -> anyhow::Result<()> {
        let from = transfer.from_address();
        let Some(spend) = transfer.amount.checked_add(transfer.fee) else {
            bail!("transfer amount plus fee overflows");
        };
        ensure!(
            self.coins_state.get_balance(&from) >= spend,
            "transfer spends {spend} but account only has {}",
            self.coins_state.get_balance(&from)
        );
        ensure!(
            self.coins_state.get_nonce(&from) < transfer.nonce,
            "transfer nonce {} is stale (account is at {})",
            transfer.nonce,
            self.coins_state.get_nonce(&from)
        );
        transfer.verify_signature()?;

        self.coins_state.debit(from, spend);
        self.coins_state.credit(transfer.to, transfer.amount);
        self.coins_state.credit(fee_address, transfer.fee);
        self.coins_state.set_nonce(from, transfer.nonce);

        // A sender that drops below the voting threshold loses its pending
        // replace vote.
        let minimum = params.min_voting_balance * params.units_per_coin;
        if self.coins_state.get_balance(&from) < minimum {
            self.governance.replace_votes.remove(&from);
        }
        Ok(())
    }

    /// Validate a deposit: the funding account must cover the deposit amount
    /// and sign the deposit data, the new validator key must not already be
    /// registered, and it must prove possession of itself.
    pub fn is_deposit_valid(&self, deposit: &Deposit, params: &ChainParams) -> anyhow::Result<()> {
        let from = deposit.public_key.to_address();
        let amount = params.deposit_amount * params.units_per_coin;
        ensure!(
            self.coins_state.get_balance(&from) >= amount,
            "deposit needs {amount} but account only has {}",
            self.coins_state.get_balance(&from)
        );
        ensure!(
            deposit
                .signature
                .verify(&deposit.public_key, deposit.signature_message().as_slice())?,
            "deposit signature does not validate"
        );
        ensure!(
            self.get_validator_index_by_pubkey(&deposit.data.public_key)
                .is_none(),
            "validator public key is already registered"
        );
        let pubkey_hash = hash_fixed(deposit.data.public_key.to_bytes());
        ensure!(
            deposit
                .data
                .proof_of_possession
                .verify(&deposit.data.public_key, &pubkey_hash)?,
            "deposit proof of possession does not validate"
        );
        Ok(())
    }

    /// Validate and apply a deposit: lock the stake and register the new
    /// validator, eligible for activation after the activation delay.
    pub fn apply_deposit(&mut self, deposit: &Deposit, params: &ChainParams) -> anyhow::Result<()> {
        self.is_deposit_valid(deposit, params)?;
        let amount = params.deposit_amount * params.units_per_coin;
        self.coins_state
            .debit(deposit.public_key.to_address(), amount);
        self.validator_registry
            .push(Validator {
                pubkey: deposit.data.public_key.clone(),
                payee_address: deposit.data.withdrawal_address,
                balance: amount,
                status: ValidatorStatus::Starting,
                first_active_epoch: self.epoch_index + ACTIVATION_DELAY_EPOCHS,
                last_active_epoch: 0,
            })
            .map_err(|err| anyhow::anyhow!("validator registry is full: {err:?}"))?;
        debug!(validator = self.validator_registry.len() - 1, "deposit registered");
        Ok(())
    }

    /// Validate an exit: the withdraw key signs the exit message and must own
    /// the payee address of the named active validator.
    pub fn is_exit_valid(&self, exit: &Exit) -> anyhow::Result<()> {
        ensure!(
            exit.signature
                .verify(&exit.withdraw_public_key, &exit.signature_message())?,
            "exit signature does not validate"
        );
        let Some(index) = self.get_validator_index_by_pubkey(&exit.validator_public_key) else {
            bail!("exit names a validator that is not registered");
        };
        let validator = &self.validator_registry[index as usize];
        ensure!(validator.is_active(), "validator is not active");
        ensure!(
            validator.payee_address == exit.withdraw_public_key.to_address(),
            "withdraw key does not own the validator's payee address"
        );
        Ok(())
    }

    /// Validate and apply a voluntary exit: the validator keeps voting for
    /// two more epochs and then leaves the active set.
    pub fn apply_exit(&mut self, exit: &Exit) -> anyhow::Result<()> {
        self.is_exit_valid(exit)?;
        let Some(index) = self.get_validator_index_by_pubkey(&exit.validator_public_key) else {
            bail!("exit names a validator that is not registered");
        };
        let last_active_epoch = self.epoch_index + 2;
        let validator = self.validator_mut(index)?;
        validator.status = ValidatorStatus::ActivePendingExit;
        validator.last_active_epoch = last_active_epoch;
        Ok(())
    }

    /// Validate an aggregate vote: the source must match a justified
    /// checkpoint the state knows, and the aggregate signature must verify
    /// against the participating committee keys.
    pub fn is_vote_valid(
        &self,
        vote: &MultiValidatorVote,
        params: &ChainParams,
    ) -> anyhow::Result<()> {
        ensure!(vote.data.slot > 0, "votes for slot 0 are not allowed");

        if vote.data.to_epoch == self.epoch_index {
            ensure!(
                vote.data.from_epoch == self.justified_epoch
                    && vote.data.from_hash == self.justified_epoch_hash,
                "vote source does not match the justified checkpoint"
            );
        } else if self.epoch_index > 0 && vote.data.to_epoch == self.epoch_index - 1 {
            ensure!(
                vote.data.from_epoch == self.previous_justified_epoch
                    && vote.data.from_hash == self.previous_justified_epoch_hash,
                "vote source does not match the previous justified checkpoint"
            );
        } else {
            bail!(
                "vote target epoch {} is not current or previous (current: {})",
                vote.data.to_epoch,
                self.epoch_index
            );
        }

        let committee = self.get_vote_committee(vote.data.slot, params)?;
        let participants = participating_validators(&committee, &vote.participation_bitfield)?;
        ensure!(!participants.is_empty(), "vote has no participants");
        let pubkeys: Vec<&PubKey> = participants
            .iter()
            .map(|index| &self.validator_registry[*index as usize].pubkey)
            .collect();
        ensure!(
            vote.signature
                .fast_aggregate_verify(&pubkeys, vote.data.hash().as_slice())?,
            "aggregate vote signature does not validate"
        );
        Ok(())
    }

    /// Validate and accept a vote, crediting its inclusion to `proposer`.
    pub fn process_vote(
        &mut self,
        vote: &MultiValidatorVote,
        proposer: u64,
        params: &ChainParams,
    ) -> anyhow::Result<()> {
        ensure!(vote.data.slot > 0, "votes for slot 0 are not allowed");
        ensure!(
            vote.data.slot + params.min_attestation_inclusion_delay <= self.slot,
            "vote from slot {} included too soon at slot {}",
            vote.data.slot,
            self.slot
        );
        ensure!(
            vote.data.slot + params.epoch_length > self.slot,
            "vote from slot {} included too late at slot {}",
            vote.data.slot,
            self.slot
        );
        ensure!(
            (vote.data.slot - 1) / params.epoch_length == vote.data.to_epoch,
            "vote slot {} does not belong to target epoch {}",
            vote.data.slot,
            vote.data.to_epoch
        );
        self.is_vote_valid(vote, params)?;

        let accepted = AcceptedVoteInfo {
            data: vote.data.clone(),
            participation_bitfield: vote.participation_bitfield.clone(),
            proposer,
            inclusion_delay: self.slot - vote.data.slot,
        };
        let target = if vote.data.to_epoch == self.epoch_index {
            &mut self.current_epoch_votes
        } else {
            &mut self.previous_epoch_votes
        };
        target
            .push(accepted)
            .map_err(|err| anyhow::anyhow!("epoch vote list is full: {err:?}"))?;
        Ok(())
    }

    /// Validate a proposer slashing: two distinct headers for the same slot,
    /// both signed by the accused key. Returns the validator's index.
    pub fn is_proposer_slashing_valid(&self, slashing: &ProposerSlashing) -> anyhow::Result<u64> {
        ensure!(
            slashing.block_header_1 != slashing.block_header_2,
            "proposer slashing headers are identical"
        );
        ensure!(
            slashing.block_header_1.slot == slashing.block_header_2.slot,
            "proposer slashing headers are for different slots"
        );
        ensure!(
            slashing.signature_1.verify(
                &slashing.validator_public_key,
                slashing.block_header_1.hash().as_slice()
            )?,
            "first header signature does not validate"
        );
        ensure!(
            slashing.signature_2.verify(
                &slashing.validator_public_key,
                slashing.block_header_2.hash().as_slice()
            )?,
            "second header signature does not validate"
        );
        self.get_validator_index_by_pubkey(&slashing.validator_public_key)
            .ok_or_else(|| anyhow::anyhow!("slashed proposer is not in the validator registry"))
    }

    pub fn apply_proposer_slashing(
        &mut self,
        slashing: &ProposerSlashing,
        params: &ChainParams,
    ) -> anyhow::Result<()> {
        let index = self.is_proposer_slashing_valid(slashing)?;
        self.exit_validator(index, ValidatorStatus::ExitedWithPenalty, params)
    }

    /// Validate a vote slashing: the two votes must conflict under the
    /// double-vote or surround-vote rule, both aggregates must verify, and at
    /// least one validator must have participated in both. Returns the
    /// validators to slash.
    pub fn is_vote_slashing_valid(
        &self,
        slashing: &VoteSlashing,
        params: &ChainParams,
    ) -> anyhow::Result<Vec<u64>> {
        ensure!(
            slashing.vote_1.data != slashing.vote_2.data,
            "vote slashing votes are identical"
        );
        ensure!(
            slashing.vote_1.data.is_double_vote(&slashing.vote_2.data)
                || slashing.vote_1.data.is_surround_vote(&slashing.vote_2.data),
            "votes do not conflict"
        );

        let mut common = Vec::new();
        let mut participant_sets = Vec::with_capacity(2);
        for vote in [&slashing.vote_1, &slashing.vote_2] {
            let committee = self.get_vote_committee(vote.data.slot, params)?;
            let participants = participating_validators(&committee, &vote.participation_bitfield)?;
            let pubkeys: Vec<&PubKey> = participants
                .iter()
                .map(|index| &self.validator_registry[*index as usize].pubkey)
                .collect();
            ensure!(
                vote.signature
                    .fast_aggregate_verify(&pubkeys, vote.data.hash().as_slice())?,
                "conflicting vote signature does not validate"
            );
            participant_sets.push(participants);
        }
        for validator in &participant_sets[0] {
            if participant_sets[1].contains(validator) {
                common.push(*validator);
            }
        }
        ensure!(
            !common.is_empty(),
            "conflicting votes do not share any validators"
        );
        Ok(common)
    }

    pub fn apply_vote_slashing(
        &mut self,
        slashing: &VoteSlashing,
        params: &ChainParams,
    ) -> anyhow::Result<()> {
        for index in self.is_vote_slashing_valid(slashing, params)? {
            self.exit_validator(index, ValidatorStatus::ExitedWithPenalty, params)?;
        }
        Ok(())
    }

    /// Validate a RANDAO slashing: the reveal must be for a slot earlier than
    /// the chain's current slot, signed by the accused key. Returns the
    /// validator's index.
    pub fn is_randao_slashing_valid(&self, slashing: &RandaoSlashing) -> anyhow::Result<u64> {
        ensure!(
            slashing.slot < self.slot,
            "RANDAO for slot {} is already assumed to be revealed",
            slashing.slot
        );
        ensure!(
            slashing.randao_reveal.verify(
                &slashing.validator_public_key,
                randao_signature_message(slashing.slot).as_slice()
            )?,
            "RANDAO reveal does not validate"
        );
        self.get_validator_index_by_pubkey(&slashing.validator_public_key)
            .ok_or_else(|| anyhow::anyhow!("revealed validator is not in the validator registry"))
    }

    pub fn apply_randao_slashing(
        &mut self,
        slashing: &RandaoSlashing,
        params: &ChainParams,
    ) -> anyhow::Result<()> {
        let index = self.is_randao_slashing_valid(slashing)?;
        self.exit_validator(index, ValidatorStatus::ExitedWithPenalty, params)
    }

    /// Apply a full block. The block either applies completely or leaves the
    /// state untouched: operations run against a scratch copy that only
    /// replaces the state once every one of them succeeds.
    pub fn process_block(&mut self, block: &Block, params: &ChainParams) -> anyhow::Result<()> {
        let mut scratch = self.clone();
        scratch.apply_block(block, params)?;
        *self = scratch;
        Ok(())
    }

    fn apply_block(&mut self, block: &Block, params: &ChainParams) -> anyhow::Result<()> {
        ensure!(
            block.header.slot == self.slot,
            "block is for slot {} but state is at slot {}",
            block.header.slot,
            self.slot
        );
        self.check_block_signature(block, params)?;

        let roots = [
            ("transaction", block.tx_merkle_root(), block.header.tx_merkle_root),
            ("vote", block.vote_merkle_root(), block.header.vote_merkle_root),
            ("deposit", block.deposit_merkle_root(), block.header.deposit_merkle_root),
            ("exit", block.exit_merkle_root(), block.header.exit_merkle_root),
            (
                "vote slashing",
                block.vote_slashing_merkle_root(),
                block.header.vote_slashing_merkle_root,
            ),
            (
                "RANDAO slashing",
                block.randao_slashing_merkle_root(),
                block.header.randao_slashing_merkle_root,
            ),
            (
                "proposer slashing",
                block.proposer_slashing_merkle_root(),
                block.header.proposer_slashing_merkle_root,
            ),
            (
                "governance vote",
                block.governance_vote_merkle_root(),
                block.header.governance_vote_merkle_root,
            ),
        ];
        for (name, expected, claimed) in roots {
            ensure!(
                expected == claimed,
                "{name} merkle root mismatch (expected: {expected}, block: {claimed})"
            );
        }

        let limits = [
            ("votes", block.votes.len(), params.max_votes_per_block),
            ("transactions", block.txs.len(), params.max_txs_per_block),
            ("deposits", block.deposits.len(), params.max_deposits_per_block),
            ("exits", block.exits.len(), params.max_exits_per_block),
            (
                "vote slashings",
                block.vote_slashings.len(),
                params.max_vote_slashings_per_block,
            ),
            (
                "RANDAO slashings",
                block.randao_slashings.len(),
                params.max_randao_slashings_per_block,
            ),
            (
                "proposer slashings",
                block.proposer_slashings.len(),
                params.max_proposer_slashings_per_block,
            ),
            (
                "governance votes",
                block.governance_votes.len(),
                params.max_governance_votes_per_block,
            ),
        ];
        for (name, count, max) in limits {
            ensure!(
                count as u64 <= max,
                "block exceeds the {name} limit ({count} > {max})"
            );
        }

        for deposit in block.deposits.iter() {
            self.apply_deposit(deposit, params)?;
        }
        for transfer in block.txs.iter() {
            self.apply_transfer(transfer, block.header.fee_address, params)?;
        }
        for governance_vote in block.governance_votes.iter() {
            self.process_governance_vote(governance_vote, params)?;
        }
        let proposer = self.get_proposer_index(block.header.slot, params)?;
        for vote in block.votes.iter() {
            self.process_vote(vote, proposer, params)?;
        }
        for exit in block.exits.iter() {
            self.apply_exit(exit)?;
        }
        for slashing in block.randao_slashings.iter() {
            self.apply_randao_slashing(slashing, params)?;
        }
        for slashing in block.vote_slashings.iter() {
            self.apply_vote_slashing(slashing, params)?;
        }
        for slashing in block.proposer_slashings.iter() {
            self.apply_proposer_slashing(slashing, params)?;
        }

        for (byte, reveal) in self
            .next_randao
            .iter_mut()
            .zip(block.randao_signature.to_bytes().iter())
        {
            *byte ^= reveal;
        }

        debug!(
            slot = block.header.slot,
            votes = block.votes.len(),
            txs = block.txs.len(),
            "processed block"
        );
        Ok(())
    }
}
