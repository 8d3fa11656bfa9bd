use std::collections::BTreeMap;

use alloy_primitives::B256;
use olympus_bls::multisig::address_hashes_to_multisig_address;
use olympus_chain_spec::ChainParams;
use ssz_types::VariableList;
use tracing::{debug, info};

use crate::{
    constants::{MAX_FINALITY_DELAY_EPOCHS, NUM_REWARD_CATEGORIES, PENALTY_GRACE_EPOCHS},
    governance::VotingState,
    receipt::{EpochReceipt, ReceiptKind},
    shuffle::{determine_next_proposers, shuffle},
    state::State,
    validator::ValidatorStatus,
    vote::AcceptedVoteInfo,
    voter_group::VoterGroup,
};

impl State {
    /// Per-validator reward unit: proportional to effective balance, split
    /// across the reward categories.
    fn base_reward(&self, index: u64, total_balance: u64, params: &ChainParams) -> u64 {
        if total_balance == 0 {
            return 0;
        }
        let effective = self.get_effective_balance(index, params) as u128;
        let reward = effective
            * params.base_reward_per_block as u128
            * params.epoch_length as u128
            / total_balance as u128
            / NUM_REWARD_CATEGORIES as u128;
        reward as u64
    }

    fn add_committee_to_group(
        &self,
        group: &mut VoterGroup,
        vote: &AcceptedVoteInfo,
        committee: &[u64],
    ) -> anyhow::Result<()> {
        for (position, validator) in committee.iter().enumerate() {
            let participating = vote
                .participation_bitfield
                .get(position)
                .map_err(|err| anyhow::anyhow!("bitfield read out of bounds: {err:?}"))?;
            if participating {
                let balance = self
                    .validator_registry
                    .get(*validator as usize)
                    .map(|validator| validator.balance)
                    .unwrap_or_default();
                group.add(*validator, balance);
            }
        }
        Ok(())
    }

    /// Tally the governance state machine: open a voting period once replace
    /// votes pass the community override threshold, resolve one whose period
    /// has elapsed, and run the monthly treasury payout when due.
    pub fn check_for_governance_transitions(&mut self, params: &ChainParams) -> anyhow::Result<()> {
        match self.voting_state {
            VotingState::Active => {
                let total_balance = self.get_total_balances();
                let voting_balance: u64 = self
                    .governance
                    .replace_votes
                    .keys()
                    .map(|account| self.coins_state.get_balance(account))
                    .sum();
                if voting_balance * params.community_override_quotient >= total_balance {
                    self.next_vote_epoch(VotingState::Voting);
                    self.mark_all_managers_replaceable()?;
                    info!(
                        vote_epoch = self.vote_epoch,
                        "community vote threshold reached, voting period opened"
                    );
                }
            }
            VotingState::Voting => {
                if self.vote_epoch_start_slot + params.voting_period_slots <= self.slot {
                    self.resolve_voting_period()?;
                }
            }
        }
        self.process_treasury_payout(params);
        Ok(())
    }

    /// End an elapsed voting period: pick the candidate set backed by the
    /// most balance and install it at the replaceable manager positions.
    /// Ties resolve to the smallest candidate hash.
    fn resolve_voting_period(&mut self) -> anyhow::Result<()> {
        let mut tally: BTreeMap<B256, u64> = BTreeMap::new();
        for (account, candidate_hash) in &self.governance.replace_votes {
            *tally.entry(*candidate_hash).or_default() +=
                self.coins_state.get_balance(account);
        }

        let mut best: Option<(B256, u64)> = None;
        for (candidate_hash, balance) in &tally {
            let Some(vote_data) = self.governance.community_votes.get(candidate_hash) else {
                continue;
            };
            if vote_data.replacement_candidates.is_empty() {
                continue;
            }
            if best.is_none_or(|(_, best_balance)| *balance > best_balance) {
                best = Some((*candidate_hash, *balance));
            }
        }

        if let Some((winner, balance)) = best {
            let candidates = self.governance.community_votes[&winner]
                .replacement_candidates
                .clone();
            let mut managers = self.current_managers.to_vec();
            for (position, manager) in managers.iter_mut().enumerate() {
                let replaceable = self
                    .manager_replacement
                    .get(position)
                    .map_err(|err| anyhow::anyhow!("bitfield read out of bounds: {err:?}"))?;
                if replaceable && position < candidates.len() {
                    *manager = candidates[position];
                }
            }
            self.current_managers = VariableList::from(managers);
            info!(balance, "voting period resolved, managers replaced");
        }

        self.clear_manager_replacement()?;
        self.next_vote_epoch(VotingState::Active);
        Ok(())
    }

    /// Credit the monthly governance budget: one tenth to the joint manager
    /// multisig account, the rest split by the configured percentages.
    fn process_treasury_payout(&mut self, params: &ChainParams) {
        let epochs_per_month = 30 * 24 * 60 * 60 / params.slot_duration / params.epoch_length;
        if self.last_paid_slot + epochs_per_month * params.epoch_length > self.slot {
            return;
        }

        let total_block_reward = params.base_reward_per_block * 60 * 60 * 24 * 30 / params.slot_duration;
        let per_group = total_block_reward / params.governance_budget_quotient / 2;

        let joint_account = address_hashes_to_multisig_address(
            &self.current_managers,
            self.current_managers.len() as u64,
        );
        self.coins_state.credit(joint_account, per_group);

        if self.current_managers.len() != params.governance_percentages.len() {
            return;
        }
        for (manager, percent) in self
            .current_managers
            .to_vec()
            .into_iter()
            .zip(params.governance_percentages.iter())
        {
            self.coins_state
                .credit(manager, per_group * *percent as u64 / 100);
        }
        self.last_paid_slot = self.slot;
        debug!(per_group, "treasury payout credited");
    }

    /// Activate eligible starting validators and release eligible exiting
    /// ones, each side capped by half the balance churn budget. Registry
    /// order decides who gets through before the cap.
    pub(crate) fn update_validator_registry(&mut self, params: &ChainParams) -> anyhow::Result<()> {
        let total_balance = self.get_active_balance();
        let max_balance_churn = total_balance / (params.max_balance_churn_quotient * 2);
        let deposit = params.deposit_amount * params.units_per_coin;

        let mut balance_churn = 0;
        for index in 0..self.validator_registry.len() as u64 {
            let validator = &self.validator_registry[index as usize];
            if validator.status == ValidatorStatus::Starting
                && validator.balance == deposit
                && validator.first_active_epoch <= self.epoch_index
            {
                balance_churn += self.get_effective_balance(index, params);
                if balance_churn > max_balance_churn {
                    break;
                }
                self.update_validator_status(index, ValidatorStatus::Active, params)?;
            }
        }

        let mut balance_churn = 0;
        for index in 0..self.validator_registry.len() as u64 {
            let validator = &self.validator_registry[index as usize];
            if validator.status == ValidatorStatus::ActivePendingExit
                && validator.last_active_epoch <= self.epoch_index
            {
                balance_churn += self.get_effective_balance(index, params);
                if balance_churn > max_balance_churn {
                    break;
                }
                self.update_validator_status(index, ValidatorStatus::ExitedWithoutPenalty, params)?;
            }
        }

        Ok(())
    }

    /// Run the epoch transition at an epoch boundary: governance tally, vote
    /// accounting, justification and finalization, rewards and penalties,
    /// ejections, registry churn, and the rotation of the proposer queues,
    /// committee assignments, and RANDAO.
    pub fn process_epoch_transition(
        &mut self,
        params: &ChainParams,
    ) -> anyhow::Result<Vec<EpochReceipt>> {
        self.check_for_governance_transitions(params)?;

        let total_balance = self.get_active_balance();

        // Voters with any previous-epoch vote, those whose target matched the
        // epoch boundary, and those whose beacon hash matched the chain.
        let mut previous_voters = VoterGroup::default();
        let mut previous_voters_matching_target = VoterGroup::default();
        let mut previous_voters_matching_beacon = VoterGroup::default();
        let mut current_voters_matching_target = VoterGroup::default();

        let previous_epoch_boundary_hash = if self.slot > 2 * params.epoch_length {
            self.get_recent_block_hash(self.slot - 2 * params.epoch_length - 1, params)
        } else {
            B256::ZERO
        };
        let epoch_boundary_hash = if self.slot > params.epoch_length {
            self.get_recent_block_hash(self.slot - params.epoch_length - 1, params)
        } else {
            B256::ZERO
        };

        // Maps every previous-epoch committee member to the vote that covered
        // its slot, for inclusion rewards.
        let mut previous_voter_votes: BTreeMap<u64, AcceptedVoteInfo> = BTreeMap::new();

        let previous_epoch_votes = self.previous_epoch_votes.to_vec();
        for vote in &previous_epoch_votes {
            let committee = self.get_vote_committee(vote.data.slot, params)?;
            self.add_committee_to_group(&mut previous_voters, vote, &committee)?;
            if self.get_recent_block_hash(vote.data.slot - 1, params) == vote.data.beacon_block_hash
            {
                self.add_committee_to_group(
                    &mut previous_voters_matching_beacon,
                    vote,
                    &committee,
                )?;
            }
            if previous_epoch_boundary_hash == vote.data.to_hash {
                self.add_committee_to_group(
                    &mut previous_voters_matching_target,
                    vote,
                    &committee,
                )?;
            }
            for validator in committee {
                previous_voter_votes.insert(validator, vote.clone());
            }
        }

        let current_epoch_votes = self.current_epoch_votes.to_vec();
        for vote in &current_epoch_votes {
            let committee = self.get_vote_committee(vote.data.slot, params)?;
            if epoch_boundary_hash == vote.data.from_hash {
                self.add_committee_to_group(&mut current_voters_matching_target, vote, &committee)?;
            }
        }

        self.previous_justified_epoch = self.justified_epoch;
        self.previous_justified_epoch_hash = self.justified_epoch_hash;
        self.justification_bitfield <<= 1;

        if total_balance > 0 {
            // 2/3 of the stake voted for the previous epoch's boundary.
            if 3 * previous_voters_matching_target.total_balance() >= 2 * total_balance
                && self.epoch_index > 0
            {
                self.justification_bitfield |= 1 << 1;
                self.justified_epoch = self.epoch_index - 1;
                self.justified_epoch_hash =
                    self.get_recent_block_hash(self.justified_epoch * params.epoch_length, params);
                info!(epoch = self.justified_epoch, "justified epoch");
            }

            if 3 * current_voters_matching_target.total_balance() >= 2 * total_balance {
                self.justification_bitfield |= 1 << 0;
                self.justified_epoch = self.epoch_index;
                self.justified_epoch_hash =
                    self.get_recent_block_hash(self.justified_epoch * params.epoch_length, params);
                info!(epoch = self.justified_epoch, "justified epoch");
            }
        }

        // Finalize once two consecutive justified epochs line up.
        if (self.justification_bitfield >> 1) % 4 == 3
            && self.epoch_index >= 2
            && self.previous_justified_epoch == self.epoch_index - 2
        {
            self.finalized_epoch = self.previous_justified_epoch;
            info!(epoch = self.finalized_epoch, "finalized epoch");
        }
        if (self.justification_bitfield % 8 == 7
            && self.epoch_index >= 1
            && self.justified_epoch == self.epoch_index - 1)
            || (self.justification_bitfield % 4 == 3 && self.justified_epoch == self.epoch_index)
        {
            self.finalized_epoch = self.previous_justified_epoch;
            self.justified_epoch = self.epoch_index;
            info!(epoch = self.finalized_epoch, "finalized epoch");
        }

        let mut receipts = Vec::new();

        if self.slot >= 2 * params.epoch_length {
            self.apply_epoch_rewards(
                &previous_voters,
                &previous_voters_matching_target,
                &previous_voters_matching_beacon,
                &previous_voter_votes,
                total_balance,
                &mut receipts,
                params,
            )?;
        }

        // Eject validators whose balance fell below the floor.
        let ejection_balance = params.ejection_balance * params.units_per_coin;
        for index in 0..self.validator_registry.len() as u64 {
            let validator = &self.validator_registry[index as usize];
            if validator.is_active() && validator.balance < ejection_balance {
                self.update_validator_status(index, ValidatorStatus::ExitedWithoutPenalty, params)?;
                info!(validator = index, "validator ejected");
            }
        }

        self.epoch_index = self.slot / params.epoch_length;

        if self.finalized_epoch > self.latest_validator_registry_change {
            self.update_validator_registry(params)?;
            self.latest_validator_registry_change = self.epoch_index;
        }

        self.proposer_queue = self.next_proposer_queue.clone();
        let active_validators = self.get_validator_indices_active_at(self.epoch_index + 1);
        self.next_proposer_queue = VariableList::from(determine_next_proposers(
            self.randao,
            &active_validators,
            params.epoch_length,
        ));

        self.previous_epoch_vote_assignments = self.current_epoch_vote_assignments.clone();
        self.current_epoch_vote_assignments =
            VariableList::from(shuffle(self.randao, active_validators));

        self.randao = self.next_randao;

        self.previous_epoch_votes = self.current_epoch_votes.clone();
        self.current_epoch_votes = VariableList::empty();

        debug!(
            epoch = self.epoch_index,
            receipts = receipts.len(),
            "processed epoch transition"
        );
        Ok(receipts)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_epoch_rewards(
        &mut self,
        previous_voters: &VoterGroup,
        previous_voters_matching_target: &VoterGroup,
        previous_voters_matching_beacon: &VoterGroup,
        previous_voter_votes: &BTreeMap<u64, AcceptedVoteInfo>,
        total_balance: u64,
        receipts: &mut Vec<EpochReceipt>,
        params: &ChainParams,
    ) -> anyhow::Result<()> {
        for index in 0..self.validator_registry.len() as u64 {
            if !self.validator_registry[index as usize].is_active() {
                continue;
            }
            let amount = self.base_reward(index, total_balance, params);

            if previous_voters.contains(index) {
                self.reward(receipts, index, amount, ReceiptKind::RewardMatchedFromEpoch);
            } else {
                self.penalize(receipts, index, amount, ReceiptKind::PenaltyMissingFromEpoch);
            }
            if previous_voters_matching_target.contains(index) {
                self.reward(receipts, index, amount, ReceiptKind::RewardMatchedToEpoch);
            } else {
                self.penalize(receipts, index, amount, ReceiptKind::PenaltyMissingToEpoch);
            }
            if previous_voters_matching_beacon.contains(index) {
                self.reward(receipts, index, amount, ReceiptKind::RewardMatchedBeaconBlock);
            } else {
                self.penalize(receipts, index, amount, ReceiptKind::PenaltyMissingBeaconBlock);
            }
        }

        // Proposers collect a flat reward per vote they included plus a
        // distance reward that decays with inclusion delay.
        let mut proposer_inclusion: BTreeMap<u64, u64> = BTreeMap::new();
        let mut proposer_distance: BTreeMap<u64, u64> = BTreeMap::new();
        for voter in previous_voters.iter() {
            let Some(vote) = previous_voter_votes.get(&voter) else {
                continue;
            };
            let amount = self.base_reward(vote.proposer, total_balance, params);
            *proposer_inclusion.entry(vote.proposer).or_default() += amount;
            if vote.inclusion_delay > 0 {
                *proposer_distance.entry(vote.proposer).or_default() +=
                    amount * params.min_attestation_inclusion_delay / vote.inclusion_delay;
            }
        }
        for (proposer, amount) in proposer_inclusion {
            self.reward(receipts, proposer, amount, ReceiptKind::RewardIncludedVote);
        }
        for (proposer, amount) in proposer_distance {
            self.reward(receipts, proposer, amount, ReceiptKind::RewardInclusionDistance);
        }

        // Inactivity leak: once finality stalls, bleed every active validator
        // and bleed non-target voters proportionally to the delay.
        let finality_delay = self.epoch_index - self.finalized_epoch;
        if finality_delay > MAX_FINALITY_DELAY_EPOCHS {
            for index in 0..self.validator_registry.len() as u64 {
                if !self.validator_registry[index as usize].is_active() {
                    continue;
                }
                let amount = self.base_reward(index, total_balance, params) * NUM_REWARD_CATEGORIES;
                self.penalize(receipts, index, amount, ReceiptKind::PenaltyInactivityLeak);

                if !previous_voters_matching_target.contains(index) {
                    let amount = self.get_effective_balance(index, params) * finality_delay
                        / params.inactivity_penalty_quotient;
                    self.penalize(receipts, index, amount, ReceiptKind::PenaltyInactivityLeakNoVote);
                }
            }
        }

        Ok(())
    }

    fn reward(
        &mut self,
        receipts: &mut Vec<EpochReceipt>,
        index: u64,
        amount: u64,
        kind: ReceiptKind,
    ) {
        if let Some(validator) = self.validator_registry.get_mut(index as usize) {
            validator.balance += amount;
        }
        receipts.push(EpochReceipt {
            kind,
            amount,
            validator: index,
        });
    }

    /// Newly-activated validators are exempt from penalties for a grace
    /// period.
    fn penalize(
        &mut self,
        receipts: &mut Vec<EpochReceipt>,
        index: u64,
        amount: u64,
        kind: ReceiptKind,
    ) {
        let epoch_index = self.epoch_index;
        let Some(validator) = self.validator_registry.get_mut(index as usize) else {
            return;
        };
        if validator.first_active_epoch + PENALTY_GRACE_EPOCHS >= epoch_index {
            return;
        }
        validator.balance = validator.balance.saturating_sub(amount);
        receipts.push(EpochReceipt {
            kind,
            amount,
            validator: index,
        });
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;
    use olympus_chain_spec::TESTNET;

    use super::*;
    use crate::genesis::{InitializationParameters, ValidatorInitialization};
    use crate::validator::Validator;

    fn state_with_active_validators(count: usize) -> State {
        let params = &*TESTNET;
        let ip = InitializationParameters {
            initial_validators: (0..count)
                .map(|seed| {
                    let key = olympus_bls::PrivateKey::key_gen(&[seed as u8 + 1; 32])
                        .expect("keygen should succeed");
                    ValidatorInitialization {
                        public_key: key.public_key().expect("pubkey should derive"),
                        payee_address: Address::repeat_byte(seed as u8 + 1),
                    }
                })
                .collect(),
            premine_address: Address::repeat_byte(0xee),
            genesis_time: 0,
        };
        State::genesis(&ip, params).expect("genesis should succeed")
    }

    #[test]
    fn registry_churn_activates_a_prefix_up_to_the_cap() {
        let params = &*TESTNET;
        let mut state = state_with_active_validators(64);
        let deposit = params.deposit_amount * params.units_per_coin;

        // 64 active validators give a churn budget of exactly one deposit.
        let active_balance = state.get_active_balance();
        let max_churn = active_balance / (params.max_balance_churn_quotient * 2);
        assert!(max_churn >= deposit && max_churn < 2 * deposit);

        for seed in 0..3u8 {
            let key = olympus_bls::PrivateKey::key_gen(&[0x80 + seed; 32])
                .expect("keygen should succeed");
            state
                .validator_registry
                .push(Validator {
                    pubkey: key.public_key().expect("pubkey should derive"),
                    payee_address: Address::repeat_byte(0x80 + seed),
                    balance: deposit,
                    status: ValidatorStatus::Starting,
                    first_active_epoch: 1,
                    last_active_epoch: 0,
                })
                .expect("registry should accept");
        }
        state.epoch_index = 1;

        state
            .update_validator_registry(params)
            .expect("churn should succeed");

        // Registry order decides who activates: only the first pending
        // validator fits in the budget.
        assert_eq!(
            state.validator_registry[64].status,
            ValidatorStatus::Active
        );
        assert_eq!(
            state.validator_registry[65].status,
            ValidatorStatus::Starting
        );
        assert_eq!(
            state.validator_registry[66].status,
            ValidatorStatus::Starting
        );
    }

    #[test]
    fn exit_churn_releases_stake_to_the_payee() {
        let params = &*TESTNET;
        let mut state = state_with_active_validators(64);
        state.validator_registry[3].status = ValidatorStatus::ActivePendingExit;
        state.validator_registry[3].last_active_epoch = 1;
        state.epoch_index = 2;

        state
            .update_validator_registry(params)
            .expect("churn should succeed");

        assert_eq!(
            state.validator_registry[3].status,
            ValidatorStatus::ExitedWithoutPenalty
        );
        assert_eq!(state.validator_registry[3].balance, 0);
        assert_eq!(
            state
                .coins_state
                .get_balance(&state.validator_registry[3].payee_address),
            params.deposit_amount * params.units_per_coin
        );
    }

    #[test]
    fn treasury_payout_waits_a_full_month() {
        let params = &*TESTNET;
        let mut state = state_with_active_validators(4);
        let epochs_per_month = 30 * 24 * 60 * 60 / params.slot_duration / params.epoch_length;

        state.slot = epochs_per_month * params.epoch_length - 1;
        state
            .check_for_governance_transitions(params)
            .expect("tally should succeed");
        assert_eq!(state.last_paid_slot, 0);

        state.slot += 1;
        state
            .check_for_governance_transitions(params)
            .expect("tally should succeed");
        assert_eq!(state.last_paid_slot, state.slot);

        let per_group =
            params.base_reward_per_block * 60 * 60 * 24 * 30 / params.slot_duration
                / params.governance_budget_quotient
                / 2;
        let joint_account = address_hashes_to_multisig_address(
            &state.current_managers,
            state.current_managers.len() as u64,
        );
        assert_eq!(state.coins_state.get_balance(&joint_account), per_group);
    }
}
