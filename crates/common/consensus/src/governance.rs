use std::collections::BTreeMap;

use alloy_primitives::{Address, B256};
use anyhow::{bail, ensure};
use olympus_bls::Multisig;
use olympus_chain_spec::ChainParams;
use serde::{Deserialize, Serialize};
use ssz::{Decode, DecodeError, Encode};
use ssz_derive::{Decode, Encode};
use ssz_types::{
    FixedVector, VariableList,
    typenum::U100,
};
use tracing::info;
use tree_hash::{Hash256, PackedEncoding, TreeHash, TreeHashType};
use tree_hash_derive::TreeHash;

use crate::{
    constants::{MaxAccounts, MaxReplacementCandidates},
    state::State,
};

/// Anyone may signal that a manager-replacement voting period should start.
pub const ENTER_VOTING_PERIOD: u64 = 0;
/// Vote for a specific replacement candidate set.
pub const VOTE_FOR: u64 = 1;
/// Replace the managers immediately; requires all current managers to sign.
pub const UPDATE_MANAGERS_INSTANTLY: u64 = 2;
/// Force a voting period to start; requires 3/5 of the managers to sign.
pub const UPDATE_MANAGERS_VOTE: u64 = 3;

/// The governance state machine: `Active` accumulates replace votes until the
/// community override threshold is reached, `Voting` runs for a fixed number
/// of slots and ends with a weighted tally.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingState {
    #[default]
    Active = 0,
    Voting = 1,
}

impl TryFrom<u8> for VotingState {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(VotingState::Active),
            1 => Ok(VotingState::Voting),
            _ => Err(DecodeError::BytesInvalid(format!(
                "invalid voting state: {value}"
            ))),
        }
    }
}

impl Encode for VotingState {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        <u8 as Encode>::ssz_fixed_len()
    }

    fn ssz_bytes_len(&self) -> usize {
        <u8 as Encode>::ssz_fixed_len()
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        buf.push(*self as u8);
    }
}

impl Decode for VotingState {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        <u8 as Decode>::ssz_fixed_len()
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        VotingState::try_from(u8::from_ssz_bytes(bytes)?)
    }
}

impl TreeHash for VotingState {
    fn tree_hash_type() -> TreeHashType {
        u8::tree_hash_type()
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        (*self as u8).tree_hash_packed_encoding()
    }

    fn tree_hash_packing_factor() -> usize {
        u8::tree_hash_packing_factor()
    }

    fn tree_hash_root(&self) -> Hash256 {
        (*self as u8).tree_hash_root()
    }
}

/// The candidate manager set a community vote proposes, one candidate per
/// replaceable manager slot.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct CommunityVoteData {
    pub replacement_candidates: VariableList<Address, MaxReplacementCandidates>,
}

impl CommunityVoteData {
    pub fn hash(&self) -> B256 {
        self.tree_hash_root()
    }
}

/// Pending governance votes: `replace_votes` maps a voting account to the
/// hash of the candidate set it backs (the zero hash for a bare
/// enter-voting-period signal), `community_votes` stores the candidate sets
/// by hash.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct Governance {
    pub replace_votes: BTreeMap<Address, B256>,
    pub community_votes: BTreeMap<B256, CommunityVoteData>,
}

#[derive(Debug, PartialEq, Clone, Encode, Decode, TreeHash)]
struct ReplacementVote {
    account: Address,
    hash: B256,
}

#[derive(Debug, PartialEq, Clone, Encode, Decode, TreeHash)]
struct CommunityVoteInfo {
    hash: B256,
    data: CommunityVoteData,
}

/// Flat encoding of [`Governance`] with entries in ascending key order.
#[derive(Debug, PartialEq, Clone, Encode, Decode, TreeHash)]
struct SerializableGovernance {
    replace_votes: VariableList<ReplacementVote, MaxAccounts>,
    community_votes: VariableList<CommunityVoteInfo, MaxAccounts>,
}

impl Governance {
    fn to_serializable(&self) -> SerializableGovernance {
        SerializableGovernance {
            replace_votes: VariableList::from(
                self.replace_votes
                    .iter()
                    .map(|(account, hash)| ReplacementVote {
                        account: *account,
                        hash: *hash,
                    })
                    .collect::<Vec<_>>(),
            ),
            community_votes: VariableList::from(
                self.community_votes
                    .iter()
                    .map(|(hash, data)| CommunityVoteInfo {
                        hash: *hash,
                        data: data.clone(),
                    })
                    .collect::<Vec<_>>(),
            ),
        }
    }

    fn from_serializable(serializable: &SerializableGovernance) -> Self {
        Governance {
            replace_votes: serializable
                .replace_votes
                .iter()
                .map(|vote| (vote.account, vote.hash))
                .collect(),
            community_votes: serializable
                .community_votes
                .iter()
                .map(|info| (info.hash, info.data.clone()))
                .collect(),
        }
    }
}

impl Encode for Governance {
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        self.to_serializable().ssz_append(buf);
    }

    fn ssz_bytes_len(&self) -> usize {
        self.to_serializable().ssz_bytes_len()
    }
}

impl Decode for Governance {
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(Governance::from_serializable(
            &SerializableGovernance::from_ssz_bytes(bytes)?,
        ))
    }
}

impl TreeHash for Governance {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::Container
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        unreachable!("containers are not packed")
    }

    fn tree_hash_packing_factor() -> usize {
        unreachable!("containers are not packed")
    }

    fn tree_hash_root(&self) -> Hash256 {
        self.to_serializable().tree_hash_root()
    }
}

#[derive(Debug, PartialEq, Clone, TreeHash)]
struct GovernanceVoteSigningData {
    kind: u64,
    data: FixedVector<u8, U100>,
    vote_epoch: u64,
}

/// A governance vote operation. Single-voter kinds carry a 1-of-1 multisig;
/// manager kinds carry a threshold multisig of the current manager keys.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct GovernanceVote {
    pub kind: u64,
    pub data: FixedVector<u8, U100>,
    pub multisig: Multisig,
    pub vote_epoch: u64,
}

impl GovernanceVote {
    /// The message all participants sign: the vote with the signature
    /// stripped.
    pub fn signature_hash(&self) -> B256 {
        GovernanceVoteSigningData {
            kind: self.kind,
            data: self.data.clone(),
            vote_epoch: self.vote_epoch,
        }
        .tree_hash_root()
    }

    /// The account casting this vote: a plain account for a single key, the
    /// multisig account otherwise.
    pub fn voter_address(&self) -> Option<Address> {
        let keys = &self.multisig.public_key.public_keys;
        match keys.len() {
            0 => None,
            1 if self.multisig.public_key.num_needed == 1 => Some(keys[0].to_address()),
            _ => Some(self.multisig.public_key.to_address()),
        }
    }

    /// Decode the data field as packed 20-byte candidate addresses, dropping
    /// trailing all-zero entries.
    pub fn candidate_addresses(&self) -> Vec<Address> {
        let mut candidates = self
            .data
            .chunks(20)
            .filter(|chunk| chunk.len() == 20)
            .map(Address::from_slice)
            .collect::<Vec<_>>();
        while candidates.last() == Some(&Address::ZERO) {
            candidates.pop();
        }
        candidates
    }

    pub fn community_vote_data(&self) -> CommunityVoteData {
        CommunityVoteData {
            replacement_candidates: VariableList::from(self.candidate_addresses()),
        }
    }
}

impl State {
    /// Validate a governance vote against the current governance state.
    pub fn is_governance_vote_valid(
        &self,
        vote: &GovernanceVote,
        params: &ChainParams,
    ) -> anyhow::Result<()> {
        ensure!(
            vote.vote_epoch == self.vote_epoch,
            "governance vote epoch does not match the state (expected: {}, got: {})",
            self.vote_epoch,
            vote.vote_epoch
        );
        ensure!(
            vote.multisig.verify(vote.signature_hash().as_slice())?,
            "governance vote signature does not validate"
        );

        match vote.kind {
            ENTER_VOTING_PERIOD => {
                ensure!(
                    self.voting_state == VotingState::Active,
                    "voting period already started"
                );
                self.ensure_voting_balance(vote, params)?;
            }
            VOTE_FOR => {
                self.ensure_voting_balance(vote, params)?;
            }
            UPDATE_MANAGERS_INSTANTLY => {
                ensure!(
                    self.voting_state == VotingState::Active,
                    "cannot replace managers during a voting period"
                );
                self.ensure_manager_multisig(vote, self.current_managers.len() as u64)?;
                ensure!(
                    vote.candidate_addresses().len() == self.current_managers.len(),
                    "manager update must name one candidate per manager"
                );
            }
            UPDATE_MANAGERS_VOTE => {
                ensure!(
                    self.voting_state == VotingState::Active,
                    "voting period already started"
                );
                let required = (self.current_managers.len() as u64 * 3).div_ceil(5);
                self.ensure_manager_multisig(vote, required)?;
            }
            kind => bail!("unknown governance vote type: {kind}"),
        }
        Ok(())
    }

    /// Validate and apply a governance vote.
    pub fn process_governance_vote(
        &mut self,
        vote: &GovernanceVote,
        params: &ChainParams,
    ) -> anyhow::Result<()> {
        self.is_governance_vote_valid(vote, params)?;

        match vote.kind {
            ENTER_VOTING_PERIOD => {
                let Some(voter) = vote.voter_address() else {
                    bail!("governance vote has no signer");
                };
                self.governance.replace_votes.insert(voter, B256::ZERO);
            }
            VOTE_FOR => {
                let Some(voter) = vote.voter_address() else {
                    bail!("governance vote has no signer");
                };
                let data = vote.community_vote_data();
                let hash = data.hash();
                self.governance.community_votes.insert(hash, data);
                self.governance.replace_votes.insert(voter, hash);
            }
            UPDATE_MANAGERS_INSTANTLY => {
                self.current_managers = VariableList::from(vote.candidate_addresses());
                self.clear_manager_replacement()?;
                info!("governance: managers replaced by unanimous manager vote");
            }
            UPDATE_MANAGERS_VOTE => {
                self.next_vote_epoch(VotingState::Voting);
                self.mark_all_managers_replaceable()?;
                info!("governance: managers forced a community voting period");
            }
            kind => bail!("unknown governance vote type: {kind}"),
        }
        Ok(())
    }

    fn ensure_voting_balance(
        &self,
        vote: &GovernanceVote,
        params: &ChainParams,
    ) -> anyhow::Result<()> {
        let Some(voter) = vote.voter_address() else {
            bail!("governance vote has no signer");
        };
        let minimum = params.min_voting_balance * params.units_per_coin;
        ensure!(
            self.coins_state.get_balance(&voter) >= minimum,
            "balance of {} is below the minimum voting balance {minimum}",
            self.coins_state.get_balance(&voter)
        );
        Ok(())
    }

    fn ensure_manager_multisig(
        &self,
        vote: &GovernanceVote,
        required: u64,
    ) -> anyhow::Result<()> {
        let multipub = &vote.multisig.public_key;
        ensure!(
            multipub.num_needed >= required,
            "manager vote requires at least {required} signers, multisig needs {}",
            multipub.num_needed
        );
        ensure!(
            multipub.public_keys.len() == self.current_managers.len(),
            "manager vote must be keyed by the current managers"
        );
        for (key, manager) in multipub.public_keys.iter().zip(self.current_managers.iter()) {
            ensure!(
                &key.to_address() == manager,
                "multisig key does not match manager address {manager}"
            );
        }
        Ok(())
    }

    /// Advance the governance epoch and switch the state machine. Pending
    /// votes are cleared once a period resolves back to `Active`.
    pub(crate) fn next_vote_epoch(&mut self, new_state: VotingState) {
        self.vote_epoch += 1;
        self.vote_epoch_start_slot = self.slot;
        self.voting_state = new_state;
        if new_state == VotingState::Active {
            self.governance.replace_votes.clear();
            self.governance.community_votes.clear();
        }
    }
}
