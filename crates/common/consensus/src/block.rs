use alloy_primitives::B256;
use olympus_bls::BLSSignature;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::VariableList;
use tree_hash_derive::TreeHash;

use crate::{
    block_header::BlockHeader,
    constants::{
        MaxDepositsPerBlock, MaxExitsPerBlock, MaxGovernanceVotesPerBlock,
        MaxProposerSlashingsPerBlock, MaxRandaoSlashingsPerBlock, MaxTxsPerBlock,
        MaxVoteSlashingsPerBlock, MaxVotesPerBlock,
    },
    deposit::Deposit,
    exit::Exit,
    governance::GovernanceVote,
    merkle::operation_merkle_root,
    slashing::{ProposerSlashing, RandaoSlashing, VoteSlashing},
    transfer::Transfer,
    vote::MultiValidatorVote,
};

/// A full block: header, the eight operation lists the header commits to, the
/// proposer's signature over the header hash, and the RANDAO reveal for the
/// block's slot.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Block {
    pub header: BlockHeader,
    pub votes: VariableList<MultiValidatorVote, MaxVotesPerBlock>,
    pub txs: VariableList<Transfer, MaxTxsPerBlock>,
    pub deposits: VariableList<Deposit, MaxDepositsPerBlock>,
    pub exits: VariableList<Exit, MaxExitsPerBlock>,
    pub vote_slashings: VariableList<VoteSlashing, MaxVoteSlashingsPerBlock>,
    pub randao_slashings: VariableList<RandaoSlashing, MaxRandaoSlashingsPerBlock>,
    pub proposer_slashings: VariableList<ProposerSlashing, MaxProposerSlashingsPerBlock>,
    pub governance_votes: VariableList<GovernanceVote, MaxGovernanceVotesPerBlock>,
    pub signature: BLSSignature,
    pub randao_signature: BLSSignature,
}

impl Block {
    pub fn hash(&self) -> B256 {
        self.header.hash()
    }

    pub fn tx_merkle_root(&self) -> B256 {
        operation_merkle_root(&self.txs)
    }

    pub fn vote_merkle_root(&self) -> B256 {
        operation_merkle_root(&self.votes)
    }

    pub fn deposit_merkle_root(&self) -> B256 {
        operation_merkle_root(&self.deposits)
    }

    pub fn exit_merkle_root(&self) -> B256 {
        operation_merkle_root(&self.exits)
    }

    pub fn vote_slashing_merkle_root(&self) -> B256 {
        operation_merkle_root(&self.vote_slashings)
    }

    pub fn randao_slashing_merkle_root(&self) -> B256 {
        operation_merkle_root(&self.randao_slashings)
    }

    pub fn proposer_slashing_merkle_root(&self) -> B256 {
        operation_merkle_root(&self.proposer_slashings)
    }

    pub fn governance_vote_merkle_root(&self) -> B256 {
        operation_merkle_root(&self.governance_votes)
    }
}

impl Default for Block {
    fn default() -> Self {
        Block {
            header: BlockHeader::default(),
            votes: VariableList::empty(),
            txs: VariableList::empty(),
            deposits: VariableList::empty(),
            exits: VariableList::empty(),
            vote_slashings: VariableList::empty(),
            randao_slashings: VariableList::empty(),
            proposer_slashings: VariableList::empty(),
            governance_votes: VariableList::empty(),
            signature: BLSSignature::default(),
            randao_signature: BLSSignature::default(),
        }
    }
}
