use olympus_bls::{BLSSignature, PubKey};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

use crate::{block_header::BlockHeader, vote::MultiValidatorVote};

/// Evidence that one validator signed two distinct block headers for the same
/// slot.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct ProposerSlashing {
    pub block_header_1: BlockHeader,
    pub block_header_2: BlockHeader,
    pub signature_1: BLSSignature,
    pub signature_2: BLSSignature,
    pub validator_public_key: PubKey,
}

/// Evidence of two votes violating the double-vote or surround-vote rule.
/// Every validator that participated in both votes is slashable.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct VoteSlashing {
    pub vote_1: MultiValidatorVote,
    pub vote_2: MultiValidatorVote,
}

/// Evidence that a validator revealed its RANDAO signature for a slot the
/// chain has not reached yet.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct RandaoSlashing {
    pub randao_reveal: BLSSignature,
    pub slot: u64,
    pub validator_public_key: PubKey,
}
