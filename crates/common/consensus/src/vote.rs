use alloy_primitives::B256;
use olympus_bls::BLSSignature;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::BitList;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

use crate::constants::MaxCommitteeSize;

/// The checkpoint pair a committee votes on: a source (`from`) checkpoint that
/// must already be justified and a target (`to`) checkpoint to justify next.
#[derive(
    Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct VoteData {
    pub slot: u64,
    pub from_epoch: u64,
    pub from_hash: B256,
    pub to_epoch: u64,
    pub to_hash: B256,
    pub beacon_block_hash: B256,
}

impl VoteData {
    /// Two distinct votes for the same target epoch.
    pub fn is_double_vote(&self, other: &VoteData) -> bool {
        self.to_epoch == other.to_epoch && self != other
    }

    /// This vote's source/target range strictly contains the other's.
    pub fn is_surround_vote(&self, other: &VoteData) -> bool {
        self.from_epoch < other.from_epoch && other.to_epoch < self.to_epoch
    }

    pub fn hash(&self) -> B256 {
        self.tree_hash_root()
    }
}

/// Participation bitfields are LSB-first: bit `i` of the bitlist marks
/// position `i` of the slot's committee as having signed.
pub type ParticipationBitfield = BitList<MaxCommitteeSize>;

/// An aggregate vote from a subset of a slot's committee.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct MultiValidatorVote {
    pub data: VoteData,
    pub signature: BLSSignature,
    pub participation_bitfield: ParticipationBitfield,
}

/// A vote accepted into the state, tagged with the proposer that included it
/// and how many slots passed between the vote slot and inclusion.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct AcceptedVoteInfo {
    pub data: VoteData,
    pub participation_bitfield: ParticipationBitfield,
    pub proposer: u64,
    pub inclusion_delay: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(from_epoch: u64, to_epoch: u64, to_hash: u8) -> VoteData {
        VoteData {
            slot: to_epoch * 5 + 1,
            from_epoch,
            from_hash: B256::ZERO,
            to_epoch,
            to_hash: B256::repeat_byte(to_hash),
            beacon_block_hash: B256::ZERO,
        }
    }

    #[test]
    fn double_vote_same_target_different_hash() {
        let a = vote(1, 2, 1);
        let b = vote(1, 2, 2);
        assert!(a.is_double_vote(&b));
        assert!(!a.is_double_vote(&a.clone()));
    }

    #[test]
    fn surround_vote_strict_containment() {
        let outer = vote(1, 5, 1);
        let inner = vote(2, 4, 1);
        assert!(outer.is_surround_vote(&inner));
        assert!(!inner.is_surround_vote(&outer));
        // Equal boundaries do not surround.
        assert!(!outer.is_surround_vote(&vote(1, 4, 1)));
    }
}
