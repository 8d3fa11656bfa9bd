use std::fmt;

use serde::{Deserialize, Serialize};
use ssz::{Decode, DecodeError, Encode};
use ssz_derive::{Decode, Encode};
use tree_hash::{Hash256, PackedEncoding, TreeHash, TreeHashType};
use tree_hash_derive::TreeHash;

/// Why a validator's balance changed during an epoch transition.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptKind {
    RewardMatchedFromEpoch = 0,
    PenaltyMissingFromEpoch = 1,
    RewardMatchedToEpoch = 2,
    PenaltyMissingToEpoch = 3,
    RewardMatchedBeaconBlock = 4,
    PenaltyMissingBeaconBlock = 5,
    RewardIncludedVote = 6,
    RewardInclusionDistance = 7,
    PenaltyInactivityLeak = 8,
    PenaltyInactivityLeakNoVote = 9,
}

impl ReceiptKind {
    pub fn is_reward(&self) -> bool {
        matches!(
            self,
            ReceiptKind::RewardMatchedFromEpoch
                | ReceiptKind::RewardMatchedToEpoch
                | ReceiptKind::RewardMatchedBeaconBlock
                | ReceiptKind::RewardIncludedVote
                | ReceiptKind::RewardInclusionDistance
        )
    }
}

impl fmt::Display for ReceiptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            ReceiptKind::RewardMatchedFromEpoch => "voted for correct from epoch",
            ReceiptKind::PenaltyMissingFromEpoch => "voted for wrong from epoch",
            ReceiptKind::RewardMatchedToEpoch => "voted for correct to epoch",
            ReceiptKind::PenaltyMissingToEpoch => "voted for wrong to epoch",
            ReceiptKind::RewardMatchedBeaconBlock => "voted for correct beacon",
            ReceiptKind::PenaltyMissingBeaconBlock => "voted for wrong beacon block",
            ReceiptKind::RewardIncludedVote => "included vote in proposal",
            ReceiptKind::RewardInclusionDistance => "inclusion distance reward",
            ReceiptKind::PenaltyInactivityLeak => "inactivity leak",
            ReceiptKind::PenaltyInactivityLeakNoVote => "did not vote with inactivity leak",
        };
        write!(f, "{description}")
    }
}

impl TryFrom<u8> for ReceiptKind {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ReceiptKind::RewardMatchedFromEpoch),
            1 => Ok(ReceiptKind::PenaltyMissingFromEpoch),
            2 => Ok(ReceiptKind::RewardMatchedToEpoch),
            3 => Ok(ReceiptKind::PenaltyMissingToEpoch),
            4 => Ok(ReceiptKind::RewardMatchedBeaconBlock),
            5 => Ok(ReceiptKind::PenaltyMissingBeaconBlock),
            6 => Ok(ReceiptKind::RewardIncludedVote),
            7 => Ok(ReceiptKind::RewardInclusionDistance),
            8 => Ok(ReceiptKind::PenaltyInactivityLeak),
            9 => Ok(ReceiptKind::PenaltyInactivityLeakNoVote),
            _ => Err(DecodeError::BytesInvalid(format!(
                "invalid receipt kind: {value}"
            ))),
        }
    }
}

impl Encode for ReceiptKind {
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

impl Decode for ReceiptKind {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        <u8 as Decode>::ssz_fixed_len()
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        ReceiptKind::try_from(u8::from_ssz_bytes(bytes)?)
    }
}

impl TreeHash for ReceiptKind {
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

/// A single balance adjustment applied to a validator during an epoch
/// transition. `amount` is the magnitude; the kind says whether it was
/// credited or debited.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct EpochReceipt {
    pub kind: ReceiptKind,
    pub amount: u64,
    pub validator: u64,
}

impl fmt::Display for EpochReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.kind.is_reward() {
            "Reward"
        } else {
            "Penalty"
        };
        write!(
            f,
            "{label}: Validator {}: {} for {}",
            self.validator, self.amount, self.kind
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_kind_round_trips_through_ssz() {
        for kind in [
            ReceiptKind::RewardMatchedFromEpoch,
            ReceiptKind::PenaltyMissingBeaconBlock,
            ReceiptKind::PenaltyInactivityLeakNoVote,
        ] {
            let decoded = ReceiptKind::from_ssz_bytes(&kind.as_ssz_bytes())
                .expect("receipt kind should decode");
            assert_eq!(decoded, kind);
        }
    }

    #[test]
    fn receipt_display_distinguishes_rewards_and_penalties() {
        let reward = EpochReceipt {
            kind: ReceiptKind::RewardIncludedVote,
            amount: 42,
            validator: 7,
        };
        assert_eq!(
            reward.to_string(),
            "Reward: Validator 7: 42 for included vote in proposal"
        );

        let penalty = EpochReceipt {
            kind: ReceiptKind::PenaltyInactivityLeak,
            amount: 9,
            validator: 3,
        };
        assert_eq!(
            penalty.to_string(),
            "Penalty: Validator 3: 9 for inactivity leak"
        );
    }
}
