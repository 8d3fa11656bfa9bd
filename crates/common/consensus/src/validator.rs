use alloy_primitives::Address;
use olympus_bls::PubKey;
use serde::{Deserialize, Serialize};
use ssz::{Decode, DecodeError, Encode};
use ssz_derive::{Decode, Encode};
use tree_hash::{Hash256, PackedEncoding, TreeHash, TreeHashType};
use tree_hash_derive::TreeHash;

/// The lifecycle status of a validator. Transitions are one-directional:
/// `Starting -> Active -> ActivePendingExit -> ExitedWithoutPenalty` or
/// `ExitedWithPenalty`, and `ExitedWithPenalty` is terminal.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorStatus {
    #[default]
    Starting = 0,
    Active = 1,
    ActivePendingExit = 2,
    ExitedWithoutPenalty = 3,
    ExitedWithPenalty = 4,
}

impl TryFrom<u8> for ValidatorStatus {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ValidatorStatus::Starting),
            1 => Ok(ValidatorStatus::Active),
            2 => Ok(ValidatorStatus::ActivePendingExit),
            3 => Ok(ValidatorStatus::ExitedWithoutPenalty),
            4 => Ok(ValidatorStatus::ExitedWithPenalty),
            _ => Err(DecodeError::BytesInvalid(format!(
                "invalid validator status: {value}"
            ))),
        }
    }
}

impl Encode for ValidatorStatus {
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

impl Decode for ValidatorStatus {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        <u8 as Decode>::ssz_fixed_len()
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        ValidatorStatus::try_from(u8::from_ssz_bytes(bytes)?)
    }
}

impl TreeHash for ValidatorStatus {
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

/// A single validator registry entry. A validator's index in the registry is
/// its identity: proposer queues, committees, and slashing reports all refer
/// to validators by registry position.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Validator {
    pub pubkey: PubKey,
    pub payee_address: Address,
    pub balance: u64,
    pub status: ValidatorStatus,
    pub first_active_epoch: u64,
    pub last_active_epoch: u64,
}

impl Validator {
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            ValidatorStatus::Active | ValidatorStatus::ActivePendingExit
        )
    }

    pub fn is_active_at_epoch(&self, epoch: u64) -> bool {
        self.is_active()
            && (self.first_active_epoch == 0 || self.first_active_epoch <= epoch)
            && (self.last_active_epoch == 0 || epoch <= self.last_active_epoch)
    }
}

#[cfg(test)]
mod tests {
    use ssz::{Decode, Encode};

    use super::*;

    #[test]
    fn status_ssz_round_trip() {
        for status in [
            ValidatorStatus::Starting,
            ValidatorStatus::Active,
            ValidatorStatus::ActivePendingExit,
            ValidatorStatus::ExitedWithoutPenalty,
            ValidatorStatus::ExitedWithPenalty,
        ] {
            let bytes = status.as_ssz_bytes();
            assert_eq!(ValidatorStatus::from_ssz_bytes(&bytes).unwrap(), status);
        }
    }

    #[test]
    fn invalid_status_rejected() {
        assert!(ValidatorStatus::from_ssz_bytes(&[9]).is_err());
    }

    #[test]
    fn activity_checks() {
        let mut validator = Validator {
            status: ValidatorStatus::Active,
            first_active_epoch: 3,
            ..Default::default()
        };
        assert!(validator.is_active());
        assert!(!validator.is_active_at_epoch(2));
        assert!(validator.is_active_at_epoch(3));

        validator.status = ValidatorStatus::ExitedWithPenalty;
        assert!(!validator.is_active());
    }
}
