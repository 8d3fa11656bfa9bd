use alloy_primitives::{Address, B256};
use olympus_bls::{BLSSignature, PubKey};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// The validator half of a deposit: the new validator key, a
/// proof-of-possession by that key, and the address paid on exit.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct DepositData {
    pub public_key: PubKey,
    pub proof_of_possession: BLSSignature,
    pub withdrawal_address: Address,
}

/// A request to lock the deposit amount from the account of `public_key` and
/// register `data.public_key` as a new validator.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Deposit {
    pub public_key: PubKey,
    pub signature: BLSSignature,
    pub data: DepositData,
}

impl Deposit {
    /// The message signed by the funding account key.
    pub fn signature_message(&self) -> B256 {
        self.data.tree_hash_root()
    }
}
