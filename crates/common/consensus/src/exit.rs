use alloy_primitives::hex;
use olympus_bls::{BLSSignature, PubKey};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// A request by a validator's payee key to begin a voluntary exit.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Exit {
    pub validator_public_key: PubKey,
    pub withdraw_public_key: PubKey,
    pub signature: BLSSignature,
}

impl Exit {
    /// The message signed by the payee key.
    pub fn signature_message(&self) -> Vec<u8> {
        let mut message = b"exit ".to_vec();
        message.extend_from_slice(hex::encode(self.validator_public_key.to_bytes()).as_bytes());
        message
    }
}
