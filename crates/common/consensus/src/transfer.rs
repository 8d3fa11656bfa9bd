use alloy_primitives::{Address, B256};
use anyhow::ensure;
use olympus_bls::{BLSSignature, PubKey, traits::Verifiable};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// A single-sender coin transfer. The sender is identified by its full public
/// key; the recipient and fee payout are 20-byte account addresses.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Transfer {
    pub to: Address,
    pub from_public_key: PubKey,
    pub amount: u64,
    pub nonce: u64,
    pub fee: u64,
    pub signature: BLSSignature,
}

impl Transfer {
    pub fn from_address(&self) -> Address {
        self.from_public_key.to_address()
    }

    /// The message the sender signs: the tree-hash root of the transfer with
    /// the signature field zeroed.
    pub fn signature_message(&self) -> B256 {
        let unsigned = Transfer {
            signature: BLSSignature::default(),
            ..self.clone()
        };
        unsigned.tree_hash_root()
    }

    pub fn verify_signature(&self) -> anyhow::Result<()> {
        ensure!(
            self.signature
                .verify(&self.from_public_key, self.signature_message().as_slice())?,
            "invalid transfer signature"
        );
        Ok(())
    }
}
