use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// A block header. Each `*_merkle_root` commits to one operation category of
/// the block body; `process_block` recomputes all eight and rejects the block
/// on any mismatch.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BlockHeader {
    pub version: u64,
    pub nonce: u64,
    pub tx_merkle_root: B256,
    pub vote_merkle_root: B256,
    pub deposit_merkle_root: B256,
    pub exit_merkle_root: B256,
    pub vote_slashing_merkle_root: B256,
    pub randao_slashing_merkle_root: B256,
    pub proposer_slashing_merkle_root: B256,
    pub governance_vote_merkle_root: B256,
    pub prev_block_hash: B256,
    pub timestamp: u64,
    pub slot: u64,
    pub state_root: B256,
    pub fee_address: Address,
}

impl BlockHeader {
    pub fn hash(&self) -> B256 {
        self.tree_hash_root()
    }
}
