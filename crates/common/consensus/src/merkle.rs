use alloy_primitives::B256;
use ethereum_hashing::hash_fixed;
use tree_hash::TreeHash;

/// Compute the commitment to a list of block operations: leaves are tree-hash
/// roots, the tree is built by recursively splitting the leaf list in half
/// and hashing the concatenated child roots. An empty list commits to the
/// zero hash and a single leaf commits to itself.
pub fn operation_merkle_root<T: TreeHash>(items: &[T]) -> B256 {
    let leaves = items
        .iter()
        .map(|item| item.tree_hash_root())
        .collect::<Vec<_>>();
    merkle_root(&leaves)
}

fn merkle_root(leaves: &[B256]) -> B256 {
    match leaves.len() {
        0 => B256::ZERO,
        1 => leaves[0],
        n => {
            let left = merkle_root(&leaves[..n / 2]);
            let right = merkle_root(&leaves[n / 2..]);
            let mut preimage = [0u8; 64];
            preimage[..32].copy_from_slice(left.as_slice());
            preimage[32..].copy_from_slice(right.as_slice());
            B256::from(hash_fixed(&preimage))
        }
    }
}
