use std::collections::BTreeMap;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use ssz::{Decode, DecodeError, Encode};
use ssz_derive::{Decode, Encode};
use ssz_types::VariableList;
use tree_hash::{Hash256, PackedEncoding, TreeHash, TreeHashType};
use tree_hash_derive::TreeHash;

use crate::constants::MaxAccounts;

/// Balances and nonces for every account, keyed by the 20-byte public key
/// hash. `BTreeMap` keeps iteration in ascending address order, which is the
/// canonical order for serialization and any consensus-relevant sum.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct CoinsState {
    pub balances: BTreeMap<Address, u64>,
    pub nonces: BTreeMap<Address, u64>,
}

#[derive(Debug, PartialEq, Clone, Encode, Decode, TreeHash)]
struct AccountEntry {
    address: Address,
    value: u64,
}

/// Flat encoding of [`CoinsState`] with entries in ascending address order.
#[derive(Debug, PartialEq, Clone, Encode, Decode, TreeHash)]
struct SerializableCoinsState {
    balances: VariableList<AccountEntry, MaxAccounts>,
    nonces: VariableList<AccountEntry, MaxAccounts>,
}

impl CoinsState {
    pub fn get_balance(&self, address: &Address) -> u64 {
        self.balances.get(address).copied().unwrap_or_default()
    }

    pub fn get_nonce(&self, address: &Address) -> u64 {
        self.nonces.get(address).copied().unwrap_or_default()
    }

    pub fn credit(&mut self, address: Address, amount: u64) {
        *self.balances.entry(address).or_default() += amount;
    }

    pub fn debit(&mut self, address: Address, amount: u64) {
        let balance = self.balances.entry(address).or_default();
        *balance = balance.saturating_sub(amount);
    }

    pub fn set_nonce(&mut self, address: Address, nonce: u64) {
        self.nonces.insert(address, nonce);
    }

    /// Return the sum of all account balances.
    pub fn get_total(&self) -> u64 {
        self.balances.values().sum()
    }

    fn to_serializable(&self) -> SerializableCoinsState {
        let entries = |map: &BTreeMap<Address, u64>| {
            VariableList::from(
                map.iter()
                    .map(|(address, value)| AccountEntry {
                        address: *address,
                        value: *value,
                    })
                    .collect::<Vec<_>>(),
            )
        };
        SerializableCoinsState {
            balances: entries(&self.balances),
            nonces: entries(&self.nonces),
        }
    }

    fn from_serializable(serializable: &SerializableCoinsState) -> Self {
        let map = |entries: &VariableList<AccountEntry, MaxAccounts>| {
            entries
                .iter()
                .map(|entry| (entry.address, entry.value))
                .collect::<BTreeMap<_, _>>()
        };
        CoinsState {
            balances: map(&serializable.balances),
            nonces: map(&serializable.nonces),
        }
    }
}

impl Encode for CoinsState {
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        self.to_serializable().ssz_append(buf);
    }

    fn ssz_bytes_len(&self) -> usize {
        self.to_serializable().ssz_bytes_len()
    }
}

impl Decode for CoinsState {
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(CoinsState::from_serializable(
            &SerializableCoinsState::from_ssz_bytes(bytes)?,
        ))
    }
}

impl TreeHash for CoinsState {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::Container
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        unreachable!("containers are not packed")
    }

    fn tree_hash_packing_factor() -> usize {
        unreachable!("containers are not packed")
    }

    fn tree_hash_root(&self) -> Hash256 {
        self.to_serializable().tree_hash_root()
    }
}
