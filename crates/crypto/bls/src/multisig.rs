use alloy_primitives::Address;
use anyhow::{anyhow, bail, ensure};
use ethereum_hashing::hash;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{BitList, VariableList, typenum::U32};
use tree_hash_derive::TreeHash;

use crate::{
    private_key::PrivateKey,
    pubkey::PubKey,
    signature::BLSSignature,
    traits::{Signable, Verifiable},
};

/// Return the 20-byte address committing to a set of account addresses and a
/// signature threshold: the first 20 bytes of `SHA-256(addresses || be64(num_needed))`.
pub fn address_hashes_to_multisig_address(addresses: &[Address], num_needed: u64) -> Address {
    let mut preimage = Vec::with_capacity(addresses.len() * 20 + 8);
    for address in addresses {
        preimage.extend_from_slice(address.as_slice());
    }
    preimage.extend_from_slice(&num_needed.to_be_bytes());
    Address::from_slice(&hash(&preimage)[..20])
}

/// An m-of-n multisig public key.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash, Default)]
pub struct Multipub {
    pub public_keys: VariableList<PubKey, U32>,
    pub num_needed: u64,
}

impl Multipub {
    pub fn new(public_keys: Vec<PubKey>, num_needed: u64) -> Self {
        Self {
            public_keys: VariableList::from(public_keys),
            num_needed,
        }
    }

    pub fn to_address(&self) -> Address {
        let hashes = self
            .public_keys
            .iter()
            .map(PubKey::to_address)
            .collect::<Vec<_>>();
        address_hashes_to_multisig_address(&hashes, self.num_needed)
    }
}

/// An m-of-n multisig: a multipub plus the signatures collected so far, with
/// `keys_signed` bit `i` marking that `public_keys[i]` has signed. Signatures
/// are stored in ascending key-index order. Each participant signs
/// `SHA-256(message || its own public key)` so signatures cannot be reassigned
/// between participants.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Multisig {
    pub public_key: Multipub,
    pub signatures: VariableList<BLSSignature, U32>,
    pub keys_signed: BitList<U32>,
}

impl Multisig {
    pub fn new(public_key: Multipub) -> anyhow::Result<Self> {
        let keys_signed = BitList::with_capacity(public_key.public_keys.len())
            .map_err(|err| anyhow!("Failed to create keys_signed bitlist: {err:?}"))?;
        Ok(Self {
            public_key,
            signatures: VariableList::empty(),
            keys_signed,
        })
    }

    /// Add one participant's signature over `message`. Signing twice with the
    /// same key is a no-op.
    pub fn sign(&mut self, private_key: &PrivateKey, message: &[u8]) -> anyhow::Result<()> {
        let public_key = private_key.public_key()?;
        let Some(index) = self
            .public_key
            .public_keys
            .iter()
            .position(|key| key == &public_key)
        else {
            bail!("public key is not part of the multisig");
        };

        if self
            .keys_signed
            .get(index)
            .map_err(|err| anyhow!("keys_signed out of bounds: {err:?}"))?
        {
            return Ok(());
        }

        let participant_message = participant_message(message, &public_key);
        let signature = private_key.sign(&participant_message)?;

        // Insert so that signature order always matches ascending key index.
        let mut signatures = self.signatures.to_vec();
        let insert_at = (0..index)
            .filter(|i| self.keys_signed.get(*i).unwrap_or(false))
            .count();
        signatures.insert(insert_at, signature);
        self.signatures = VariableList::from(signatures);
        self.keys_signed
            .set(index, true)
            .map_err(|err| anyhow!("keys_signed out of bounds: {err:?}"))?;
        Ok(())
    }

    /// Verify the collected signatures over `message`, requiring at least
    /// `num_needed` participants.
    pub fn verify(&self, message: &[u8]) -> anyhow::Result<bool> {
        ensure!(
            self.keys_signed.len() == self.public_key.public_keys.len(),
            "keys_signed length does not match public key count"
        );
        if (self.signatures.len() as u64) < self.public_key.num_needed {
            return Ok(false);
        }

        let signed_keys = self
            .public_key
            .public_keys
            .iter()
            .enumerate()
            .filter(|(index, _)| self.keys_signed.get(*index).unwrap_or(false))
            .map(|(_, key)| key)
            .collect::<Vec<_>>();
        if signed_keys.len() != self.signatures.len() {
            return Ok(false);
        }

        for (signature, public_key) in self.signatures.iter().zip(signed_keys) {
            let participant_message = participant_message(message, public_key);
            if !signature.verify(public_key, &participant_message)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn participant_message(message: &[u8], public_key: &PubKey) -> Vec<u8> {
    let mut preimage = message.to_vec();
    preimage.extend_from_slice(public_key.to_bytes());
    hash(&preimage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keys(count: u8) -> Vec<PrivateKey> {
        (0..count)
            .map(|seed| PrivateKey::key_gen(&[seed + 1; 32]).unwrap())
            .collect()
    }

    #[test]
    fn threshold_verification() {
        let keys = test_keys(5);
        let public_keys = keys
            .iter()
            .map(|key| key.public_key().unwrap())
            .collect::<Vec<_>>();
        let multipub = Multipub::new(public_keys, 3);
        let mut multisig = Multisig::new(multipub).unwrap();

        let message = b"replace the managers";
        multisig.sign(&keys[0], message).unwrap();
        multisig.sign(&keys[4], message).unwrap();
        assert!(!multisig.verify(message).unwrap());

        multisig.sign(&keys[2], message).unwrap();
        assert!(multisig.verify(message).unwrap());
        assert!(!multisig.verify(b"another message").unwrap());
    }

    #[test]
    fn double_sign_is_noop() {
        let keys = test_keys(2);
        let public_keys = keys
            .iter()
            .map(|key| key.public_key().unwrap())
            .collect::<Vec<_>>();
        let mut multisig = Multisig::new(Multipub::new(public_keys, 2)).unwrap();

        multisig.sign(&keys[1], b"msg").unwrap();
        multisig.sign(&keys[1], b"msg").unwrap();
        assert_eq!(multisig.signatures.len(), 1);
    }

    #[test]
    fn foreign_key_rejected() {
        let keys = test_keys(3);
        let public_keys = keys[..2]
            .iter()
            .map(|key| key.public_key().unwrap())
            .collect::<Vec<_>>();
        let mut multisig = Multisig::new(Multipub::new(public_keys, 1)).unwrap();
        assert!(multisig.sign(&keys[2], b"msg").is_err());
    }
}
