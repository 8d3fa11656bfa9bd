use std::str::FromStr;

use alloy_primitives::{Address, hex};
use anyhow::anyhow;
use blst::min_pk::{AggregatePublicKey as BlstAggregatePublicKey, PublicKey as BlstPublicKey};
use ethereum_hashing::hash;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz::Encode;
use ssz_derive::{Decode, Encode};
use ssz_types::{FixedVector, typenum::U48};
use tree_hash_derive::TreeHash;

use crate::{errors::BLSError, traits::Aggregatable};

#[derive(Debug, PartialEq, Clone, Encode, Decode, TreeHash, Default, Eq, Hash)]
pub struct PubKey {
    pub inner: FixedVector<u8, U48>,
}

impl Serialize for PubKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let val = format!("0x{}", hex::encode(self.inner.as_ssz_bytes()));
        serializer.serialize_str(&val)
    }
}

impl<'de> Deserialize<'de> for PubKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let result: String = Deserialize::deserialize(deserializer)?;
        let result = hex::decode(&result).map_err(serde::de::Error::custom)?;
        let key = FixedVector::from(result);
        Ok(Self { inner: key })
    }
}

impl FromStr for PubKey {
    type Err = BLSError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clean_str = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(clean_str).map_err(|_| BLSError::InvalidHexString)?;

        if bytes.len() != 48 {
            return Err(BLSError::InvalidByteLength);
        }

        Ok(PubKey {
            inner: FixedVector::from(bytes),
        })
    }
}

impl TryFrom<BlstPublicKey> for PubKey {
    type Error = BLSError;

    fn try_from(value: BlstPublicKey) -> Result<Self, Self::Error> {
        Ok(PubKey {
            inner: FixedVector::new(value.to_bytes().to_vec())
                .map_err(|_| BLSError::InvalidPublicKey)?,
        })
    }
}

impl PubKey {
    pub fn to_bytes(&self) -> &[u8] {
        self.inner.iter().as_slice()
    }

    /// Return the 20-byte account address of this key: the first 20 bytes of
    /// the SHA-256 hash of the serialized key.
    pub fn to_address(&self) -> Address {
        Address::from_slice(&hash(self.to_bytes())[..20])
    }

    pub fn to_blst_pubkey(&self) -> Result<BlstPublicKey, BLSError> {
        BlstPublicKey::from_bytes(&self.inner).map_err(BLSError::from)
    }
}

impl Aggregatable for PubKey {
    type Error = anyhow::Error;

    fn aggregate(pubkeys: &[&PubKey]) -> anyhow::Result<PubKey> {
        let blst_pubkeys = pubkeys
            .iter()
            .map(|pubkey| pubkey.to_blst_pubkey())
            .collect::<Result<Vec<_>, _>>()?;
        let aggregate_pubkey =
            BlstAggregatePublicKey::aggregate(&blst_pubkeys.iter().collect::<Vec<_>>(), true)
                .map_err(|err| anyhow!("Failed to aggregate and validate public keys {err:?}"))?;
        Ok(PubKey::try_from(aggregate_pubkey.to_public_key())?)
    }
}
