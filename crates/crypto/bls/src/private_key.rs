use alloy_primitives::B256;
use anyhow::anyhow;
use blst::min_pk::SecretKey as BlstSecretKey;
use ssz_derive::{Decode, Encode};
use ssz_types::FixedVector;
use tree_hash_derive::TreeHash;

use crate::{
    constants::DST,
    pubkey::PubKey,
    signature::BLSSignature,
    traits::Signable,
};

#[derive(Debug, PartialEq, Clone, Encode, Decode, TreeHash, Default, Eq, Hash)]
pub struct PrivateKey {
    pub inner: B256,
}

impl PrivateKey {
    /// Derive a private key from at least 32 bytes of input key material.
    pub fn key_gen(ikm: &[u8]) -> anyhow::Result<Self> {
        let secret_key = BlstSecretKey::key_gen(ikm, &[])
            .map_err(|err| anyhow!("Failed to generate secret key: {err:?}"))?;
        Ok(PrivateKey {
            inner: B256::from_slice(&secret_key.to_bytes()),
        })
    }

    pub fn public_key(&self) -> anyhow::Result<PubKey> {
        let secret_key = BlstSecretKey::from_bytes(self.inner.as_slice())
            .map_err(|err| anyhow!("Failed to convert to BlstSecretKey: {err:?}"))?;
        Ok(PubKey::try_from(secret_key.sk_to_pk())?)
    }
}

impl Signable for PrivateKey {
    type Error = anyhow::Error;

    fn sign(&self, message: &[u8]) -> Result<BLSSignature, Self::Error> {
        let private_key = BlstSecretKey::from_bytes(self.inner.as_slice())
            .map_err(|err| anyhow!("Failed to convert to BlstSecretKey: {err:?}"))?;
        let signature = private_key.sign(message, DST, &[]);
        Ok(BLSSignature {
            inner: FixedVector::new(signature.compress().to_vec())
                .map_err(|err| anyhow!("Failed to create BLSSignature: {err:?}"))?,
        })
    }
}
