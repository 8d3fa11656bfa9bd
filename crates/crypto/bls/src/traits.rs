use crate::{errors::BLSError, pubkey::PubKey, signature::BLSSignature};

pub trait Signable {
    type Error;

    fn sign(&self, message: &[u8]) -> Result<BLSSignature, Self::Error>;
}

pub trait Verifiable {
    type Error;

    /// Verifies the signature against a single public key and message.
    fn verify(&self, pubkey: &PubKey, message: &[u8]) -> Result<bool, Self::Error>;

    /// Verifies the signature against the aggregate of multiple public keys
    /// over a single shared message.
    fn fast_aggregate_verify<'a, P>(&self, pubkeys: P, message: &[u8]) -> Result<bool, Self::Error>
    where
        P: AsRef<[&'a PubKey]>;
}

pub trait Aggregatable: Sized {
    type Error;

    fn aggregate(items: &[&Self]) -> Result<Self, Self::Error>;
}

pub trait SupranationalVerifiable: Verifiable<Error = BLSError> {}
