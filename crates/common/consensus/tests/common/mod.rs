#![allow(dead_code)]

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use olympus_bls::{
    BLSSignature, PrivateKey,
    traits::{Aggregatable, Signable},
};
use olympus_chain_spec::{ChainParams, TESTNET};
use olympus_consensus::{
    block::Block,
    block_transition::randao_signature_message,
    genesis::{InitializationParameters, ValidatorInitialization},
    receipt::EpochReceipt,
    state::State,
    view::BlockView,
    vote::{MultiValidatorVote, VoteData},
};
use ssz_types::BitList;

/// A minimal chain context: a single advancing tip.
pub struct ChainView {
    pub tip: B256,
}

impl BlockView for ChainView {
    fn get_hash_by_slot(&self, _slot: u64) -> anyhow::Result<B256> {
        Ok(self.tip)
    }

    fn tip(&self) -> anyhow::Result<B256> {
        Ok(self.tip)
    }

    fn set_tip_slot(&mut self, _slot: u64) {}

    fn get_last_state_root(&self) -> anyhow::Result<B256> {
        Ok(B256::ZERO)
    }
}

/// A deterministic single-node chain for driving the state transition in
/// tests: every validator key is derived from its registry index.
pub struct Harness {
    pub params: Arc<ChainParams>,
    pub keys: Vec<PrivateKey>,
    pub payee_keys: Vec<PrivateKey>,
    pub premine_key: PrivateKey,
    pub state: State,
    pub view: ChainView,
}

pub fn validator_key(index: usize) -> PrivateKey {
    PrivateKey::key_gen(&[index as u8 + 1; 32]).expect("key generation should succeed")
}

pub fn payee_key(index: usize) -> PrivateKey {
    PrivateKey::key_gen(&[index as u8 + 0x41; 32]).expect("key generation should succeed")
}

impl Harness {
    pub fn new(validators: usize) -> Self {
        Self::with_params(validators, TESTNET.clone())
    }

    pub fn with_params(validators: usize, params: Arc<ChainParams>) -> Self {
        let keys: Vec<PrivateKey> = (0..validators).map(validator_key).collect();
        let payee_keys: Vec<PrivateKey> = (0..validators).map(payee_key).collect();
        let premine_key = PrivateKey::key_gen(&[0xf0; 32]).expect("key generation should succeed");
        let ip = InitializationParameters {
            initial_validators: keys
                .iter()
                .zip(payee_keys.iter())
                .map(|(key, payee)| ValidatorInitialization {
                    public_key: key.public_key().expect("public key should derive"),
                    payee_address: payee
                        .public_key()
                        .expect("public key should derive")
                        .to_address(),
                })
                .collect(),
            premine_address: premine_key
                .public_key()
                .expect("public key should derive")
                .to_address(),
            genesis_time: 1_600_000_000,
        };
        let state = State::genesis(&ip, &params).expect("genesis should succeed");
        Harness {
            params,
            keys,
            payee_keys,
            premine_key,
            state,
            view: ChainView { tip: B256::ZERO },
        }
    }

    pub fn advance_to(&mut self, slot: u64) -> Vec<EpochReceipt> {
        self.state
            .process_slots(slot, &mut self.view, &self.params)
            .expect("slot processing should succeed")
    }

    /// Build an aggregate vote for `vote_slot` signed by the whole committee,
    /// minus any validator in `abstainers`. The vote targets and sources
    /// exactly what the epoch transition will compare against. Returns `None`
    /// when every committee member abstained: an empty aggregate is not a
    /// valid signature.
    pub fn build_vote(&self, vote_slot: u64, abstainers: &[u64]) -> Option<MultiValidatorVote> {
        let params = &self.params;
        let state = &self.state;
        let to_epoch = (vote_slot - 1) / params.epoch_length;
        let (from_epoch, from_hash) = if to_epoch == state.epoch_index {
            (state.justified_epoch, state.justified_epoch_hash)
        } else {
            (
                state.previous_justified_epoch,
                state.previous_justified_epoch_hash,
            )
        };
        let to_hash = if to_epoch == 0 {
            B256::ZERO
        } else {
            state.get_recent_block_hash(to_epoch * params.epoch_length - 1, params)
        };
        let data = VoteData {
            slot: vote_slot,
            from_epoch,
            from_hash,
            to_epoch,
            to_hash,
            beacon_block_hash: state.get_recent_block_hash(vote_slot - 1, params),
        };

        let committee = state
            .get_vote_committee(vote_slot, params)
            .expect("committee should exist");
        let mut participation_bitfield =
            BitList::with_capacity(committee.len()).expect("bitfield should size");
        let mut signatures = Vec::new();
        for (position, validator) in committee.iter().enumerate() {
            if abstainers.contains(validator) {
                continue;
            }
            participation_bitfield
                .set(position, true)
                .expect("bit should set");
            signatures.push(
                self.keys[*validator as usize]
                    .sign(data.hash().as_slice())
                    .expect("signing should succeed"),
            );
        }
        if signatures.is_empty() {
            return None;
        }
        let signature = BLSSignature::aggregate(&signatures.iter().collect::<Vec<_>>())
            .expect("aggregation should succeed");
        Some(MultiValidatorVote {
            data,
            signature,
            participation_bitfield,
        })
    }

    /// Fill, seal, sign, and apply a block at the state's current slot.
    pub fn produce_block<F: FnOnce(&Harness, &mut Block)>(&mut self, fill: F) {
        let block = self.build_block(fill);
        self.state
            .process_block(&block, &self.params)
            .expect("block should apply");
        self.view.tip = block.hash();
    }

    /// Build a signed block at the state's current slot without applying it.
    pub fn build_block<F: FnOnce(&Harness, &mut Block)>(&mut self, fill: F) -> Block {
        let slot = self.state.slot;
        let mut block = Block::default();
        fill(self, &mut block);
        block.header.slot = slot;
        block.header.prev_block_hash = self.view.tip;
        block.header.timestamp = slot;
        block.header.fee_address = Address::repeat_byte(0xfe);
        block.header.tx_merkle_root = block.tx_merkle_root();
        block.header.vote_merkle_root = block.vote_merkle_root();
        block.header.deposit_merkle_root = block.deposit_merkle_root();
        block.header.exit_merkle_root = block.exit_merkle_root();
        block.header.vote_slashing_merkle_root = block.vote_slashing_merkle_root();
        block.header.randao_slashing_merkle_root = block.randao_slashing_merkle_root();
        block.header.proposer_slashing_merkle_root = block.proposer_slashing_merkle_root();
        block.header.governance_vote_merkle_root = block.governance_vote_merkle_root();

        let proposer = self
            .state
            .get_proposer_index(slot, &self.params)
            .expect("proposer should be scheduled");
        let key = &self.keys[proposer as usize];
        block.signature = key
            .sign(block.header.hash().as_slice())
            .expect("signing should succeed");
        block.randao_signature = key
            .sign(randao_signature_message(slot).as_slice())
            .expect("signing should succeed");
        block
    }

    /// Drive the chain to `to_slot`, one block per slot, each block carrying
    /// the previous slot's committee vote (minus `abstainers`).
    pub fn run_chain(&mut self, to_slot: u64, abstainers: &[u64]) -> Vec<EpochReceipt> {
        let mut receipts = Vec::new();
        for slot in self.state.slot + 1..=to_slot {
            receipts.extend(self.advance_to(slot));
            let vote = if slot >= 2 {
                self.build_vote(slot - 1, abstainers)
            } else {
                None
            };
            self.produce_block(|_, block| {
                if let Some(vote) = vote {
                    block.votes.push(vote).expect("vote list should accept");
                }
            });
        }
        receipts
    }
}
