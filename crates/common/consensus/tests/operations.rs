mod common;

use alloy_primitives::Address;
use ethereum_hashing::hash_fixed;
use olympus_bls::{PrivateKey, traits::Signable};
use olympus_consensus::{
    deposit::{Deposit, DepositData},
    exit::Exit,
    validator::ValidatorStatus,
};
use tree_hash::TreeHash;

use crate::common::Harness;

fn funded_deposit(harness: &Harness, validator_key: &PrivateKey) -> Deposit {
    let validator_pubkey = validator_key.public_key().unwrap();
    let data = DepositData {
        proof_of_possession: validator_key
            .sign(&hash_fixed(validator_pubkey.to_bytes()))
            .unwrap(),
        public_key: validator_pubkey,
        withdrawal_address: Address::repeat_byte(0x90),
    };
    Deposit {
        public_key: harness.premine_key.public_key().unwrap(),
        signature: harness
            .premine_key
            .sign(data.tree_hash_root().as_slice())
            .unwrap(),
        data,
    }
}

#[test]
fn deposit_locks_stake_and_registers_a_starting_validator() {
    let mut harness = Harness::new(4);
    let new_key = PrivateKey::key_gen(&[0x90; 32]).unwrap();
    let deposit = funded_deposit(&harness, &new_key);

    let from = harness.premine_key.public_key().unwrap().to_address();
    let before = harness.state.coins_state.get_balance(&from);
    let amount = harness.params.deposit_amount * harness.params.units_per_coin;

    harness
        .state
        .apply_deposit(&deposit, &harness.params)
        .expect("deposit should apply");

    assert_eq!(
        harness.state.coins_state.get_balance(&from),
        before - amount
    );
    let validator = harness.state.validator_registry.last().unwrap();
    assert_eq!(validator.status, ValidatorStatus::Starting);
    assert_eq!(validator.balance, amount);
    assert_eq!(validator.first_active_epoch, harness.state.epoch_index + 2);
    assert_eq!(validator.payee_address, Address::repeat_byte(0x90));
}

#[test]
fn duplicate_validator_key_is_rejected() {
    let mut harness = Harness::new(4);
    let new_key = PrivateKey::key_gen(&[0x90; 32]).unwrap();
    let deposit = funded_deposit(&harness, &new_key);

    harness
        .state
        .apply_deposit(&deposit, &harness.params)
        .expect("deposit should apply");
    assert!(harness.state.apply_deposit(&deposit, &harness.params).is_err());
}

#[test]
fn deposit_without_proof_of_possession_is_rejected() {
    let mut harness = Harness::new(4);
    let new_key = PrivateKey::key_gen(&[0x90; 32]).unwrap();
    let other_key = PrivateKey::key_gen(&[0x91; 32]).unwrap();

    let mut deposit = funded_deposit(&harness, &new_key);
    // Possession proved by the wrong key.
    deposit.data.proof_of_possession = other_key
        .sign(&hash_fixed(new_key.public_key().unwrap().to_bytes()))
        .unwrap();
    deposit.signature = harness
        .premine_key
        .sign(deposit.data.tree_hash_root().as_slice())
        .unwrap();

    assert!(harness.state.apply_deposit(&deposit, &harness.params).is_err());
}

#[test]
fn exit_signed_by_the_payee_key_queues_the_validator() {
    let mut harness = Harness::new(4);
    let mut exit = Exit {
        validator_public_key: harness.keys[0].public_key().unwrap(),
        withdraw_public_key: harness.payee_keys[0].public_key().unwrap(),
        signature: Default::default(),
    };
    exit.signature = harness.payee_keys[0]
        .sign(&exit.signature_message())
        .unwrap();

    harness.state.apply_exit(&exit).expect("exit should apply");

    let validator = &harness.state.validator_registry[0];
    assert_eq!(validator.status, ValidatorStatus::ActivePendingExit);
    assert_eq!(
        validator.last_active_epoch,
        harness.state.epoch_index + 2
    );
}

#[test]
fn exit_signed_by_a_foreign_key_is_rejected() {
    let mut harness = Harness::new(4);
    let mut exit = Exit {
        validator_public_key: harness.keys[0].public_key().unwrap(),
        withdraw_public_key: harness.payee_keys[1].public_key().unwrap(),
        signature: Default::default(),
    };
    exit.signature = harness.payee_keys[1]
        .sign(&exit.signature_message())
        .unwrap();
    assert!(harness.state.apply_exit(&exit).is_err());
}
