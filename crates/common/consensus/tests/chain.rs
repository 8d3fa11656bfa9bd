mod common;

use olympus_bls::traits::Signable;
use olympus_consensus::{
    receipt::ReceiptKind,
    state::State,
    transfer::Transfer,
    validator::ValidatorStatus,
};
use ssz::{Decode, Encode};

use crate::common::Harness;

#[test]
fn unanimous_voting_justifies_and_finalizes() {
    let mut harness = Harness::new(10);
    harness.run_chain(21, &[]);

    assert_eq!(harness.state.epoch_index, 4);
    assert_eq!(harness.state.justified_epoch, 2);
    assert_eq!(harness.state.finalized_epoch, 1);

    // Everyone voted every epoch, so every validator collected rewards.
    let deposit = harness.params.deposit_amount * harness.params.units_per_coin;
    for validator in harness.state.validator_registry.iter() {
        assert!(validator.balance > deposit);
        assert_eq!(validator.status, ValidatorStatus::Active);
    }
}

#[test]
fn abstaining_validator_is_penalized_after_the_grace_period() {
    let mut harness = Harness::new(10);
    let abstainer = 9;
    let receipts = harness.run_chain(36, &[abstainer]);

    // Finality keeps advancing on the 9/10 majority.
    assert!(harness.state.finalized_epoch >= 4);

    // The abstainer still proposes blocks and collects inclusion rewards for
    // the votes it packs, so measure its voting record net of that income.
    let proposer_income: u64 = receipts
        .iter()
        .filter(|receipt| {
            receipt.validator == abstainer
                && matches!(
                    receipt.kind,
                    ReceiptKind::RewardIncludedVote | ReceiptKind::RewardInclusionDistance
                )
        })
        .map(|receipt| receipt.amount)
        .sum();
    let deposit = harness.params.deposit_amount * harness.params.units_per_coin;
    let abstainer_balance = harness.state.validator_registry[abstainer as usize].balance;
    assert!(abstainer_balance - proposer_income < deposit);
    for (index, validator) in harness.state.validator_registry.iter().enumerate() {
        if index as u64 != abstainer {
            assert!(validator.balance > abstainer_balance);
        }
    }
    assert!(receipts.iter().any(|receipt| {
        receipt.validator == abstainer && receipt.kind == ReceiptKind::PenaltyMissingFromEpoch
    }));
}

#[test]
fn justification_needs_two_thirds_of_the_stake() {
    // 9 equal stakes: 6 voters sit exactly on the 2/3 boundary, 5 sit below.
    let mut at_boundary = Harness::new(9);
    at_boundary.run_chain(20, &[6, 7, 8]);
    assert_eq!(at_boundary.state.justified_epoch, 2);

    let below_boundary = {
        let mut harness = Harness::new(9);
        harness.run_chain(20, &[5, 6, 7, 8]);
        harness
    };
    assert_eq!(below_boundary.state.justified_epoch, 0);
}

#[test]
fn state_survives_an_ssz_round_trip() {
    let mut harness = Harness::new(10);
    harness.run_chain(8, &[]);
    harness
        .state
        .governance
        .replace_votes
        .insert(alloy_primitives::Address::repeat_byte(0x11), harness.state.hash());

    let bytes = harness.state.as_ssz_bytes();
    let decoded = State::from_ssz_bytes(&bytes).expect("state should decode");
    assert_eq!(decoded, harness.state);
    assert_eq!(decoded.hash(), harness.state.hash());
}

#[test]
fn invalid_operation_leaves_the_state_untouched() {
    let mut harness = Harness::new(10);
    harness.run_chain(6, &[]);
    harness.advance_to(7);

    let premine_key = harness.premine_key.clone();
    let premine_address = premine_key.public_key().unwrap().to_address();
    let balance = harness.state.coins_state.get_balance(&premine_address);

    // Overspending transfer with an otherwise valid signature.
    let mut transfer = Transfer {
        to: alloy_primitives::Address::repeat_byte(0x77),
        from_public_key: premine_key.public_key().unwrap(),
        amount: balance + 1,
        nonce: 1,
        fee: 0,
        signature: Default::default(),
    };
    transfer.signature = premine_key
        .sign(transfer.signature_message().as_slice())
        .unwrap();

    let block = harness.build_block(|_, block| {
        block.txs.push(transfer.clone()).unwrap();
    });

    let before = harness.state.hash();
    assert!(
        harness
            .state
            .process_block(&block, &harness.params)
            .is_err()
    );
    assert_eq!(harness.state.hash(), before);
}

#[test]
fn replayed_block_is_rejected() {
    let mut harness = Harness::new(10);
    harness.run_chain(4, &[]);
    harness.advance_to(5);

    let block = harness.build_block(|_, _| {});
    harness
        .state
        .process_block(&block, &harness.params)
        .expect("block should apply");
    harness.advance_to(6);
    // The slot no longer matches once the chain moves on.
    assert!(
        harness
            .state
            .process_block(&block, &harness.params)
            .is_err()
    );
}
