//! Attestation-to-finality scenarios across the engine facade.

use crate::fixtures::{attest, engine, keypair, register, HybridChain, MapLedger};
use hybrid_consensus::{
    ConsensusError, SlashingReason, MINER_REWARD, VALIDATOR_REWARD,
};
use shared_types::{BlockHeader, Hash, U256};

#[test]
fn two_of_three_validators_finalize_a_block() {
    let engine = engine();
    let (a, b, c) = (keypair(), keypair(), keypair());
    register(&engine, &[(&a, 40), (&b, 30), (&c, 30)]);

    let hash = Hash::repeat_byte(0xa1);

    engine.add_attestation(attest(&a, hash, 100)).unwrap();
    assert!(!engine.is_finalized(100));

    // 70 of 100 stake crosses the 67 percent threshold.
    engine.add_attestation(attest(&b, hash, 100)).unwrap();
    assert!(engine.is_finalized(100));
    assert_eq!(engine.finalized_block(100), Some(hash));
    assert_eq!(engine.last_finalized_block(), 100);

    // The late attester is still accepted; finality is unchanged.
    engine.add_attestation(attest(&c, hash, 100)).unwrap();
    assert_eq!(engine.attestations(&hash).unwrap().attester_count(), 3);
}

#[test]
fn minority_stake_does_not_finalize() {
    let engine = engine();
    let (a, b, c) = (keypair(), keypair(), keypair());
    register(&engine, &[(&a, 40), (&b, 30), (&c, 30)]);

    let hash = Hash::repeat_byte(0xa2);
    engine.add_attestation(attest(&c, hash, 200)).unwrap();

    assert!(!engine.is_finalized(200));
    assert_eq!(engine.finalized_block(200), None);

    let status = engine.finality_status(200, hash);
    assert_eq!(status.attester_count, 1);
    assert!((status.stake_percent - 30.0).abs() < 0.001);
}

#[test]
fn equivocating_validator_is_detected_and_rejected() {
    let engine = engine();
    let v = keypair();
    register(&engine, &[(&v, 100)]);

    let first = Hash::repeat_byte(0xb1);
    let second = Hash::repeat_byte(0xb2);

    engine.add_attestation(attest(&v, first, 10)).unwrap();

    let err = engine.add_attestation(attest(&v, second, 10)).unwrap_err();
    assert!(matches!(err, ConsensusError::InvalidAttestation { .. }));

    // The offense is queued and the second hash gained no attestation set.
    let pending = engine.pending_slashes();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].validator, v.address());
    assert_eq!(pending[0].reason, SlashingReason::DoubleAttestation);
    assert!(engine.attestations(&second).is_none());

    // Draining empties the queue for the next consumer.
    assert_eq!(engine.slashing().drain().len(), 1);
    assert!(engine.pending_slashes().is_empty());
}

#[test]
fn finalized_height_blocks_reorgs_below_it() {
    let engine = engine();
    let v = keypair();
    register(&engine, &[(&v, 100)]);

    let hash = Hash::repeat_byte(0xc1);
    engine.add_attestation(attest(&v, hash, 100)).unwrap();
    assert!(engine.is_finalized(100));

    assert!(!engine.can_reorg(99));
    assert!(engine.can_reorg(100));
    assert!(engine.can_reorg(150));
}

#[test]
fn finality_survives_later_non_finalizing_attestations() {
    let engine = engine();
    let (a, b) = (keypair(), keypair());
    register(&engine, &[(&a, 80), (&b, 20)]);

    let finalized = Hash::repeat_byte(0xd1);
    engine.add_attestation(attest(&a, finalized, 50)).unwrap();
    assert!(engine.is_finalized(50));

    // A competing hash at a later height gathers only minority stake.
    let competing = Hash::repeat_byte(0xd2);
    engine.add_attestation(attest(&b, competing, 51)).unwrap();

    assert!(engine.is_finalized(50));
    assert!(!engine.is_finalized(51));
    assert_eq!(engine.last_finalized_block(), 50);
}

#[test]
fn reward_split_pays_miner_and_pools_validator_share() {
    let engine = engine();
    let (a, b) = (keypair(), keypair());
    register(&engine, &[(&a, 60), (&b, 40)]);

    // Both validators come online by attesting.
    let hash = Hash::repeat_byte(0xe1);
    engine.add_attestation(attest(&a, hash, 7)).unwrap();
    engine.add_attestation(attest(&b, hash, 7)).unwrap();

    let chain = HybridChain::default();
    let miner = shared_types::Address::repeat_byte(0x0a);
    let mut header = BlockHeader {
        number: 8,
        coinbase: miner,
        ..Default::default()
    };
    let mut ledger = MapLedger::default();

    engine.finalize(&chain, &mut header, &mut ledger, &[], &[]);

    assert_eq!(ledger.balances[&miner], MINER_REWARD);

    // Two online validators: each half of the reward lands in the staking
    // contract, so the pool receives the full (evenly divisible) amount.
    let pool = ledger.balances[&engine.config().staking_contract];
    assert_eq!(pool, VALIDATOR_REWARD / U256::from(2u64) * U256::from(2u64));
    assert_eq!(engine.pending_validator_reward(), VALIDATOR_REWARD);

    // The state root was recomputed through the ledger.
    assert_eq!(header.root, Hash::repeat_byte(0x42));
}

#[test]
fn offline_validators_surface_in_the_pending_queue() {
    let engine = engine();
    let (active, silent) = (keypair(), keypair());
    register(&engine, &[(&active, 50), (&silent, 50)]);

    engine
        .add_attestation(attest(&active, Hash::repeat_byte(0xf1), 2000))
        .unwrap();

    let offenses = engine.check_offline(2500);

    // Both validators started at last_attestation 0, but the active one was
    // seen at height 2000; only the silent one is past the threshold.
    assert_eq!(offenses.len(), 1);
    assert_eq!(offenses[0].validator, silent.address());
    assert_eq!(offenses[0].reason, SlashingReason::Offline);
}
