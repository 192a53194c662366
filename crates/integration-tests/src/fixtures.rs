//! Test doubles for the overlay's external collaborators.

use hybrid_consensus::{
    Attestation, ChainReader, ConsensusResult, EngineConfig, HybridEngine, PowEngine, StateLedger,
    ValidatorInfo,
};
use shared_crypto::ValidatorKeypair;
use shared_types::{Address, BlockHeader, BlockNumber, ChainConfig, Hash, Transaction, U256};
use std::collections::HashMap;

/// PoW engine that accepts everything and pays nothing.
pub struct NullPow;

impl PowEngine for NullPow {
    fn author(&self, header: &BlockHeader) -> ConsensusResult<Address> {
        Ok(header.coinbase)
    }
    fn verify_header(
        &self,
        _chain: &dyn ChainReader,
        _header: &BlockHeader,
        _seal: bool,
    ) -> ConsensusResult<()> {
        Ok(())
    }
    fn verify_uncles(
        &self,
        _chain: &dyn ChainReader,
        _header: &BlockHeader,
        _uncles: &[BlockHeader],
    ) -> ConsensusResult<()> {
        Ok(())
    }
    fn prepare(&self, _chain: &dyn ChainReader, _header: &mut BlockHeader) -> ConsensusResult<()> {
        Ok(())
    }
    fn finalize(
        &self,
        _chain: &dyn ChainReader,
        _header: &mut BlockHeader,
        _state: &mut dyn StateLedger,
        _txs: &[Transaction],
        _uncles: &[BlockHeader],
    ) {
    }
    fn seal(&self, _chain: &dyn ChainReader, header: BlockHeader) -> ConsensusResult<BlockHeader> {
        Ok(header)
    }
    fn seal_hash(&self, _header: &BlockHeader) -> Hash {
        Hash::zero()
    }
    fn calc_difficulty(
        &self,
        _chain: &dyn ChainReader,
        _timestamp: u64,
        _parent: &BlockHeader,
    ) -> U256 {
        U256::one()
    }
    fn hashrate(&self) -> f64 {
        0.0
    }
    fn close(&self) -> ConsensusResult<()> {
        Ok(())
    }
}

/// Chain reader with hybrid rules active from genesis.
pub struct HybridChain {
    config: ChainConfig,
}

impl Default for HybridChain {
    fn default() -> Self {
        Self {
            config: ChainConfig {
                chain_id: 2330,
                hybrid_block: Some(0),
                das_block: Some(0),
                eip158_block: Some(0),
                ..Default::default()
            },
        }
    }
}

impl ChainReader for HybridChain {
    fn config(&self) -> &ChainConfig {
        &self.config
    }
    fn current_height(&self) -> BlockNumber {
        1024
    }
    fn header(&self, number: BlockNumber) -> Option<BlockHeader> {
        Some(BlockHeader {
            number,
            ..Default::default()
        })
    }
    fn block_hash(&self, number: BlockNumber) -> Option<Hash> {
        Some(Hash::from_low_u64_be(number))
    }
}

/// Balance-map ledger with a constant intermediate root.
#[derive(Default)]
pub struct MapLedger {
    pub balances: HashMap<Address, U256>,
}

impl StateLedger for MapLedger {
    fn add_balance(&mut self, address: &Address, amount: U256) {
        *self.balances.entry(*address).or_default() += amount;
    }
    fn intermediate_root(&mut self, _eip158: bool) -> Hash {
        Hash::repeat_byte(0x42)
    }
}

/// Engine with a scaled-down minimum stake, suitable for unit-stake tests.
pub fn engine() -> HybridEngine<NullPow> {
    let config = EngineConfig {
        min_stake: U256::from(10u64),
        ..Default::default()
    };
    HybridEngine::new(config, NullPow)
}

/// Register keypairs as validators with the given stakes.
pub fn register(engine: &HybridEngine<NullPow>, stakes: &[(&ValidatorKeypair, u64)]) {
    let snapshot = stakes
        .iter()
        .map(|(kp, stake)| {
            let address = kp.address();
            (
                address,
                ValidatorInfo {
                    address,
                    stake: U256::from(*stake),
                    active: true,
                    last_attestation: 0,
                },
            )
        })
        .collect();
    engine.update_validators(snapshot);
}

/// A signed attestation from `kp` to `(hash, number)`.
pub fn attest(kp: &ValidatorKeypair, hash: Hash, number: BlockNumber) -> Attestation {
    let mut attestation = Attestation::new(kp.address(), hash, number);
    attestation.sign(kp);
    attestation
}

/// A fresh random validator keypair.
pub fn keypair() -> ValidatorKeypair {
    ValidatorKeypair::generate(&mut rand::thread_rng())
}
