//! Hybrid engine facade.
//!
//! Wraps the external PoW engine and adds the attestation, finality and
//! slashing machinery on top. Miners keep producing blocks through PoW;
//! validators with sufficient stake attest to blocks, and attestations from
//! two thirds of active stake finalize them.
//!
//! Lock order: facade, then slashing, then registry, then finality. The
//! facade lock is held across the whole attestation insertion sequence; the
//! subsystem locks are taken one at a time and never in reverse order.

use crate::config::{EngineConfig, MINER_REWARD, VALIDATOR_REWARD};
use crate::domain::{
    Attestation, BlockAttestations, FinalityStatus, FinalityTracker, SlashableOffense,
    SlashingDetector, StakeView, ValidatorInfo, ValidatorRegistry,
};
use crate::error::{ConsensusError, ConsensusResult};
use crate::metrics;
use crate::ports::{ChainReader, PowEngine, StateLedger};
use lru::LruCache;
use parking_lot::Mutex;
use shared_types::{Address, BlockHeader, BlockNumber, Hash, Transaction, U256};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use tracing::{debug, warn};

struct EngineInner {
    /// Block hash to its attestation set, bounded to twice the window.
    attestations: LruCache<Hash, BlockAttestations>,
    /// Validator reward recorded by the latest finalization, for reporting.
    pending_validator_reward: U256,
}

/// The hybrid PoW/PoS consensus engine.
pub struct HybridEngine<P: PowEngine> {
    config: EngineConfig,
    pow: P,
    inner: Mutex<EngineInner>,
    registry: ValidatorRegistry,
    finality: FinalityTracker,
    slashing: SlashingDetector,
}

/// Registry-plus-config view handed to the finality tracker.
struct RegistryStakeView<'a> {
    registry: &'a ValidatorRegistry,
    threshold: u64,
}

impl StakeView for RegistryStakeView<'_> {
    fn validators(&self) -> HashMap<Address, ValidatorInfo> {
        self.registry.snapshot()
    }
    fn total_active_stake(&self) -> U256 {
        self.registry.total_active_stake()
    }
    fn active_count(&self) -> usize {
        self.registry.active_count()
    }
    fn finality_threshold(&self) -> u64 {
        self.threshold
    }
}

impl<P: PowEngine> HybridEngine<P> {
    /// Create an engine around an existing PoW engine.
    pub fn new(config: EngineConfig, pow: P) -> Self {
        let window = (config.attestation_window as usize).max(1) * 2;
        Self {
            config,
            pow,
            inner: Mutex::new(EngineInner {
                attestations: LruCache::new(
                    NonZeroUsize::new(window).expect("window is non-zero"),
                ),
                pending_validator_reward: U256::zero(),
            }),
            registry: ValidatorRegistry::new(),
            finality: FinalityTracker::new(),
            slashing: SlashingDetector::new(),
        }
    }

    fn stake_view(&self) -> RegistryStakeView<'_> {
        RegistryStakeView {
            registry: &self.registry,
            threshold: self.config.finality_threshold,
        }
    }

    /// Accept a validator attestation.
    ///
    /// Runs under the facade lock: verify the signature, check the validator
    /// against the registry, consult the slashing detector, insert into the
    /// per-block set and re-check finality. Offenses detected on the way are
    /// queued before the attestation is rejected.
    pub fn add_attestation(&self, attestation: Attestation) -> ConsensusResult<()> {
        let mut inner = self.inner.lock();

        self.verify_attestation(&attestation)?;

        if let Some(offense) = self.slashing.check_attestation(&attestation) {
            warn!(
                validator = %attestation.validator,
                reason = ?offense.reason,
                "slashable attestation rejected"
            );
            metrics::record_attestation_rejected("slashable");
            return Err(ConsensusError::InvalidAttestation {
                validator: attestation.validator,
            });
        }

        let block_hash = attestation.block_hash;
        let block_number = attestation.block_number;
        let validator = attestation.validator;

        if !inner.attestations.contains(&block_hash) {
            inner
                .attestations
                .put(block_hash, BlockAttestations::new(block_hash, block_number));
        }
        let set = inner
            .attestations
            .get_mut(&block_hash)
            .expect("attestation set inserted above");

        set.add(attestation)?;
        self.registry.set_last_attestation(&validator, block_number);
        metrics::record_attestation_processed();

        // A non-finalizing insert does not change the return value.
        if self.finality.check_finality(block_hash, set, &self.stake_view()) {
            metrics::record_block_finalized();
        }

        debug!(
            block = %block_hash,
            validator = %validator,
            total = set.attester_count(),
            "attestation added"
        );

        Ok(())
    }

    fn verify_attestation(&self, attestation: &Attestation) -> ConsensusResult<()> {
        if !attestation.verify_signature() {
            metrics::record_attestation_rejected("invalid_signature");
            return Err(ConsensusError::InvalidAttestation {
                validator: attestation.validator,
            });
        }

        let validator = match self.registry.get(&attestation.validator) {
            Some(info) if info.active => info,
            _ => {
                metrics::record_attestation_rejected("not_active");
                return Err(ConsensusError::ValidatorNotActive {
                    validator: attestation.validator,
                });
            }
        };

        if validator.stake < self.config.min_stake {
            metrics::record_attestation_rejected("insufficient_stake");
            return Err(ConsensusError::InsufficientStake {
                stake: validator.stake,
                min_stake: self.config.min_stake,
            });
        }

        Ok(())
    }

    /// Post-transaction state modifications: the hybrid reward split.
    ///
    /// When hybrid rules are not active at the header height this delegates
    /// wholly to the PoW engine. When active, the miner receives the fixed
    /// miner reward (plus uncle bonuses) and the validator reward is pooled
    /// into the staking contract, split over the currently online validators.
    pub fn finalize(
        &self,
        chain: &dyn ChainReader,
        header: &mut BlockHeader,
        state: &mut dyn StateLedger,
        txs: &[Transaction],
        uncles: &[BlockHeader],
    ) {
        if !chain.config().is_hybrid(header.number) {
            self.pow.finalize(chain, header, state, txs, uncles);
            return;
        }

        let mut miner_reward = MINER_REWARD;

        // Uncle creators earn a depth-scaled fraction of the miner reward;
        // the miner earns a 1/32 bonus per included uncle.
        for uncle in uncles {
            let depth_weight = (uncle.number + 8).saturating_sub(header.number);
            let uncle_reward = U256::from(depth_weight) * MINER_REWARD / U256::from(8u64);
            state.add_balance(&uncle.coinbase, uncle_reward);
            miner_reward += MINER_REWARD / U256::from(32u64);
        }

        state.add_balance(&header.coinbase, miner_reward);

        let staking_contract = self.config.staking_contract;
        let online = self.registry.online();

        if online.is_empty() {
            // Nobody online: the whole reward sits in the contract pool.
            state.add_balance(&staking_contract, VALIDATOR_REWARD);
            debug!(
                block = header.number,
                reward = %VALIDATOR_REWARD,
                "no online validators, validator reward pooled"
            );
        } else {
            let per_validator = VALIDATOR_REWARD / U256::from(online.len() as u64);
            for _ in &online {
                state.add_balance(&staking_contract, per_validator);
            }
            debug!(
                block = header.number,
                online = online.len(),
                per_validator = %per_validator,
                "validator rewards pooled"
            );
        }

        self.inner.lock().pending_validator_reward = VALIDATOR_REWARD;

        header.root = state.intermediate_root(chain.config().is_eip158(header.number));
    }

    // ---- PoW delegation -------------------------------------------------

    /// The block author (miner) of a header.
    pub fn author(&self, header: &BlockHeader) -> ConsensusResult<Address> {
        self.pow.author(header)
    }

    /// Verify a header against the PoW rules.
    pub fn verify_header(
        &self,
        chain: &dyn ChainReader,
        header: &BlockHeader,
        seal: bool,
    ) -> ConsensusResult<()> {
        self.pow.verify_header(chain, header, seal)
    }

    /// Verify a block's uncles against the PoW rules.
    pub fn verify_uncles(
        &self,
        chain: &dyn ChainReader,
        header: &BlockHeader,
        uncles: &[BlockHeader],
    ) -> ConsensusResult<()> {
        self.pow.verify_uncles(chain, header, uncles)
    }

    /// Initialize the consensus fields of a header being produced.
    pub fn prepare(&self, chain: &dyn ChainReader, header: &mut BlockHeader) -> ConsensusResult<()> {
        self.pow.prepare(chain, header)
    }

    /// Seal a prepared block.
    pub fn seal(&self, chain: &dyn ChainReader, header: BlockHeader) -> ConsensusResult<BlockHeader> {
        self.pow.seal(chain, header)
    }

    /// Hash of a header prior to sealing.
    pub fn seal_hash(&self, header: &BlockHeader) -> Hash {
        self.pow.seal_hash(header)
    }

    /// Difficulty for a child of `parent` at `timestamp`.
    pub fn calc_difficulty(
        &self,
        chain: &dyn ChainReader,
        timestamp: u64,
        parent: &BlockHeader,
    ) -> U256 {
        self.pow.calc_difficulty(chain, timestamp, parent)
    }

    /// Current mining hash rate.
    pub fn hashrate(&self) -> f64 {
        self.pow.hashrate()
    }

    /// Tear down the wrapped engine.
    pub fn close(&self) -> ConsensusResult<()> {
        self.pow.close()
    }

    // ---- Query surface --------------------------------------------------

    /// Attestation set collected for a block, if any.
    pub fn attestations(&self, block_hash: &Hash) -> Option<BlockAttestations> {
        self.inner.lock().attestations.peek(block_hash).cloned()
    }

    /// Whether a height has been finalized.
    pub fn is_finalized(&self, number: BlockNumber) -> bool {
        self.finality.is_finalized(number)
    }

    /// Hash of the finalized block at `number`, if any.
    pub fn finalized_block(&self, number: BlockNumber) -> Option<Hash> {
        self.finality.finalized_block(number)
    }

    /// Highest finalized height.
    pub fn last_finalized_block(&self) -> BlockNumber {
        self.finality.last_finalized()
    }

    /// Whether a reorg targeting `number` is allowed.
    pub fn can_reorg(&self, number: BlockNumber) -> bool {
        self.finality.can_reorg(number)
    }

    /// Detailed finality status of a block.
    pub fn finality_status(&self, number: BlockNumber, block_hash: Hash) -> FinalityStatus {
        let set = self.attestations(&block_hash);
        self.finality
            .status(number, block_hash, set.as_ref(), &self.stake_view())
    }

    /// Replace the validator set from the staking contract.
    pub fn update_validators(&self, validators: HashMap<Address, ValidatorInfo>) {
        self.registry.replace(validators);
    }

    /// Deep copy of the current validator set.
    pub fn validators(&self) -> HashMap<Address, ValidatorInfo> {
        self.registry.snapshot()
    }

    /// Total stake of all active validators.
    pub fn total_stake(&self) -> U256 {
        self.registry.total_active_stake()
    }

    /// Number of active validators.
    pub fn active_validator_count(&self) -> usize {
        self.registry.active_count()
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validator reward recorded by the latest finalization.
    pub fn pending_validator_reward(&self) -> U256 {
        self.inner.lock().pending_validator_reward
    }

    /// Sweep for validators offline past the threshold.
    pub fn check_offline(&self, current: BlockNumber) -> Vec<SlashableOffense> {
        // Registry snapshot is taken before the slashing lock, respecting
        // the documented lock order.
        let validators = self.registry.snapshot();
        self.slashing.check_offline(current, &validators)
    }

    /// Pending slashable offenses.
    pub fn pending_slashes(&self) -> Vec<SlashableOffense> {
        self.slashing.pending()
    }

    /// The slashing detector.
    pub fn slashing(&self) -> &SlashingDetector {
        &self.slashing
    }

    /// The finality tracker.
    pub fn finality(&self) -> &FinalityTracker {
        &self.finality
    }

    /// Drop finality records and slashing liveness entries below `horizon`.
    pub fn prune_below(&self, horizon: BlockNumber) {
        self.finality.prune_below(horizon);
        self.slashing.prune_before(horizon);
    }
}
