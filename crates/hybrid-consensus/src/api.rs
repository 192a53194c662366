//! Read-only validator query surface.
//!
//! Everything here is observability: registry lookups, network statistics,
//! finality status and pending offenses. Staking lifecycle operations are
//! on-chain transactions; the corresponding methods refuse with an error
//! pointing at the staking contract, since the node never signs on a user's
//! behalf.

use crate::config::EngineConfig;
use crate::domain::{FinalityStatus, SlashableOffense, ValidatorInfo};
use crate::error::{ConsensusError, ConsensusResult};
use crate::ports::{ChainReader, PowEngine};
use crate::service::HybridEngine;
use serde::{Deserialize, Serialize};
use shared_types::{Address, BlockNumber, Hash, U256};
use std::sync::Arc;

/// Registry view of one validator, zeroed when unknown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorInfoResult {
    /// Queried address.
    pub address: Address,
    /// Staked balance in wei.
    pub stake: U256,
    /// Whether the validator is active.
    pub active: bool,
    /// Height of the validator's latest accepted attestation.
    pub last_attestation: BlockNumber,
}

/// Network-wide validator statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStats {
    /// Registered validators, active or not.
    pub total_validators: usize,
    /// Active validators.
    pub active_validators: usize,
    /// Sum of active stake.
    pub total_staked: U256,
    /// Configured minimum stake.
    pub min_stake: U256,
    /// Highest finalized height.
    pub last_finalized_block: BlockNumber,
    /// Configured finality threshold in integer percent.
    pub finality_threshold: u64,
}

/// One attester row in a block's attestation listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttesterInfo {
    /// Attesting validator.
    pub validator: Address,
    /// The validator's stake at query time.
    pub stake: U256,
    /// The attestation signature.
    pub signature: Vec<u8>,
}

/// Attestations collected for one block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockAttestationsResult {
    /// The attested block hash.
    pub block_hash: Hash,
    /// The attested block height.
    pub block_number: BlockNumber,
    /// Attester rows.
    pub attesters: Vec<AttesterInfo>,
}

/// Validator RPC service.
pub struct ValidatorApi<P: PowEngine> {
    engine: Arc<HybridEngine<P>>,
    chain: Arc<dyn ChainReader>,
}

impl<P: PowEngine> ValidatorApi<P> {
    /// Create the API over an engine and a chain reader.
    pub fn new(engine: Arc<HybridEngine<P>>, chain: Arc<dyn ChainReader>) -> Self {
        Self { engine, chain }
    }

    /// Registry view of a validator; unknown addresses yield a zeroed entry.
    pub fn validator_info(&self, address: Address) -> ValidatorInfoResult {
        match self.engine.validators().get(&address) {
            Some(info) => ValidatorInfoResult {
                address: info.address,
                stake: info.stake,
                active: info.active,
                last_attestation: info.last_attestation,
            },
            None => ValidatorInfoResult {
                address,
                stake: U256::zero(),
                active: false,
                last_attestation: 0,
            },
        }
    }

    /// Addresses of all active validators.
    pub fn active_validators(&self) -> Vec<Address> {
        self.engine
            .validators()
            .values()
            .filter(|v| v.active)
            .map(|v| v.address)
            .collect()
    }

    /// Network-wide statistics.
    pub fn network_stats(&self) -> NetworkStats {
        let validators = self.engine.validators();
        let active: Vec<&ValidatorInfo> = validators.values().filter(|v| v.active).collect();

        NetworkStats {
            total_validators: validators.len(),
            active_validators: active.len(),
            total_staked: active.iter().fold(U256::zero(), |acc, v| acc + v.stake),
            min_stake: self.engine.config().min_stake,
            last_finalized_block: self.engine.last_finalized_block(),
            finality_threshold: self.engine.config().finality_threshold,
        }
    }

    /// Finality status at a height; `None` resolves to the current head.
    /// Returns `None` when the chain has no block at that height.
    pub fn finality_status(&self, number: Option<BlockNumber>) -> Option<FinalityStatus> {
        let number = number.unwrap_or_else(|| self.chain.current_height());
        let hash = self.chain.block_hash(number)?;
        Some(self.engine.finality_status(number, hash))
    }

    /// Finality status for a block hash the engine has attestations for.
    pub fn finality_status_by_hash(&self, block_hash: Hash) -> Option<FinalityStatus> {
        let set = self.engine.attestations(&block_hash)?;
        Some(self.engine.finality_status(set.block_number, block_hash))
    }

    /// Attestations for a block, joined with attester stakes.
    pub fn attestations(&self, block_hash: Hash) -> Option<BlockAttestationsResult> {
        let set = self.engine.attestations(&block_hash)?;
        let validators = self.engine.validators();

        let attesters = set
            .attestations
            .values()
            .map(|att| AttesterInfo {
                validator: att.validator,
                stake: validators
                    .get(&att.validator)
                    .map(|v| v.stake)
                    .unwrap_or_default(),
                signature: att.signature.clone(),
            })
            .collect();

        Some(BlockAttestationsResult {
            block_hash: set.block_hash,
            block_number: set.block_number,
            attesters,
        })
    }

    /// Pending slashable offenses.
    pub fn pending_slashes(&self) -> Vec<SlashableOffense> {
        self.engine.pending_slashes()
    }

    /// Engine configuration.
    pub fn config(&self) -> EngineConfig {
        self.engine.config().clone()
    }

    /// Whether an address may attest: active with at least the minimum stake.
    pub fn can_attest(&self, address: Address) -> bool {
        match self.engine.validators().get(&address) {
            Some(info) => info.active && info.stake >= self.engine.config().min_stake,
            None => false,
        }
    }

    /// Stake of a validator, zero when unknown.
    pub fn validator_stake(&self, address: Address) -> U256 {
        self.engine
            .validators()
            .get(&address)
            .map(|v| v.stake)
            .unwrap_or_default()
    }

    /// Whether a height has been finalized.
    pub fn is_finalized(&self, number: BlockNumber) -> bool {
        self.engine.is_finalized(number)
    }

    /// Highest finalized height.
    pub fn last_finalized_block(&self) -> BlockNumber {
        self.engine.last_finalized_block()
    }

    // ---- Staking lifecycle: on-chain only -------------------------------

    /// Staking is a transaction to the staking contract.
    pub fn stake(&self, _amount: U256) -> ConsensusResult<()> {
        Err(self.use_contract())
    }

    /// Withdrawal requests are transactions to the staking contract.
    pub fn request_withdrawal(&self) -> ConsensusResult<()> {
        Err(self.use_contract())
    }

    /// Reward claims are transactions to the staking contract.
    pub fn claim_rewards(&self) -> ConsensusResult<()> {
        Err(self.use_contract())
    }

    fn use_contract(&self) -> ConsensusError {
        ConsensusError::UseStakingContract {
            contract: self.engine.config().staking_contract,
        }
    }
}
