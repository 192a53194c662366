//! Finality tracker: stake-weighted finality decisions and the reorg barrier.
//!
//! A block is finalized once attestations from validators representing at
//! least the configured integer percent of total active stake have been
//! collected. The decision rule is integer division; the floating-point
//! percentage in [`FinalityStatus`] is for reporting only and never feeds
//! the decision.

use crate::domain::attestation::BlockAttestations;
use crate::domain::validator::StakeView;
use crate::error::{ConsensusError, ConsensusResult};
use lru::LruCache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::{BlockNumber, Hash, U256};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use tracing::{debug, info};

/// Bound on the number of finalized entries kept in memory. Pruning below a
/// sync horizon is best-effort hygiene on top of this cap.
const FINALIZED_CAPACITY: usize = 1000;

/// Finality status of one block, for the RPC surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalityStatus {
    /// Queried block height.
    pub block_number: BlockNumber,
    /// Queried block hash.
    pub block_hash: Hash,
    /// Whether the block is finalized.
    pub is_finalized: bool,
    /// Number of attesters seen for this block.
    pub attester_count: usize,
    /// Number of active validators.
    pub total_validators: usize,
    /// Stake attested to this block.
    pub attesting_stake: U256,
    /// Total active stake.
    pub total_stake: U256,
    /// Attesting stake as a percentage (reporting only, never the oracle).
    pub stake_percent: f64,
    /// Configured finality threshold in integer percent.
    pub threshold: u64,
}

struct FinalityRecord {
    /// Finalized blocks: height to hash.
    finalized: LruCache<BlockNumber, Hash>,
    /// Highest finalized height.
    last_finalized: BlockNumber,
}

/// Tracks block finality from validator attestations.
#[derive(Debug)]
pub struct FinalityTracker {
    record: RwLock<FinalityRecord>,
}

impl std::fmt::Debug for FinalityRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalityRecord")
            .field("entries", &self.finalized.len())
            .field("last_finalized", &self.last_finalized)
            .finish()
    }
}

impl Default for FinalityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FinalityTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            record: RwLock::new(FinalityRecord {
                finalized: LruCache::new(
                    NonZeroUsize::new(FINALIZED_CAPACITY).expect("capacity is non-zero"),
                ),
                last_finalized: 0,
            }),
        }
    }

    /// Check whether a block has reached finality, recording it if so.
    ///
    /// Returns `true` if the block is now or was already finalized. Stake is
    /// gathered before the finality write lock is taken, so the registry lock
    /// is never acquired while holding the finality lock.
    pub fn check_finality(
        &self,
        block_hash: Hash,
        attestations: &BlockAttestations,
        stake: &dyn StakeView,
    ) -> bool {
        let number = attestations.block_number;
        if self.is_finalized(number) {
            return true;
        }

        let validators = stake.validators();
        let total_stake = stake.total_active_stake();
        if total_stake.is_zero() {
            return false;
        }

        let attesting_stake = attestations.total_stake(&validators);
        // Integer percent with truncation is the canonical finality rule.
        let percent = attesting_stake * U256::from(100u64) / total_stake;
        let threshold = stake.finality_threshold();

        if percent >= U256::from(threshold) {
            let mut record = self.record.write();
            // A racing thread may have finalized this height already.
            if !record.finalized.contains(&number) {
                record.finalized.put(number, block_hash);
                if number > record.last_finalized {
                    record.last_finalized = number;
                }
                info!(
                    number,
                    hash = %block_hash,
                    attesters = attestations.attester_count(),
                    stake_percent = percent.as_u64(),
                    "block finalized"
                );
            }
            return true;
        }

        debug!(
            number,
            hash = %block_hash,
            attesters = attestations.attester_count(),
            stake_percent = percent.as_u64(),
            threshold,
            "block not yet finalized"
        );
        false
    }

    /// Whether a height has been finalized.
    pub fn is_finalized(&self, number: BlockNumber) -> bool {
        self.record.read().finalized.contains(&number)
    }

    /// Hash of the finalized block at `number`, if any.
    pub fn finalized_block(&self, number: BlockNumber) -> Option<Hash> {
        self.record.read().finalized.peek(&number).copied()
    }

    /// Highest finalized height.
    pub fn last_finalized(&self) -> BlockNumber {
        self.record.read().last_finalized
    }

    /// All finalized entries in `[start, end]`.
    pub fn finalized_range(&self, start: BlockNumber, end: BlockNumber) -> BTreeMap<BlockNumber, Hash> {
        let record = self.record.read();
        (start..=end)
            .filter_map(|n| record.finalized.peek(&n).map(|hash| (n, *hash)))
            .collect()
    }

    /// Detailed status for reporting. The floating-point percentage comes
    /// from a wide-precision division and is never used for the decision.
    pub fn status(
        &self,
        number: BlockNumber,
        block_hash: Hash,
        attestations: Option<&BlockAttestations>,
        stake: &dyn StakeView,
    ) -> FinalityStatus {
        let validators = stake.validators();
        let total_stake = stake.total_active_stake();

        let (attester_count, attesting_stake) = match attestations {
            Some(set) => (set.attester_count(), set.total_stake(&validators)),
            None => (0, U256::zero()),
        };

        let stake_percent = if total_stake.is_zero() {
            0.0
        } else {
            u256_to_f64(attesting_stake) / u256_to_f64(total_stake) * 100.0
        };

        FinalityStatus {
            block_number: number,
            block_hash,
            is_finalized: self.is_finalized(number),
            attester_count,
            total_validators: stake.active_count(),
            attesting_stake,
            total_stake,
            stake_percent,
            threshold: stake.finality_threshold(),
        }
    }

    /// Seed a finalized entry during snapshot sync.
    ///
    /// The caller must have verified finality independently. Re-binding an
    /// already-finalized height to a different hash is refused.
    pub fn mark_finalized(&self, number: BlockNumber, block_hash: Hash) -> ConsensusResult<()> {
        let mut record = self.record.write();
        if let Some(existing) = record.finalized.peek(&number) {
            if *existing != block_hash {
                return Err(ConsensusError::FinalityConflict {
                    number,
                    existing: *existing,
                });
            }
            return Ok(());
        }
        record.finalized.put(number, block_hash);
        if number > record.last_finalized {
            record.last_finalized = number;
        }
        Ok(())
    }

    /// Whether a reorg targeting `number` is allowed: never past the last
    /// finalized height. The chain layer must consult this before accepting
    /// any reorg.
    pub fn can_reorg(&self, number: BlockNumber) -> bool {
        number >= self.record.read().last_finalized
    }

    /// Drop finality entries below `horizon`.
    pub fn prune_below(&self, horizon: BlockNumber) {
        let mut record = self.record.write();
        let stale: Vec<BlockNumber> = record
            .finalized
            .iter()
            .map(|(n, _)| *n)
            .filter(|n| *n < horizon)
            .collect();
        for number in stale {
            record.finalized.pop(&number);
        }
    }
}

/// Widening conversion for the reporting percentage.
fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .enumerate()
        .map(|(i, limb)| *limb as f64 * 2f64.powi(64 * i as i32))
        .sum()
}
