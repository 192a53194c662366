//! Slashing detector: equivocation and liveness offense detection.
//!
//! The detector only *detects* and queues offenses; penalty execution lives
//! in the staking contract. Attestation history is keyed by the
//! `(validator, height)` pair so distinct heights can never collide.

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_types::{Address, BlockNumber, Hash};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use tracing::warn;

use crate::domain::attestation::Attestation;
use crate::domain::validator::ValidatorInfo;

/// Bound on remembered `(validator, height)` attestation entries.
const HISTORY_CAPACITY: usize = 10_000;

/// Default number of blocks without an attestation before a validator is
/// considered offline (about four hours at 15 second spacing).
pub const DEFAULT_OFFLINE_THRESHOLD: u64 = 1000;

/// Why a validator should be slashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlashingReason {
    /// Two attestations at the same height with different block hashes.
    DoubleAttestation,
    /// An attestation's span surrounds another from the same validator.
    SurroundVoting,
    /// No attestation for longer than the offline threshold.
    Offline,
}

/// A detected slashable offense, queued for consumers to drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashableOffense {
    /// The offending validator.
    pub validator: Address,
    /// What the validator did.
    pub reason: SlashingReason,
    /// Serialized evidence, when available.
    pub evidence: Option<Vec<u8>>,
    /// Height the offense occurred at.
    pub block_number: BlockNumber,
    /// Height at which the offense was detected.
    pub detected_block: BlockNumber,
}

struct DetectorState {
    /// `(validator, height)` to the block hash previously attested there.
    history: LruCache<(Address, BlockNumber), Hash>,
    /// Offenses awaiting consumption.
    pending: Vec<SlashableOffense>,
    /// Most recent height each validator was seen attesting.
    last_seen: HashMap<Address, BlockNumber>,
    /// Blocks of silence before a validator counts as offline.
    offline_threshold: u64,
}

/// Detects slashable offenses by validators.
pub struct SlashingDetector {
    state: Mutex<DetectorState>,
}

impl Default for SlashingDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SlashingDetector {
    /// Create a detector with the default offline threshold.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DetectorState {
                history: LruCache::new(
                    NonZeroUsize::new(HISTORY_CAPACITY).expect("capacity is non-zero"),
                ),
                pending: Vec::new(),
                last_seen: HashMap::new(),
                offline_threshold: DEFAULT_OFFLINE_THRESHOLD,
            }),
        }
    }

    /// Check an attestation against the validator's history.
    ///
    /// Returns the offense if the attestation equivocates; otherwise records
    /// the attestation and returns `None`. A repeat of the same vote is
    /// idempotent.
    pub fn check_attestation(&self, attestation: &Attestation) -> Option<SlashableOffense> {
        let mut state = self.state.lock();
        let validator = attestation.validator;
        let number = attestation.block_number;

        state.last_seen.insert(validator, number);

        if let Some(existing) = state.history.get(&(validator, number)) {
            if *existing != attestation.block_hash {
                let offense = SlashableOffense {
                    validator,
                    reason: SlashingReason::DoubleAttestation,
                    evidence: Some(double_vote_evidence(*existing, attestation)),
                    block_number: number,
                    detected_block: number,
                };

                warn!(
                    validator = %validator,
                    number,
                    first = %existing,
                    second = %attestation.block_hash,
                    "double attestation detected"
                );

                state.pending.push(offense.clone());
                return Some(offense);
            }
            return None;
        }

        state.history.put((validator, number), attestation.block_hash);

        self.check_surround_voting(attestation)
    }

    /// Surround-vote detection is out of scope for this overlay: attestations
    /// carry a single height, not a source/target span, so no surround
    /// relation exists to violate.
    fn check_surround_voting(&self, _attestation: &Attestation) -> Option<SlashableOffense> {
        None
    }

    /// Sweep the registry snapshot for validators offline past the threshold.
    ///
    /// Detected offenses are queued and returned. A validator never seen by
    /// the detector falls back to its registry `last_attestation`.
    pub fn check_offline(
        &self,
        current: BlockNumber,
        validators: &HashMap<Address, ValidatorInfo>,
    ) -> Vec<SlashableOffense> {
        let mut state = self.state.lock();
        let mut offenses = Vec::new();

        for (address, info) in validators {
            if !info.active {
                continue;
            }

            let last_seen = state
                .last_seen
                .get(address)
                .copied()
                .unwrap_or(info.last_attestation);

            if current.saturating_sub(last_seen) > state.offline_threshold {
                warn!(
                    validator = %address,
                    last_seen,
                    current,
                    blocks_offline = current - last_seen,
                    "offline validator detected"
                );

                let offense = SlashableOffense {
                    validator: *address,
                    reason: SlashingReason::Offline,
                    evidence: None,
                    block_number: last_seen,
                    detected_block: current,
                };
                state.pending.push(offense.clone());
                offenses.push(offense);
            }
        }

        offenses
    }

    /// Copy of the pending offense queue.
    pub fn pending(&self) -> Vec<SlashableOffense> {
        self.state.lock().pending.clone()
    }

    /// Copy out and clear the pending offense queue.
    pub fn drain(&self) -> Vec<SlashableOffense> {
        std::mem::take(&mut self.state.lock().pending)
    }

    /// Remove pending offenses matching a validator and reason.
    pub fn remove(&self, validator: &Address, reason: SlashingReason) {
        self.state
            .lock()
            .pending
            .retain(|o| o.validator != *validator || o.reason != reason);
    }

    /// Record that a validator was seen at `number` outside attestation flow.
    pub fn update_last_seen(&self, validator: &Address, number: BlockNumber) {
        self.state.lock().last_seen.insert(*validator, number);
    }

    /// When the detector last saw a validator, if ever.
    pub fn last_seen(&self, validator: &Address) -> Option<BlockNumber> {
        self.state.lock().last_seen.get(validator).copied()
    }

    /// Override the offline threshold.
    pub fn set_offline_threshold(&self, blocks: u64) {
        self.state.lock().offline_threshold = blocks;
    }

    /// Drop `last_seen` entries older than `horizon`. The attestation history
    /// is already bounded by its cache capacity.
    pub fn prune_before(&self, horizon: BlockNumber) {
        self.state
            .lock()
            .last_seen
            .retain(|_, seen| *seen >= horizon);
    }
}

/// Evidence payload for a double vote: both hashes at the disputed height.
fn double_vote_evidence(first: Hash, second: &Attestation) -> Vec<u8> {
    let mut evidence = Vec::with_capacity(72);
    evidence.extend_from_slice(first.as_bytes());
    evidence.extend_from_slice(second.block_hash.as_bytes());
    evidence.extend_from_slice(&second.block_number.to_be_bytes());
    evidence
}
