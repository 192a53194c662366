//! # Hybrid Consensus - PoW/PoS Overlay Subsystem
//!
//! Augments an existing proof-of-work block-production engine with a
//! stake-weighted attestation layer: validators with sufficient stake sign
//! attestations to blocks, attestations aggregate per block, and a block is
//! finalized once attesting stake crosses the configured fraction of total
//! active stake. Finalized heights form a hard barrier against reorgs.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Accepted attestations recover to their claimed validator | `domain/attestation.rs` - `verify_signature()` |
//! | At most one attestation per validator per block | `domain/attestation.rs` - `BlockAttestations::add()` |
//! | Finality is permanent within a session | `domain/finality.rs` - early return in `check_finality()` |
//! | `last_finalized` is monotonically non-decreasing | `domain/finality.rs` - max-update on insert |
//! | No reorg below `last_finalized` | `domain/finality.rs` - `can_reorg()` |
//!
//! ## Slashable Offense Detection
//!
//! | Offense | Description |
//! |---------|-------------|
//! | DoubleAttestation | Same height, different block hashes |
//! | Offline | Silent past the offline threshold |
//!
//! Surround voting cannot occur here: attestations carry a single height,
//! not a source/target span. The detector only detects; penalty execution
//! belongs to the staking contract.
//!
//! ## Lock Order
//!
//! facade → slashing → registry → finality, never in reverse. Stake data is
//! always gathered before the finality write lock is taken.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hybrid_consensus::{EngineConfig, HybridEngine};
//!
//! let engine = HybridEngine::new(EngineConfig::default(), pow);
//! engine.update_validators(snapshot);
//! engine.add_attestation(attestation)?;
//! if engine.is_finalized(number) { /* ... */ }
//! ```

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

pub use api::{
    AttesterInfo, BlockAttestationsResult, NetworkStats, ValidatorApi, ValidatorInfoResult,
};
pub use config::{EngineConfig, MINER_REWARD, VALIDATOR_REWARD};
pub use domain::{
    Attestation, BlockAttestations, FinalityStatus, FinalityTracker, SlashableOffense,
    SlashingDetector, SlashingReason, StakeView, ValidatorInfo, ValidatorRegistry,
};
pub use error::{ConsensusError, ConsensusResult};
pub use ports::{ChainReader, PowEngine, StateLedger};
pub use service::HybridEngine;
