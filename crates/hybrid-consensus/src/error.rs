//! Error types for the hybrid consensus overlay.

use shared_types::{Address, BlockNumber, Hash, U256};
use thiserror::Error;

/// Hybrid consensus errors.
///
/// Verification failures are returned to the caller; none of these abort the
/// process. Re-submitting the same attestation deterministically yields
/// [`ConsensusError::DuplicateAttestation`].
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// Signature malformed, recovery mismatch, or the attestation is slashable.
    #[error("invalid attestation from {validator}")]
    InvalidAttestation { validator: Address },

    /// Attester is unknown or marked inactive in the current registry snapshot.
    #[error("validator {validator} not active")]
    ValidatorNotActive { validator: Address },

    /// Attester's stake is below the configured minimum.
    #[error("insufficient stake: {stake} < minimum {min_stake}")]
    InsufficientStake { stake: U256, min_stake: U256 },

    /// The validator already attested to this block hash.
    #[error("duplicate attestation from {validator} for block {block_hash}")]
    DuplicateAttestation {
        validator: Address,
        block_hash: Hash,
    },

    /// The attestation references a block the chain layer does not know.
    #[error("unknown block hash {block_hash} in attestation")]
    InvalidBlockHash { block_hash: Hash },

    /// A finalized height was asked to re-bind to a different hash.
    #[error("finality conflict at height {number}: {existing} already finalized")]
    FinalityConflict { number: BlockNumber, existing: Hash },

    /// Hybrid rules are not active at the requested height.
    #[error("hybrid consensus not active at block {number}")]
    NotActive { number: BlockNumber },

    /// Staking lifecycle operations are driven by on-chain transactions.
    #[error("submit a transaction to the staking contract at {contract}; the node does not sign on a user's behalf")]
    UseStakingContract { contract: Address },

    /// Wire decoding failure.
    #[error("attestation decoding failed: {0}")]
    Decode(#[from] rlp::DecoderError),

    /// Error surfaced by the wrapped PoW engine.
    #[error("pow engine: {0}")]
    Engine(String),
}

/// Result alias for hybrid consensus operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;
