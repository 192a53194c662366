//! Error types for data availability sampling.

use thiserror::Error;

/// Data availability errors.
#[derive(Debug, Error)]
pub enum DasError {
    /// Encoding input was empty.
    #[error("cannot encode empty data")]
    EmptyData,

    /// Encoding input exceeds the codec's capacity.
    #[error("data of {len} bytes exceeds maximum {max}")]
    DataTooLarge { len: usize, max: usize },

    /// Fewer unique shards than the codec needs to reconstruct.
    #[error("insufficient shards: have {have}, need {need}")]
    InsufficientShards { have: usize, need: usize },

    /// A shard's length differs from the configured shard size.
    #[error("shard size mismatch: got {got}, expected {expected}")]
    ShardSizeMismatch { got: usize, expected: usize },

    /// The available parity cannot recover the missing data shards.
    #[error("data reconstruction failed")]
    ReconstructionFailed,

    /// A sample's recomputed commitment does not match.
    #[error("invalid data availability sample")]
    InvalidSample,

    /// A sample's inclusion proof does not validate.
    #[error("sample verification failed")]
    SampleVerificationFailed,

    /// A commitment is structurally malformed.
    #[error("invalid commitment: {reason}")]
    InvalidCommitment { reason: &'static str },

    /// Commitment fields disagree with the encoded data.
    #[error("data availability commitment mismatch")]
    CommitmentMismatch,

    /// Fewer samples arrived than the sampling policy requires.
    #[error("insufficient samples: have {have}, need {need}")]
    InsufficientSamples { have: usize, need: usize },

    /// Data availability sampling is not active at the requested height.
    #[error("data availability sampling not active at block {number}")]
    NotActive { number: u64 },

    /// A sample request went unanswered within the deadline.
    #[error("sample request timed out")]
    RequestTimeout,

    /// The pending-request table is full.
    #[error("too many pending requests: {pending} of {max}")]
    TooManyRequests { pending: usize, max: usize },

    /// One request asked for more samples than the protocol permits.
    #[error("too many samples requested: {requested} of {max}")]
    TooManySamples { requested: usize, max: usize },

    /// An unknown or undecodable protocol message.
    #[error("invalid protocol message (code {0:#04x})")]
    InvalidMessage(u8),

    /// Wire decoding failure.
    #[error("message decoding failed: {0}")]
    Decode(#[from] rlp::DecoderError),

    /// Failure reported by the transport layer.
    #[error("transport: {0}")]
    Transport(String),
}

/// Result alias for data availability operations.
pub type DasResult<T> = Result<T, DasError>;
