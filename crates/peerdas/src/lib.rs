//! # PeerDAS - Data Availability Sampling Subsystem
//!
//! Lets light participants verify that a block's associated data is
//! retrievable without downloading it in full. Block producers erasure-code
//! the payload into data and parity shards, commit to the shard set, and
//! attach the commitment to the block; verifiers fetch a small set of
//! evenly spaced shards through the sample protocol and check each against
//! the commitment.
//!
//! ## Subsystems
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | `erasure` | XOR-family codec: `k` data + `m` parity shards, single-loss recovery |
//! | `sampler` | Fixed-size samples, SHA-256 Merkle commitment, inclusion proofs |
//! | `validator` | Per-block commitments, sampled availability verification |
//! | `protocol` | Wire messages, bounded sample cache, async request path |
//!
//! ## Hash Families
//!
//! Shard and sample commitments are SHA-256 over `data || index`; payload
//! hashes and the header-bound data root are Keccak-256. The two are never
//! interchangeable.
//!
//! ## Suspension Points
//!
//! Only the request path suspends: `Protocol::request_samples` awaits a
//! response channel against a five second deadline. Everything else is
//! synchronous.

pub mod config;
pub mod erasure;
pub mod error;
pub mod protocol;
pub mod sampler;
pub mod validator;

pub use config::{ErasureConfig, SamplingConfig};
pub use erasure::{shard_commitment, EncodedBlob, EncodedShard, ErasureCoder};
pub use error::{DasError, DasResult};
pub use protocol::{
    decode_message, encode_message, Message, PeerId, Protocol, SampleAnnouncement, SampleCache,
    SamplePush, SampleRequest, SampleResponse, SampleTransport, MAX_PENDING_REQUESTS,
    MAX_SAMPLES_PER_REQUEST, SAMPLE_CACHE_CAPACITY, SAMPLE_MAX_AGE, SAMPLE_REQUEST_TIMEOUT,
};
pub use sampler::{
    merkle_proof, merkle_root, verify_merkle_proof, DataSample, SampleCommitment, Sampler,
    SAMPLE_SIZE,
};
pub use validator::{commitment_hash, data_root, BlockDaProof, DaCommitment, DaValidator};
