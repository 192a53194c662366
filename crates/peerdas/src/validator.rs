//! DA validator: per-block availability commitments and sampled verification.
//!
//! Block producers encode the payload, commit to the shard set and attach
//! the commitment to the block. Verifiers select evenly spaced shard
//! indices, fetch them through the sample protocol and accept availability
//! once enough samples verify against the commitment.

use crate::config::{ErasureConfig, SamplingConfig};
use crate::erasure::{EncodedBlob, EncodedShard, ErasureCoder};
use crate::error::{DasError, DasResult};
use crate::protocol::{PeerId, Protocol, SampleTransport};
use crate::sampler::{merkle_root, DataSample, SampleCommitment, Sampler};
use serde::{Deserialize, Serialize};
use shared_crypto::keccak256;
use shared_types::{BlockNumber, ChainConfig, Hash};
use std::sync::Arc;
use tracing::debug;

/// Data availability commitment bound into a block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaCommitment {
    /// Committed block height.
    pub block_number: BlockNumber,
    /// Committed block hash.
    pub block_hash: Hash,
    /// Keccak-256 Merkle root over the shard commitment bytes.
    pub data_root: Hash,
    /// Keccak-256 of the original payload.
    pub blob_hash: Hash,
    /// Total shards, data plus parity.
    pub shard_count: u64,
    /// Data shards only.
    pub data_shard_count: u64,
}

/// Outcome of sampled availability verification for one block.
#[derive(Debug, Clone)]
pub struct BlockDaProof {
    /// The commitment that was checked.
    pub commitment: DaCommitment,
    /// Samples that verified.
    pub samples: Vec<DataSample>,
    /// Number of verified samples.
    pub sample_count: u64,
    /// Whether enough samples verified to accept availability.
    pub is_complete: bool,
}

/// Validates data availability through erasure coding and sampling.
pub struct DaValidator<T: SampleTransport> {
    chain: ChainConfig,
    sampler: Sampler,
    coder: ErasureCoder,
    protocol: Arc<Protocol<T>>,
    sampling: SamplingConfig,
}

impl<T: SampleTransport> DaValidator<T> {
    /// Create a validator with explicit codec and sampling policies.
    pub fn new(
        chain: ChainConfig,
        erasure: ErasureConfig,
        sampling: SamplingConfig,
        protocol: Arc<Protocol<T>>,
    ) -> Self {
        Self {
            sampler: Sampler::new(chain.clone()),
            chain,
            coder: ErasureCoder::new(erasure),
            protocol,
            sampling,
        }
    }

    /// The erasure codec in use.
    pub fn coder(&self) -> &ErasureCoder {
        &self.coder
    }

    /// Encode a block payload and produce its availability commitment.
    pub fn create_commitment(
        &self,
        block_number: BlockNumber,
        block_hash: Hash,
        data: &[u8],
    ) -> DasResult<(DaCommitment, EncodedBlob)> {
        if !self.chain.is_das(block_number) {
            return Err(DasError::NotActive {
                number: block_number,
            });
        }

        let blob = self.coder.encode_for_block(data, block_number)?;
        let commitment = DaCommitment {
            block_number,
            block_hash,
            data_root: data_root(&blob.shards),
            blob_hash: blob.data_hash,
            shard_count: blob.shards.len() as u64,
            data_shard_count: self.coder.data_shards() as u64,
        };

        Ok((commitment, blob))
    }

    /// Check a commitment's structural invariants.
    pub fn validate_commitment(&self, commitment: &DaCommitment) -> DasResult<()> {
        if commitment.data_root == Hash::zero() {
            return Err(DasError::InvalidCommitment {
                reason: "empty data root",
            });
        }
        if commitment.shard_count == 0 {
            return Err(DasError::InvalidCommitment {
                reason: "zero shard count",
            });
        }
        if commitment.data_shard_count == 0
            || commitment.data_shard_count > commitment.shard_count
        {
            return Err(DasError::InvalidCommitment {
                reason: "invalid data shard count",
            });
        }
        Ok(())
    }

    /// Verify availability by sampling: select evenly spaced indices, fetch
    /// them from the network and verify each against the commitment.
    ///
    /// At least `ceil(requested * min_sample_ratio)` samples must arrive;
    /// the proof's `is_complete` flag says whether enough of them verified.
    pub async fn validate_data_availability(
        &self,
        commitment: &DaCommitment,
    ) -> DasResult<BlockDaProof> {
        if !self.chain.is_das(commitment.block_number) {
            return Err(DasError::NotActive {
                number: commitment.block_number,
            });
        }
        self.validate_commitment(commitment)?;

        let indices = self.select_sample_indices(commitment.shard_count);
        let min_required = min_required(indices.len(), self.sampling.min_sample_ratio);

        let samples = self
            .protocol
            .request_samples(commitment.block_number, commitment.block_hash, &indices)
            .await?;

        if samples.len() < min_required {
            return Err(DasError::InsufficientSamples {
                have: samples.len(),
                need: min_required,
            });
        }

        let derived = SampleCommitment {
            block_number: commitment.block_number,
            data_hash: commitment.blob_hash,
            merkle_root: commitment.data_root,
            sample_count: commitment.shard_count,
        };

        let verified: Vec<DataSample> = samples
            .into_iter()
            .filter(|sample| self.sampler.verify_sample(sample, &derived).is_ok())
            .collect();

        let is_complete = verified.len() >= min_required;
        debug!(
            block = %commitment.block_hash,
            requested = indices.len(),
            verified = verified.len(),
            is_complete,
            "data availability sampled"
        );

        Ok(BlockDaProof {
            commitment: commitment.clone(),
            sample_count: verified.len() as u64,
            samples: verified,
            is_complete,
        })
    }

    /// Validate a commitment against the full encoded payload; the block
    /// producer path, no sampling involved.
    pub fn validate_with_full_data(
        &self,
        commitment: &DaCommitment,
        blob: &EncodedBlob,
    ) -> DasResult<()> {
        if !self.chain.is_das(commitment.block_number) {
            return Err(DasError::NotActive {
                number: commitment.block_number,
            });
        }
        if blob.data_hash != commitment.blob_hash {
            return Err(DasError::CommitmentMismatch);
        }
        if data_root(&blob.shards) != commitment.data_root {
            return Err(DasError::CommitmentMismatch);
        }
        if blob.shards.len() as u64 != commitment.shard_count {
            return Err(DasError::CommitmentMismatch);
        }
        Ok(())
    }

    /// Whether the samples at hand satisfy the codec's reconstruction
    /// precondition.
    pub fn can_reconstruct_from_samples(&self, samples: &[DataSample]) -> bool {
        let shards = self.samples_to_shards(samples);
        self.coder.can_reconstruct(&shards)
    }

    /// Reconstruct the original payload from verified samples.
    pub fn reconstruct(&self, blob: &EncodedBlob, samples: &[DataSample]) -> DasResult<Vec<u8>> {
        let shards = self.samples_to_shards(samples);
        self.coder.decode_for_block(blob, &shards)
    }

    /// Seed the local cache with every shard of an encoded block and record
    /// which payload hash requests for this block resolve to.
    pub fn store_block_samples(&self, commitment: &DaCommitment, blob: &EncodedBlob) {
        self.protocol
            .register_block(commitment.block_hash, blob.data_hash);
        self.protocol.store_samples(shards_to_samples(blob));
    }

    /// Announce the block's available shard indices to all peers.
    pub async fn announce_block_samples(
        &self,
        commitment: &DaCommitment,
        blob: &EncodedBlob,
    ) -> DasResult<()> {
        let indices: Vec<u64> = blob.shards.iter().map(|s| s.index).collect();
        self.protocol
            .announce_samples(
                commitment.block_number,
                commitment.block_hash,
                indices,
                commitment.shard_count,
            )
            .await
    }

    /// Push a block's samples to one peer.
    pub async fn push_block_samples(&self, peer: &PeerId, blob: &EncodedBlob) -> DasResult<()> {
        self.protocol.push_samples(peer, shards_to_samples(blob)).await
    }

    /// Evenly spaced sample indices over the shard range.
    fn select_sample_indices(&self, shard_count: u64) -> Vec<u64> {
        if shard_count == 0 || self.sampling.sample_count == 0 {
            return Vec::new();
        }

        let step = (shard_count / self.sampling.sample_count as u64).max(1);
        (0..self.sampling.sample_count as u64)
            .map(|i| i * step)
            .filter(|index| *index < shard_count)
            .collect()
    }

    fn samples_to_shards(&self, samples: &[DataSample]) -> Vec<EncodedShard> {
        samples
            .iter()
            .map(|sample| EncodedShard {
                index: sample.index,
                data: sample.data.clone(),
                is_parity: sample.index >= self.coder.data_shards() as u64,
                commitment: sample.commitment,
                block_number: Some(sample.block_number),
            })
            .collect()
    }
}

/// Keccak-256 Merkle root over the shard commitment bytes. This root binds
/// the shard set into the header and is a different hash family from the
/// sampler's SHA-256 tree.
pub fn data_root(shards: &[EncodedShard]) -> Hash {
    let leaves: Vec<Hash> = shards.iter().map(|s| s.commitment).collect();
    merkle_root(&leaves, keccak256)
}

/// Keccak digest binding a commitment for header inclusion.
pub fn commitment_hash(commitment: &DaCommitment) -> Hash {
    let mut buf = Vec::with_capacity(32 * 3 + 16);
    buf.extend_from_slice(commitment.block_hash.as_bytes());
    buf.extend_from_slice(commitment.data_root.as_bytes());
    buf.extend_from_slice(commitment.blob_hash.as_bytes());
    buf.extend_from_slice(&commitment.shard_count.to_be_bytes());
    buf.extend_from_slice(&commitment.data_shard_count.to_be_bytes());
    keccak256(&buf)
}

/// Shards of an encoded blob as cacheable samples (no inclusion proofs).
fn shards_to_samples(blob: &EncodedBlob) -> Vec<DataSample> {
    blob.shards
        .iter()
        .map(|shard| DataSample {
            block_number: blob.block_number,
            data_hash: blob.data_hash,
            index: shard.index,
            data: shard.data.clone(),
            merkle_proof: Vec::new(),
            commitment: shard.commitment,
        })
        .collect()
}

fn min_required(requested: usize, ratio: f64) -> usize {
    (requested as f64 * ratio).ceil() as usize
}
