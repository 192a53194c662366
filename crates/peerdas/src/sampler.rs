//! Sampler: chunks block payloads into fixed-size samples and commits to the
//! sample set with a binary Merkle tree.
//!
//! Sample commitments reuse the shard commitment formula
//! (`SHA-256(data || big-endian-8-byte(index))`). The Merkle tree is built
//! over those commitments under SHA-256; an odd node at the end of a level
//! is paired with itself. Inclusion proofs are the sibling hashes on the
//! path from leaf to root.

use crate::erasure::shard_commitment;
use crate::error::{DasError, DasResult};
use serde::{Deserialize, Serialize};
use shared_crypto::sha256;
use shared_types::{BlockNumber, ChainConfig, Hash};

/// Fixed sample size in bytes. Payloads shorter than this form one sample.
pub const SAMPLE_SIZE: usize = 1024;

/// One sample of block-associated data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSample {
    /// Block the sampled payload belongs to.
    pub block_number: BlockNumber,
    /// Keccak-256 of the whole payload.
    pub data_hash: Hash,
    /// Sample index within the payload.
    pub index: u64,
    /// Sample bytes (the final sample may be short).
    pub data: Vec<u8>,
    /// Sibling hashes from leaf to root; may be empty for pushed samples.
    pub merkle_proof: Vec<Hash>,
    /// Commitment over `data || index`.
    pub commitment: Hash,
}

/// Commitment to the full sample set of one payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCommitment {
    /// Block the payload belongs to.
    pub block_number: BlockNumber,
    /// Keccak-256 of the whole payload.
    pub data_hash: Hash,
    /// Root of the binary Merkle tree over sample commitments.
    pub merkle_root: Hash,
    /// Number of leaves under the root.
    pub sample_count: u64,
}

/// Splits payloads into committed samples and verifies them.
#[derive(Debug, Clone)]
pub struct Sampler {
    chain: ChainConfig,
}

impl Sampler {
    /// Create a sampler bound to a fork schedule.
    pub fn new(chain: ChainConfig) -> Self {
        Self { chain }
    }

    /// Whether sampling is active at `number`.
    pub fn is_active(&self, number: BlockNumber) -> bool {
        self.chain.is_das(number)
    }

    /// Chunk `data` into samples, commit to each, and build the set
    /// commitment with per-sample inclusion proofs.
    pub fn sample_data(
        &self,
        data: &[u8],
        block_number: BlockNumber,
        data_hash: Hash,
    ) -> DasResult<(Vec<DataSample>, SampleCommitment)> {
        if !self.is_active(block_number) {
            return Err(DasError::NotActive {
                number: block_number,
            });
        }
        if data.is_empty() {
            return Err(DasError::EmptyData);
        }

        let sample_size = SAMPLE_SIZE.min(data.len());
        let sample_count = data.len().div_ceil(sample_size);

        let mut samples = Vec::with_capacity(sample_count);
        let mut leaves = Vec::with_capacity(sample_count);

        for index in 0..sample_count {
            let start = index * sample_size;
            let end = (start + sample_size).min(data.len());
            let chunk = data[start..end].to_vec();
            let commitment = shard_commitment(&chunk, index as u64);

            leaves.push(commitment);
            samples.push(DataSample {
                block_number,
                data_hash,
                index: index as u64,
                data: chunk,
                merkle_proof: Vec::new(),
                commitment,
            });
        }

        let merkle_root = merkle_root(&leaves, sha256);
        for sample in &mut samples {
            sample.merkle_proof = merkle_proof(&leaves, sample.index as usize, sha256);
        }

        let commitment = SampleCommitment {
            block_number,
            data_hash,
            merkle_root,
            sample_count: sample_count as u64,
        };

        Ok((samples, commitment))
    }

    /// Verify a sample against a set commitment.
    ///
    /// Checks fork activation, the recomputed sample commitment, and - when
    /// the sample carries a proof - the inclusion proof against the
    /// commitment's Merkle root at the sample's index.
    pub fn verify_sample(
        &self,
        sample: &DataSample,
        commitment: &SampleCommitment,
    ) -> DasResult<()> {
        if !self.is_active(sample.block_number) {
            return Err(DasError::NotActive {
                number: sample.block_number,
            });
        }

        if sample.commitment != shard_commitment(&sample.data, sample.index) {
            return Err(DasError::InvalidSample);
        }

        if !sample.merkle_proof.is_empty()
            && !verify_merkle_proof(
                commitment.merkle_root,
                sample.commitment,
                sample.index,
                commitment.sample_count,
                &sample.merkle_proof,
                sha256,
            )
        {
            return Err(DasError::SampleVerificationFailed);
        }

        Ok(())
    }
}

/// Root of a binary Merkle tree over `leaves` under `hash`; an odd node at
/// the end of a level pairs with itself. An empty leaf set roots at zero.
pub fn merkle_root(leaves: &[Hash], hash: fn(&[u8]) -> Hash) -> Hash {
    if leaves.is_empty() {
        return Hash::zero();
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level, hash);
    }
    level[0]
}

/// Sibling hashes on the path from `leaves[index]` to the root. Levels where
/// the node has no sibling contribute nothing; the verifier self-pairs.
pub fn merkle_proof(leaves: &[Hash], index: usize, hash: fn(&[u8]) -> Hash) -> Vec<Hash> {
    if index >= leaves.len() {
        return Vec::new();
    }

    let mut proof = Vec::new();
    let mut level = leaves.to_vec();
    let mut position = index;

    while level.len() > 1 {
        let sibling = position ^ 1;
        if sibling < level.len() {
            proof.push(level[sibling]);
        }
        position /= 2;
        level = next_level(&level, hash);
    }

    proof
}

/// Walk a proof from `leaf` at `index` in a tree of `leaf_count` leaves and
/// compare the resulting root.
pub fn verify_merkle_proof(
    root: Hash,
    leaf: Hash,
    index: u64,
    leaf_count: u64,
    proof: &[Hash],
    hash: fn(&[u8]) -> Hash,
) -> bool {
    if leaf_count == 0 || index >= leaf_count {
        return false;
    }

    let mut current = leaf;
    let mut position = index;
    let mut level_len = leaf_count;
    let mut proof_iter = proof.iter();

    while level_len > 1 {
        let sibling = position ^ 1;
        current = if sibling < level_len {
            let Some(sibling_hash) = proof_iter.next() else {
                return false;
            };
            if position % 2 == 0 {
                hash_pair(current, *sibling_hash, hash)
            } else {
                hash_pair(*sibling_hash, current, hash)
            }
        } else {
            hash_pair(current, current, hash)
        };
        position /= 2;
        level_len = level_len.div_ceil(2);
    }

    proof_iter.next().is_none() && current == root
}

fn next_level(level: &[Hash], hash: fn(&[u8]) -> Hash) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(*left, *right, hash),
            [lone] => hash_pair(*lone, *lone, hash),
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

fn hash_pair(left: Hash, right: Hash, hash: fn(&[u8]) -> Hash) -> Hash {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_bytes());
    buf[32..].copy_from_slice(right.as_bytes());
    hash(&buf)
}
