//! XOR-family erasure codec.
//!
//! Splits a payload into `k` data shards and derives `m` parity shards with
//! deterministic XOR selectors: parity 0 covers every data shard, parity
//! `p > 0` covers the data shards whose index satisfies `i % (p + 1) == 0`.
//! The scheme guarantees recovery of any single missing data shard from
//! parity 0; it is not a general Reed-Solomon code and does not attempt
//! multi-loss recovery.

use crate::config::ErasureConfig;
use crate::error::{DasError, DasResult};
use serde::{Deserialize, Serialize};
use shared_crypto::{keccak256, sha256};
use shared_types::{BlockNumber, Hash};
use std::collections::HashMap;

/// Commitment binding a shard's bytes to its index:
/// `SHA-256(data || big-endian-8-byte(index))`.
pub fn shard_commitment(data: &[u8], index: u64) -> Hash {
    let mut buf = Vec::with_capacity(data.len() + 8);
    buf.extend_from_slice(data);
    buf.extend_from_slice(&index.to_be_bytes());
    sha256(&buf)
}

/// One erasure-coded shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedShard {
    /// Shard index in `0..k+m`.
    pub index: u64,
    /// Shard bytes, exactly `shard_size` long.
    pub data: Vec<u8>,
    /// Whether this is a parity shard.
    pub is_parity: bool,
    /// Commitment over `data || index`.
    pub commitment: Hash,
    /// Block this shard belongs to, when known.
    pub block_number: Option<BlockNumber>,
}

/// A fully encoded payload with reconstruction metadata.
#[derive(Debug, Clone)]
pub struct EncodedBlob {
    /// Payload size before zero-padding.
    pub original_size: usize,
    /// All `k + m` shards.
    pub shards: Vec<EncodedShard>,
    /// Keccak-256 of the original payload.
    pub data_hash: Hash,
    /// Block the payload belongs to.
    pub block_number: BlockNumber,
}

/// The erasure codec.
#[derive(Debug, Clone, Copy)]
pub struct ErasureCoder {
    data_shards: usize,
    parity_shards: usize,
    shard_size: usize,
}

impl Default for ErasureCoder {
    fn default() -> Self {
        Self::new(ErasureConfig::default())
    }
}

impl ErasureCoder {
    /// Create a codec from its configuration.
    pub fn new(config: ErasureConfig) -> Self {
        Self {
            data_shards: config.data_shards,
            parity_shards: config.parity_shards,
            shard_size: config.shard_size,
        }
    }

    /// Number of data shards (`k`).
    pub fn data_shards(&self) -> usize {
        self.data_shards
    }

    /// Number of shards in total (`k + m`).
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Size of each shard in bytes.
    pub fn shard_size(&self) -> usize {
        self.shard_size
    }

    /// Whether parity `p` covers data shard `i`.
    fn parity_covers(parity: usize, data_index: usize) -> bool {
        parity == 0 || data_index % (parity + 1) == 0
    }

    /// Encode a payload into `k` data shards plus `m` parity shards.
    pub fn encode(&self, data: &[u8]) -> DasResult<Vec<EncodedShard>> {
        if data.is_empty() {
            return Err(DasError::EmptyData);
        }
        let capacity = self.data_shards * self.shard_size;
        if data.len() > capacity {
            return Err(DasError::DataTooLarge {
                len: data.len(),
                max: capacity,
            });
        }

        let mut padded = vec![0u8; capacity];
        padded[..data.len()].copy_from_slice(data);

        let mut shards = Vec::with_capacity(self.total_shards());

        for i in 0..self.data_shards {
            let chunk = padded[i * self.shard_size..(i + 1) * self.shard_size].to_vec();
            shards.push(EncodedShard {
                index: i as u64,
                commitment: shard_commitment(&chunk, i as u64),
                data: chunk,
                is_parity: false,
                block_number: None,
            });
        }

        for p in 0..self.parity_shards {
            let index = (self.data_shards + p) as u64;
            let mut parity = vec![0u8; self.shard_size];
            for i in 0..self.data_shards {
                if Self::parity_covers(p, i) {
                    xor_into(&mut parity, &shards[i].data);
                }
            }
            shards.push(EncodedShard {
                index,
                commitment: shard_commitment(&parity, index),
                data: parity,
                is_parity: true,
                block_number: None,
            });
        }

        Ok(shards)
    }

    /// Reconstruct the padded payload from at least `k` unique shards.
    ///
    /// With all data shards present this is a concatenation. A single
    /// missing data shard is recovered from parity 0; anything beyond that
    /// exceeds the parity scheme and fails.
    pub fn decode(&self, shards: &[EncodedShard]) -> DasResult<Vec<u8>> {
        let mut by_index: HashMap<u64, &EncodedShard> = HashMap::new();
        for shard in shards {
            by_index.entry(shard.index).or_insert(shard);
        }

        if by_index.len() < self.data_shards {
            return Err(DasError::InsufficientShards {
                have: by_index.len(),
                need: self.data_shards,
            });
        }

        for shard in shards {
            if shard.data.len() != self.shard_size {
                return Err(DasError::ShardSizeMismatch {
                    got: shard.data.len(),
                    expected: self.shard_size,
                });
            }
        }

        let missing: Vec<usize> = (0..self.data_shards)
            .filter(|i| !by_index.contains_key(&(*i as u64)))
            .collect();

        let mut result = vec![0u8; self.data_shards * self.shard_size];
        for i in 0..self.data_shards {
            if let Some(shard) = by_index.get(&(i as u64)) {
                result[i * self.shard_size..(i + 1) * self.shard_size]
                    .copy_from_slice(&shard.data);
            }
        }

        for missing_index in missing {
            // Parity 0 recovers a lone gap; with two or more data shards
            // absent the XOR below would be missing terms.
            let parity0 = by_index
                .get(&(self.data_shards as u64))
                .ok_or(DasError::ReconstructionFailed)?;

            let mut reconstructed = parity0.data.clone();
            for i in 0..self.data_shards {
                if i == missing_index {
                    continue;
                }
                let shard = by_index
                    .get(&(i as u64))
                    .ok_or(DasError::ReconstructionFailed)?;
                xor_into(&mut reconstructed, &shard.data);
            }

            result[missing_index * self.shard_size..(missing_index + 1) * self.shard_size]
                .copy_from_slice(&reconstructed);
        }

        Ok(result)
    }

    /// Whether a shard's commitment matches its bytes and index.
    pub fn verify_shard(&self, shard: &EncodedShard) -> bool {
        !shard.data.is_empty() && shard.commitment == shard_commitment(&shard.data, shard.index)
    }

    /// Necessary condition for reconstruction: at least `k` unique in-range
    /// indices. The decoder remains the source of truth.
    pub fn can_reconstruct(&self, shards: &[EncodedShard]) -> bool {
        let mut seen = std::collections::HashSet::new();
        for shard in shards {
            if shard.index < self.total_shards() as u64 {
                seen.insert(shard.index);
            }
        }
        seen.len() >= self.data_shards
    }

    /// Indices a fetcher still needs, given what it already holds.
    pub fn required_indices(&self, available: &[u64]) -> Vec<u64> {
        let held: std::collections::HashSet<u64> = available.iter().copied().collect();
        if held.len() >= self.data_shards {
            return Vec::new();
        }

        let mut needed = Vec::new();
        for index in 0..self.total_shards() as u64 {
            if !held.contains(&index) {
                needed.push(index);
                if held.len() + needed.len() >= self.data_shards {
                    break;
                }
            }
        }
        needed
    }

    /// Encode a block payload, stamping shards with the block number.
    pub fn encode_for_block(&self, data: &[u8], block_number: BlockNumber) -> DasResult<EncodedBlob> {
        let mut shards = self.encode(data)?;
        for shard in &mut shards {
            shard.block_number = Some(block_number);
        }
        Ok(EncodedBlob {
            original_size: data.len(),
            shards,
            data_hash: keccak256(data),
            block_number,
        })
    }

    /// Reconstruct a block payload, trimming the padding and checking the
    /// payload hash recorded at encode time.
    pub fn decode_for_block(
        &self,
        blob: &EncodedBlob,
        shards: &[EncodedShard],
    ) -> DasResult<Vec<u8>> {
        let mut data = self.decode(shards)?;
        if blob.original_size > 0 && blob.original_size < data.len() {
            data.truncate(blob.original_size);
        }
        if keccak256(&data) != blob.data_hash {
            return Err(DasError::ReconstructionFailed);
        }
        Ok(data)
    }
}

/// XOR `src` into `dst` in place over the shorter length.
fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= *s;
    }
}
