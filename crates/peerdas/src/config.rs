//! Codec and sampling policy configuration.

use serde::{Deserialize, Serialize};

/// Erasure codec parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureConfig {
    /// Number of data shards (`k`).
    pub data_shards: usize,
    /// Number of parity shards (`m`).
    pub parity_shards: usize,
    /// Size of each shard in bytes.
    pub shard_size: usize,
}

impl Default for ErasureConfig {
    fn default() -> Self {
        Self {
            data_shards: 4,
            parity_shards: 2,
            shard_size: 1024,
        }
    }
}

/// Sampling policy for availability verification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Number of shard indices sampled per block.
    pub sample_count: usize,
    /// Minimum fraction of requested samples that must verify.
    pub min_sample_ratio: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_count: 4,
            min_sample_ratio: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_parameters() {
        let erasure = ErasureConfig::default();
        assert_eq!(
            (erasure.data_shards, erasure.parity_shards, erasure.shard_size),
            (4, 2, 1024)
        );

        let sampling = SamplingConfig::default();
        assert_eq!(sampling.sample_count, 4);
        assert!((sampling.min_sample_ratio - 0.5).abs() < f64::EPSILON);
    }
}
