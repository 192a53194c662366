//! Hybrid consensus configuration and reward constants.

use serde::{Deserialize, Serialize};
use shared_types::{Address, U256};

/// Fixed PoW miner reward per hybrid block: 1 unit (10^18 wei).
pub const MINER_REWARD: U256 = U256([0x0de0_b6b3_a764_0000, 0, 0, 0]);

/// Fixed PoS validator-pool reward per hybrid block: 1 unit (10^18 wei).
pub const VALIDATOR_REWARD: U256 = U256([0x0de0_b6b3_a764_0000, 0, 0, 0]);

/// Configuration of the hybrid consensus overlay.
///
/// The reward split percentages are reporting fields surfaced over RPC; the
/// actual per-block reward amounts are the fixed constants above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum spacing between blocks in seconds (enforced by the PoW engine).
    pub period: u64,
    /// Integer percent of total active stake required for finality.
    pub finality_threshold: u64,
    /// Number of recent blocks for which attestations are retained.
    pub attestation_window: u64,
    /// Destination of pooled validator rewards.
    pub staking_contract: Address,
    /// Minimum stake to be an active validator, in wei.
    pub min_stake: U256,
    /// Reported miner share of the block reward.
    pub miner_reward_percent: u64,
    /// Reported validator share of the block reward.
    pub validator_reward_percent: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            period: 15,
            finality_threshold: 67,
            attestation_window: 32,
            staking_contract: Address::from([
                0x45, 0xbe, 0x36, 0x47, 0xd6, 0x4f, 0xe1, 0xc2, 0x51, 0xef, 0xc5, 0x05, 0x4d,
                0x40, 0x16, 0x27, 0x1d, 0x42, 0xd1, 0x2c,
            ]),
            // 32 units of stake
            min_stake: U256([0x0de0_b6b3_a764_0000, 0, 0, 0]) * U256::from(32u64),
            miner_reward_percent: 70,
            validator_reward_percent: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reward_constants_are_one_unit() {
        let unit = U256::from(1_000_000_000_000_000_000u64);
        assert_eq!(MINER_REWARD, unit);
        assert_eq!(VALIDATOR_REWARD, unit);
    }

    #[test]
    fn default_min_stake_is_32_units() {
        let config = EngineConfig::default();
        assert_eq!(
            config.min_stake,
            U256::from(32u64) * U256::from(1_000_000_000_000_000_000u64)
        );
        assert_eq!(config.finality_threshold, 67);
        assert_eq!(config.attestation_window, 32);
    }
}
