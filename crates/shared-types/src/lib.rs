//! # Shared Types Crate
//!
//! Cross-subsystem primitives for the Altnet hybrid PoW/PoS node: addresses,
//! hashes, the 256-bit stake arithmetic type, the minimal block header the
//! consensus overlay operates on, and the process-wide chain configuration
//! (fork activation heights and protocol parameter constants).
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a subsystem boundary
//!   is defined here, never re-declared downstream.
//! - **Immutable Configuration**: fork parameters are plain data injected at
//!   construction; nothing in this crate reads global mutable state.

pub mod chain;
pub mod params;

use serde::{Deserialize, Serialize};

// Re-export the fixed-width numeric types used across all subsystems.
pub use primitive_types::{H160 as Address, H256 as Hash, U256};

pub use chain::{ChainConfig, RecoveryForkParams};

/// Block height in the chain.
pub type BlockNumber = u64;

/// The subset of a block header the consensus overlay reads and writes.
///
/// Sealing fields (mix digest, nonce) stay inside the PoW engine; the overlay
/// only needs the height, the beneficiary and the state root it recomputes
/// during reward finalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block height.
    pub number: BlockNumber,
    /// Hash of the parent block.
    pub parent_hash: Hash,
    /// Beneficiary of the mining reward.
    pub coinbase: Address,
    /// Root hash of the state trie after applying this block.
    pub root: Hash,
    /// Unix timestamp when the block was sealed.
    pub timestamp: u64,
    /// PoW difficulty target.
    pub difficulty: U256,
    /// Maximum gas the block may consume.
    pub gas_limit: u64,
    /// Gas consumed by the block's transactions.
    pub gas_used: u64,
}

/// An executed transaction as seen by the consensus overlay.
///
/// The overlay never inspects transaction contents; the type exists so the
/// finalization entry point carries the same shape the block producer hands
/// to the underlying PoW engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    /// Recipient, `None` for contract creation.
    pub to: Option<Address>,
    /// Transferred value in wei.
    pub value: U256,
    /// Sender nonce.
    pub nonce: u64,
    /// Call data.
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_serde_roundtrip() {
        let header = BlockHeader {
            number: 42,
            coinbase: Address::repeat_byte(0xaa),
            gas_limit: 8_000_000,
            ..Default::default()
        };

        let json = serde_json::to_string(&header).unwrap();
        let back: BlockHeader = serde_json::from_str(&json).unwrap();
        assert_eq!(header, back);
    }
}
