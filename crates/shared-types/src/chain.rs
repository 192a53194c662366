//! Chain configuration: fork activation heights and recovery-fork parameters.
//!
//! All values are fixed at node start-up and injected into the subsystems
//! that need them; activation checks are pure functions of a block height.

use crate::{Address, BlockNumber};
use serde::{Deserialize, Serialize};

/// Hard-fork schedule and chain identity.
///
/// A fork set to `None` never activates; `Some(n)` activates at height `n`
/// inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// EIP-155 chain identifier.
    pub chain_id: u64,
    /// Height at which the hybrid PoW/PoS overlay activates.
    pub hybrid_block: Option<BlockNumber>,
    /// Height at which data availability sampling activates.
    pub das_block: Option<BlockNumber>,
    /// Height of the empty-account cleanup rule used when recomputing the
    /// state root during reward finalization.
    pub eip158_block: Option<BlockNumber>,
    /// Height of the one-off balance-recovery fork, if scheduled.
    pub recovery_fork_block: Option<BlockNumber>,
    /// Parameters of the balance-recovery fork.
    pub recovery_fork: Option<RecoveryForkParams>,
}

/// Parameters of the balance-recovery hard fork.
///
/// At the fork height the chain layer drains the listed accounts into the
/// recovery destination. The state mutation itself happens outside the
/// consensus overlay; these values are carried here so every subsystem reads
/// the same schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryForkParams {
    /// Destination account for recovered balances.
    pub recovery_contract: Address,
    /// Accounts whose full balances are moved at the fork height.
    pub drained_accounts: Vec<Address>,
}

impl ChainConfig {
    /// Whether the hybrid PoW/PoS overlay is active at `number`.
    pub fn is_hybrid(&self, number: BlockNumber) -> bool {
        active(self.hybrid_block, number)
    }

    /// Whether data availability sampling is active at `number`.
    pub fn is_das(&self, number: BlockNumber) -> bool {
        active(self.das_block, number)
    }

    /// Whether the empty-account cleanup rule applies at `number`.
    pub fn is_eip158(&self, number: BlockNumber) -> bool {
        active(self.eip158_block, number)
    }

    /// Whether `number` is the balance-recovery fork height.
    pub fn is_recovery_fork(&self, number: BlockNumber) -> bool {
        self.recovery_fork_block == Some(number)
    }
}

fn active(fork: Option<BlockNumber>, number: BlockNumber) -> bool {
    matches!(fork, Some(block) if number >= block)
}
