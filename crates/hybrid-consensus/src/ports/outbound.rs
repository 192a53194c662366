//! Driven ports: the external collaborators the overlay depends on.
//!
//! The overlay wraps an existing PoW block-production engine and mutates
//! state only through a thin ledger interface. Both stay behind traits so
//! the engine facade can be exercised against test doubles.

use crate::error::ConsensusResult;
use shared_types::{Address, BlockHeader, BlockNumber, ChainConfig, Hash, Transaction, U256};

/// Read access to the canonical chain.
pub trait ChainReader: Send + Sync {
    /// The chain's fork schedule.
    fn config(&self) -> &ChainConfig;

    /// Height of the current head.
    fn current_height(&self) -> BlockNumber;

    /// Header at `number` on the canonical chain, if known.
    fn header(&self, number: BlockNumber) -> Option<BlockHeader>;

    /// Hash of the canonical block at `number`, if known.
    fn block_hash(&self, number: BlockNumber) -> Option<Hash>;
}

/// The wrapped proof-of-work engine.
///
/// Header verification, uncle verification, sealing, difficulty and
/// hash-rate queries pass through the facade unchanged.
pub trait PowEngine: Send + Sync {
    /// The block author (miner) of a header.
    fn author(&self, header: &BlockHeader) -> ConsensusResult<Address>;

    /// Verify a header against the PoW rules.
    fn verify_header(
        &self,
        chain: &dyn ChainReader,
        header: &BlockHeader,
        seal: bool,
    ) -> ConsensusResult<()>;

    /// Verify a block's uncles against the PoW rules.
    fn verify_uncles(
        &self,
        chain: &dyn ChainReader,
        header: &BlockHeader,
        uncles: &[BlockHeader],
    ) -> ConsensusResult<()>;

    /// Initialize the consensus fields of a header being produced.
    fn prepare(&self, chain: &dyn ChainReader, header: &mut BlockHeader) -> ConsensusResult<()>;

    /// Apply the engine's own post-transaction rules (pre-hybrid rewards).
    fn finalize(
        &self,
        chain: &dyn ChainReader,
        header: &mut BlockHeader,
        state: &mut dyn StateLedger,
        txs: &[Transaction],
        uncles: &[BlockHeader],
    );

    /// Seal a prepared block, blocking until the nonce is found.
    fn seal(&self, chain: &dyn ChainReader, header: BlockHeader) -> ConsensusResult<BlockHeader>;

    /// Hash of a header prior to sealing.
    fn seal_hash(&self, header: &BlockHeader) -> Hash;

    /// Difficulty for a child of `parent` at `timestamp`.
    fn calc_difficulty(
        &self,
        chain: &dyn ChainReader,
        timestamp: u64,
        parent: &BlockHeader,
    ) -> U256;

    /// Current mining hash rate.
    fn hashrate(&self) -> f64;

    /// Tear down background sealing threads.
    fn close(&self) -> ConsensusResult<()>;
}

/// Mutable access to the post-transaction state of the block being finalized.
pub trait StateLedger {
    /// Credit `amount` wei to `address`.
    fn add_balance(&mut self, address: &Address, amount: U256);

    /// Recompute the intermediate state root, applying the empty-account
    /// cleanup rule when `eip158` is set.
    fn intermediate_root(&mut self, eip158: bool) -> Hash;
}
