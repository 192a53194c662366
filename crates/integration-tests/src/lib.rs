//! # Integration Tests Crate
//!
//! End-to-end scenarios spanning the hybrid consensus and data availability
//! crates:
//!
//! - `consensus_flow`: attestation acceptance through finalization, reorg
//!   barriers, equivocation handling and the reward split.
//! - `das_flow`: encode, commit, distribute, sample and reconstruct a block
//!   payload over an in-process transport.
//!
//! Fixtures live in `fixtures` and stand in for the external collaborators:
//! a no-op PoW engine, an in-memory chain reader and a balance-map ledger.

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod consensus_flow;

#[cfg(test)]
mod das_flow;
