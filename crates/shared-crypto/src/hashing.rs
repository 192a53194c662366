//! One-shot hashing helpers.
//!
//! Two hash families are deliberately kept side by side: Keccak-256 for
//! everything bound into headers or signed (attestation digests, blob
//! hashes, the DA data root), SHA-256 for shard and sample commitments.
//! Callers must not substitute one for the other.

use sha2::{Digest as Sha2Digest, Sha256};
use sha3::{Digest as Sha3Digest, Keccak256};
use shared_types::Hash;

/// Keccak-256 of `data`.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    Hash::from_slice(&hasher.finalize())
}

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Hash::from_slice(&hasher.finalize())
}
