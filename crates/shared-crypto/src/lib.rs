//! # Shared Crypto Crate
//!
//! Hashing and signature primitives used by the consensus overlay:
//!
//! - Keccak-256 for attestation digests, blob hashes and header-bound roots
//! - SHA-256 for shard/sample commitments and the sampler's Merkle tree
//! - Recoverable secp256k1 ECDSA with Ethereum-style address derivation
//!
//! Verification failures surface as [`CryptoError`]; nothing here panics on
//! untrusted input.

pub mod ecdsa;
pub mod errors;
pub mod hashing;

pub use ecdsa::{recover_address, ValidatorKeypair, SIGNATURE_LENGTH};
pub use errors::CryptoError;
pub use hashing::{keccak256, sha256};
