//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors from hashing and signature primitives.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Signature is not exactly 65 bytes of `r || s || v`.
    #[error("invalid signature length: expected 65 bytes, got {0}")]
    InvalidSignatureLength(usize),

    /// Recovery id byte is outside the valid range.
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// Signature bytes do not encode a valid curve point pair.
    #[error("malformed signature")]
    MalformedSignature,

    /// Public key recovery failed for the given digest and signature.
    #[error("signature recovery failed")]
    RecoveryFailed,

    /// Secret key bytes are not a valid scalar.
    #[error("invalid secret key")]
    InvalidSecretKey,
}
