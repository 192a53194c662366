//! Recoverable secp256k1 ECDSA.
//!
//! Signatures are the 65-byte Ethereum wire form `r || s || v` with
//! `v ∈ {0, 1}`. Addresses are the last 20 bytes of the Keccak-256 of the
//! uncompressed public key without its 0x04 prefix, so a verifier needs only
//! the digest and the signature to identify the signer.

use crate::errors::CryptoError;
use crate::hashing::keccak256;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use shared_types::{Address, Hash};
use zeroize::Zeroize;

/// Length of a recoverable signature: 32-byte r, 32-byte s, 1-byte v.
pub const SIGNATURE_LENGTH: usize = 65;

/// A validator signing key.
pub struct ValidatorKeypair {
    secret: SecretKey,
}

impl ValidatorKeypair {
    /// Generate a random keypair.
    pub fn generate<R: secp256k1::rand::Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            secret: SecretKey::new(rng),
        }
    }

    /// Create from raw secret key bytes (32 bytes).
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidSecretKey)?;
        Ok(Self { secret })
    }

    /// The address derived from this keypair's public key.
    pub fn address(&self) -> Address {
        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(&secp, &self.secret);
        public_key_to_address(&public)
    }

    /// Sign a 32-byte digest, producing the 65-byte `r || s || v` form.
    ///
    /// Signing cannot fail for a valid 32-byte digest; the digest type
    /// guarantees the length.
    pub fn sign_digest(&self, digest: &Hash) -> [u8; SIGNATURE_LENGTH] {
        let secp = Secp256k1::new();
        // A Hash is always exactly 32 bytes, so the conversion is infallible.
        let message = Message::from_digest_slice(digest.as_bytes())
            .expect("digest is 32 bytes by construction");

        let signature = secp.sign_ecdsa_recoverable(&message, &self.secret);
        let (recovery_id, compact) = signature.serialize_compact();

        let mut out = [0u8; SIGNATURE_LENGTH];
        out[..64].copy_from_slice(&compact);
        out[64] = recovery_id.to_i32() as u8;
        out
    }
}

impl Drop for ValidatorKeypair {
    fn drop(&mut self) {
        let mut bytes = self.secret.secret_bytes();
        bytes.zeroize();
    }
}

/// Recover the signer address of a 65-byte recoverable signature.
pub fn recover_address(digest: &Hash, signature: &[u8]) -> Result<Address, CryptoError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(CryptoError::InvalidSignatureLength(signature.len()));
    }

    let recovery_id = RecoveryId::from_i32(signature[64] as i32)
        .map_err(|_| CryptoError::InvalidRecoveryId(signature[64]))?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(|_| CryptoError::MalformedSignature)?;

    let message = Message::from_digest_slice(digest.as_bytes())
        .expect("digest is 32 bytes by construction");

    let secp = Secp256k1::new();
    let public = secp
        .recover_ecdsa(&message, &recoverable)
        .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(public_key_to_address(&public))
}

/// Derive an address from a public key: keccak256(uncompressed[1..])[12..].
fn public_key_to_address(public: &PublicKey) -> Address {
    let uncompressed = public.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    Address::from_slice(&hash.as_bytes()[12..])
}
