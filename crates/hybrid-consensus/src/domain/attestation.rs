//! Attestation entity and per-block attestation sets.
//!
//! An attestation is a validator's signed statement that it has verified a
//! block and agrees it should be finalized. The signed digest covers only
//! `(block_hash, block_number)`; the validator address is recovered from the
//! signature rather than included in the digest.

use crate::domain::validator::ValidatorInfo;
use crate::error::{ConsensusError, ConsensusResult};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};
use shared_crypto::{keccak256, recover_address, ValidatorKeypair, SIGNATURE_LENGTH};
use shared_types::{Address, BlockNumber, Hash, U256};
use std::collections::HashMap;

/// A validator's attestation to a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// Address of the attesting validator.
    pub validator: Address,
    /// Hash of the block being attested to.
    pub block_hash: Hash,
    /// Height of the block being attested to.
    pub block_number: BlockNumber,
    /// 65-byte recoverable signature over the signing digest.
    pub signature: Vec<u8>,
}

impl Attestation {
    /// Create an unsigned attestation.
    pub fn new(validator: Address, block_hash: Hash, block_number: BlockNumber) -> Self {
        Self {
            validator,
            block_hash,
            block_number,
            signature: Vec::new(),
        }
    }

    /// The digest a validator signs: keccak256 of the RLP list
    /// `[block_hash, block_number]`.
    pub fn signing_digest(block_hash: &Hash, block_number: BlockNumber) -> Hash {
        let mut stream = RlpStream::new_list(2);
        stream.append(block_hash);
        stream.append(&block_number);
        keccak256(stream.as_raw())
    }

    /// Sign this attestation with the validator's key.
    pub fn sign(&mut self, keypair: &ValidatorKeypair) {
        let digest = Self::signing_digest(&self.block_hash, self.block_number);
        self.signature = keypair.sign_digest(&digest).to_vec();
    }

    /// Whether the signature is well-formed and recovers to `self.validator`.
    pub fn verify_signature(&self) -> bool {
        if self.signature.len() != SIGNATURE_LENGTH {
            return false;
        }
        let digest = Self::signing_digest(&self.block_hash, self.block_number);
        match recover_address(&digest, &self.signature) {
            Ok(recovered) => recovered == self.validator,
            Err(_) => false,
        }
    }

    /// Recover the signer address from the signature.
    pub fn recover_signer(&self) -> ConsensusResult<Address> {
        let digest = Self::signing_digest(&self.block_hash, self.block_number);
        recover_address(&digest, &self.signature).map_err(|_| {
            ConsensusError::InvalidAttestation {
                validator: self.validator,
            }
        })
    }

    /// Encode for network transmission.
    pub fn encode(&self) -> Vec<u8> {
        rlp::encode(self).to_vec()
    }

    /// Decode from network bytes.
    pub fn decode(data: &[u8]) -> ConsensusResult<Self> {
        Ok(rlp::decode(data)?)
    }
}

impl Encodable for Attestation {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(4);
        stream.append(&self.validator);
        stream.append(&self.block_hash);
        stream.append(&self.block_number);
        stream.append(&self.signature);
    }
}

impl Decodable for Attestation {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            validator: rlp.val_at(0)?,
            block_hash: rlp.val_at(1)?,
            block_number: rlp.val_at(2)?,
            signature: rlp.val_at(3)?,
        })
    }
}

/// All attestations collected for one block hash.
///
/// Keys are unique per validator; insertion order is irrelevant. Every
/// contained attestation carries this set's block hash and number.
#[derive(Debug, Clone, Default)]
pub struct BlockAttestations {
    /// The attested block hash.
    pub block_hash: Hash,
    /// The attested block height.
    pub block_number: BlockNumber,
    /// Attester address to attestation.
    pub attestations: HashMap<Address, Attestation>,
}

impl BlockAttestations {
    /// Create an empty set for one block.
    pub fn new(block_hash: Hash, block_number: BlockNumber) -> Self {
        Self {
            block_hash,
            block_number,
            attestations: HashMap::new(),
        }
    }

    /// Insert an attestation; fails if the validator already attested here.
    pub fn add(&mut self, attestation: Attestation) -> ConsensusResult<()> {
        if self.attestations.contains_key(&attestation.validator) {
            return Err(ConsensusError::DuplicateAttestation {
                validator: attestation.validator,
                block_hash: self.block_hash,
            });
        }
        self.attestations.insert(attestation.validator, attestation);
        Ok(())
    }

    /// Sum of stake over *active* attesters.
    ///
    /// Inactive attesters are skipped rather than rejected; the engine facade
    /// already refused their attestations at insertion time.
    pub fn total_stake(&self, validators: &HashMap<Address, ValidatorInfo>) -> U256 {
        let mut total = U256::zero();
        for addr in self.attestations.keys() {
            if let Some(info) = validators.get(addr) {
                if info.active {
                    total += info.stake;
                }
            }
        }
        total
    }

    /// Number of attesters.
    pub fn attester_count(&self) -> usize {
        self.attestations.len()
    }

    /// Whether `validator` has attested to this block.
    pub fn has_attested(&self, validator: &Address) -> bool {
        self.attestations.contains_key(validator)
    }

    /// Addresses of all attesters.
    pub fn attesters(&self) -> Vec<Address> {
        self.attestations.keys().copied().collect()
    }
}
