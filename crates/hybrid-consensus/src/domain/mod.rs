//! Domain entities and per-subsystem state machines.

pub mod attestation;
pub mod finality;
pub mod slashing;
pub mod validator;

pub use attestation::{Attestation, BlockAttestations};
pub use finality::{FinalityStatus, FinalityTracker};
pub use slashing::{SlashableOffense, SlashingDetector, SlashingReason};
pub use validator::{StakeView, ValidatorInfo, ValidatorRegistry};
