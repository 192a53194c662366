//! Validator registry: the active validator snapshot and stake accounting.
//!
//! Snapshots are replaced wholesale from the staking contract watcher; the
//! only piecewise mutation is the facade bumping `last_attestation` when an
//! attestation is accepted.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::{Address, BlockNumber, U256};
use std::collections::HashMap;

/// A validator's stake and liveness snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    /// Validator address.
    pub address: Address,
    /// Staked balance in wei.
    pub stake: U256,
    /// Whether the validator is currently active.
    pub active: bool,
    /// Height of the validator's most recent accepted attestation.
    pub last_attestation: BlockNumber,
}

/// Capability handed to the finality tracker and slashing detector.
///
/// Subcomponents hold this by reference instead of a back-pointer to the
/// engine; it exposes exactly the registry and config views they need.
pub trait StakeView {
    /// Deep copy of the current validator snapshot.
    fn validators(&self) -> HashMap<Address, ValidatorInfo>;
    /// Sum of stake over active validators.
    fn total_active_stake(&self) -> U256;
    /// Number of active validators.
    fn active_count(&self) -> usize;
    /// Integer-percent finality threshold.
    fn finality_threshold(&self) -> u64;
}

/// Thread-safe registry of the current validator set.
///
/// Reads proceed in parallel; `replace` takes exclusive access.
#[derive(Debug, Default)]
pub struct ValidatorRegistry {
    validators: RwLock<HashMap<Address, ValidatorInfo>>,
}

impl ValidatorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole snapshot with the set read from the staking contract.
    pub fn replace(&self, snapshot: HashMap<Address, ValidatorInfo>) {
        *self.validators.write() = snapshot;
    }

    /// Look up one validator.
    pub fn get(&self, address: &Address) -> Option<ValidatorInfo> {
        self.validators.read().get(address).cloned()
    }

    /// Deep copy of the snapshot; callers cannot mutate registry state.
    pub fn snapshot(&self) -> HashMap<Address, ValidatorInfo> {
        self.validators.read().clone()
    }

    /// Sum of stake over active validators.
    pub fn total_active_stake(&self) -> U256 {
        self.validators
            .read()
            .values()
            .filter(|v| v.active)
            .fold(U256::zero(), |acc, v| acc + v.stake)
    }

    /// Number of active validators.
    pub fn active_count(&self) -> usize {
        self.validators.read().values().filter(|v| v.active).count()
    }

    /// Total number of registered validators, active or not.
    pub fn len(&self) -> usize {
        self.validators.read().len()
    }

    /// Whether the registry holds no validators.
    pub fn is_empty(&self) -> bool {
        self.validators.read().is_empty()
    }

    /// Record the height of a validator's latest accepted attestation.
    pub fn set_last_attestation(&self, address: &Address, height: BlockNumber) {
        if let Some(info) = self.validators.write().get_mut(address) {
            info.last_attestation = height;
        }
    }

    /// Validators considered online: active and seen attesting at least once.
    pub fn online(&self) -> Vec<Address> {
        self.validators
            .read()
            .values()
            .filter(|v| v.active && v.last_attestation > 0)
            .map(|v| v.address)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(byte: u8, stake: u64, active: bool) -> ValidatorInfo {
        ValidatorInfo {
            address: Address::repeat_byte(byte),
            stake: U256::from(stake),
            active,
            last_attestation: 0,
        }
    }

    fn registry_with(entries: Vec<ValidatorInfo>) -> ValidatorRegistry {
        let registry = ValidatorRegistry::new();
        registry.replace(entries.into_iter().map(|v| (v.address, v)).collect());
        registry
    }

    #[test]
    fn total_stake_counts_only_active() {
        let registry = registry_with(vec![info(1, 40, true), info(2, 30, true), info(3, 99, false)]);

        assert_eq!(registry.total_active_stake(), U256::from(70u64));
        assert_eq!(registry.active_count(), 2);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn snapshot_is_a_deep_copy() {
        let registry = registry_with(vec![info(1, 40, true)]);

        let mut copy = registry.snapshot();
        copy.get_mut(&Address::repeat_byte(1)).unwrap().stake = U256::zero();

        assert_eq!(
            registry.get(&Address::repeat_byte(1)).unwrap().stake,
            U256::from(40u64)
        );
    }

    #[test]
    fn replace_swaps_the_whole_set() {
        let registry = registry_with(vec![info(1, 40, true)]);
        registry.replace(
            vec![info(2, 50, true)]
                .into_iter()
                .map(|v| (v.address, v))
                .collect(),
        );

        assert!(registry.get(&Address::repeat_byte(1)).is_none());
        assert!(registry.get(&Address::repeat_byte(2)).is_some());
    }

    #[test]
    fn online_requires_active_and_prior_attestation() {
        let registry = registry_with(vec![info(1, 40, true), info(2, 30, true), info(3, 20, false)]);

        assert!(registry.online().is_empty());

        registry.set_last_attestation(&Address::repeat_byte(1), 7);
        registry.set_last_attestation(&Address::repeat_byte(3), 7); // inactive

        assert_eq!(registry.online(), vec![Address::repeat_byte(1)]);
    }
}
