//! Prometheus metrics for the consensus overlay.
//!
//! Enable with the `metrics` feature; without it every recording function is
//! a no-op so call sites stay unconditional.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_counter_vec, register_int_counter, CounterVec, IntCounter};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Total attestations accepted.
    pub static ref ATTESTATIONS_PROCESSED: IntCounter = register_int_counter!(
        "hybrid_attestations_processed_total",
        "Total number of attestations accepted"
    )
    .expect("Failed to create ATTESTATIONS_PROCESSED metric");

    /// Total attestations rejected, labeled by reason.
    pub static ref ATTESTATIONS_REJECTED: CounterVec = register_counter_vec!(
        "hybrid_attestations_rejected_total",
        "Total number of attestations rejected",
        &["reason"]
    )
    .expect("Failed to create ATTESTATIONS_REJECTED metric");

    /// Total blocks finalized.
    pub static ref BLOCKS_FINALIZED: IntCounter = register_int_counter!(
        "hybrid_blocks_finalized_total",
        "Total number of blocks finalized"
    )
    .expect("Failed to create BLOCKS_FINALIZED metric");
}

/// Record an accepted attestation.
#[cfg(feature = "metrics")]
pub fn record_attestation_processed() {
    ATTESTATIONS_PROCESSED.inc();
}

/// Record a rejected attestation with its reason.
#[cfg(feature = "metrics")]
pub fn record_attestation_rejected(reason: &str) {
    ATTESTATIONS_REJECTED.with_label_values(&[reason]).inc();
}

/// Record a finalized block.
#[cfg(feature = "metrics")]
pub fn record_block_finalized() {
    BLOCKS_FINALIZED.inc();
}

#[cfg(not(feature = "metrics"))]
pub fn record_attestation_processed() {}

#[cfg(not(feature = "metrics"))]
pub fn record_attestation_rejected(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_block_finalized() {}
