//! Ports: interfaces between the overlay and its external collaborators.

pub mod outbound;

pub use outbound::{ChainReader, PowEngine, StateLedger};
