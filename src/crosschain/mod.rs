//! Cross-chain operations
//!
//! - [`codec`]: versioned bridge message layout
//! - [`donation`]: the register/credit core shared by fills and refunds
//! - [`handler`]: destination-side bridge fill handling
//! - [`escrow`]: per-pool refund sinks that replay funds through `donate`
//! - [`bridge`]: spoke pool deposits, fills and expiries between two chains

pub mod bridge;
pub mod codec;
pub mod donation;
pub mod escrow;
pub mod handler;
