//! Smart pool accounting on an in-process EVM-style ledger
//!
//! A smart pool holds tokens and issues shares priced by its unitary value
//! (net asset value per share). Functionality beyond mint, burn and NAV
//! updates lives behind a fallback dispatcher: extensions from a fixed
//! selector map and governance-registered adapters. Pools move value between
//! chains through a bridge with NAV-neutral transfers, NAV-aligning syncs
//! and per-pool refund escrows.

pub mod abi;
pub mod adapters;
pub mod chain;
pub mod config;
pub mod crosschain;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod extensions;
pub mod ledger;
pub mod nav;
pub mod oracle;
pub mod pool;
pub mod tokens;
pub mod transient;

#[cfg(test)]
mod testutil;

pub use chain::{Chain, ChainConfig};
pub use errors::{PoolError, Revert};
