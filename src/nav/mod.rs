//! Net asset value computation
//!
//! - [`active_tokens`]: the bounded set of tokens a pool values
//! - [`applications`]: balances held through external applications
//! - [`engine`]: the unitary value update

pub mod active_tokens;
pub mod applications;
pub mod engine;

pub use engine::{NavEngine, NavUpdate, NavUpdateKind, PoolValuation};
