//! Transaction-scoped ("transient") storage
//!
//! Everything here lives for exactly one top-level transaction: `Chain::transact`
//! clears it on entry and on exit, never between nested calls. It holds
//!
//! - the per-pool NAV balance scratch map ([`TransientBalanceScratch`])
//! - donation pre-balance snapshots for the two-step `donate` protocol
//! - reentrancy locks keyed by the guarded contract

use alloy_primitives::{Address, I256, U256};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::errors::PoolError;

/// Accumulates signed token amounts contributed by applications and virtual
/// balances before the final per-token balance pass.
///
/// An entry being present means the token was already offered to the active
/// token set during this transaction, whatever its accumulated value.
#[derive(Debug, Clone, Default)]
pub struct TransientBalanceScratch {
    entries: HashMap<Address, I256>,
}

impl TransientBalanceScratch {
    /// Add `delta` to the token's accumulator. Returns `true` on the first
    /// touch of this token in the current transaction.
    pub fn fold_contribution(&mut self, token: Address, delta: I256) -> bool {
        match self.entries.get_mut(&token) {
            Some(acc) => {
                *acc = acc.saturating_add(delta);
                false
            }
            None => {
                debug!(token = ?token, delta = %delta, "scratch first touch");
                self.entries.insert(token, delta);
                true
            }
        }
    }

    /// Consume the accumulated amount, resetting the entry to absent.
    pub fn take(&mut self, token: &Address) -> Option<I256> {
        self.entries.remove(token)
    }

    pub fn peek(&self, token: &Address) -> Option<I256> {
        self.entries.get(token).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// All transient slots of one chain.
#[derive(Debug, Default)]
pub struct TransientStorage {
    balances: HashMap<Address, TransientBalanceScratch>,
    donations: HashMap<(Address, Address), U256>,
    locks: HashSet<Address>,
}

impl TransientStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wipe every slot. Called at transaction boundaries only.
    pub fn clear(&mut self) {
        self.balances.clear();
        self.donations.clear();
        self.locks.clear();
    }

    /// Scratch map of `pool`, created on first use.
    pub fn scratch(&mut self, pool: Address) -> &mut TransientBalanceScratch {
        self.balances.entry(pool).or_default()
    }

    /// Snapshot the pool's balance of `token` before a donation transfer.
    pub fn record_donation(&mut self, pool: Address, token: Address, pre_balance: U256) {
        self.donations.insert((pool, token), pre_balance);
    }

    pub fn has_donation(&self, pool: Address, token: Address) -> bool {
        self.donations.contains_key(&(pool, token))
    }

    /// Consume the snapshot recorded by [`Self::record_donation`].
    pub fn take_donation(&mut self, pool: Address, token: Address) -> Option<U256> {
        self.donations.remove(&(pool, token))
    }

    /// Acquire the reentrancy lock of `guarded`.
    pub fn enter(&mut self, guarded: Address) -> Result<(), PoolError> {
        if !self.locks.insert(guarded) {
            return Err(PoolError::ReentrantCall);
        }
        Ok(())
    }

    pub fn exit(&mut self, guarded: Address) {
        self.locks.remove(&guarded);
    }

    /// True when nothing is held. Checked after every transaction in tests.
    pub fn is_empty(&self) -> bool {
        self.balances.values().all(TransientBalanceScratch::is_empty)
            && self.donations.is_empty()
            && self.locks.is_empty()
    }
}
